use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use murmur_config::{ChatConfig, Config, ConfigManager};
use murmur_core::{ChatBackend, ChatEvent, ChatSettings, Conversation, HttpBackend, RevealSettings};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;

mod app;
mod logging;
mod ui;

use app::App;

/// Terminal chat client with a typewriter-style reply view
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Chat endpoint, overrides backend.endpoint
    #[arg(short, long, env = "MURMUR_ENDPOINT")]
    endpoint: Option<String>,

    /// Log level, overrides logging.level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the chat view (default)
    Chat,
    /// Read or change the config file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print one value, e.g. `chat.greeting`
    Get { key: String },
    /// Set one value and save the file
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::load(path).await,
        None => ConfigManager::load_default().await,
    }
    .context("Failed to load config")?;

    if let Some(Commands::Config(args)) = cli.command.take() {
        return handle_config(args, &manager).await;
    }

    let config = apply_overrides(manager.snapshot().await, &cli)?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.to_string());
    let _log_guard = logging::init(&config.logging, &level)?;

    let backend = build_backend(&config)?;
    let (conversation, events) = Conversation::new(backend, chat_settings(&config.chat));
    let mut app = App::new(conversation, config.ui.clone());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start();
    let res = run_app(&mut terminal, &mut app, events).await;
    app.teardown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        tracing::error!("Chat view exited with error: {:?}", err);
    }
    res
}

async fn handle_config(args: ConfigArgs, manager: &ConfigManager) -> Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let config = manager.get().read().await.clone();
            let value = config
                .get_value(&key)
                .ok_or_else(|| anyhow!("Key not found: {}", key))?;
            println!("{} = {}", key, value);
        }
        ConfigCommands::Set { key, value } => {
            set_config_value(manager, &key, &value).await?;
            println!("Set {} = {}", key, value);
        }
        ConfigCommands::Path => println!("{}", manager.path().display()),
    }
    Ok(())
}

/// Apply one dotted-key change, validate it and write the file
async fn set_config_value(manager: &ConfigManager, key: &str, value: &str) -> Result<()> {
    let mut updated = manager.snapshot().await;
    updated.set_value(key, value)?;
    manager
        .update(|config| *config = updated)
        .await
        .with_context(|| format!("Failed to set {}", key))?;
    Ok(())
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(endpoint) = &cli.endpoint {
        config.backend.endpoint = endpoint.clone();
    }
    ConfigManager::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

fn chat_settings(chat: &ChatConfig) -> ChatSettings {
    ChatSettings {
        greeting: chat.greeting.clone(),
        fallback_reply: chat.fallback_reply.clone(),
        reveal: RevealSettings {
            tick: Duration::from_millis(chat.tick_interval_ms),
            min_chunk: chat.min_chunk,
            max_chunk: chat.max_chunk,
        },
    }
}

fn build_backend(config: &Config) -> Result<Arc<dyn ChatBackend>> {
    let endpoint = config.backend.endpoint.as_str();
    let backend = match config.backend.timeout_seconds {
        Some(secs) => HttpBackend::with_timeout(endpoint, Duration::from_secs(secs))
            .context("Failed to build HTTP client")?,
        None => HttpBackend::new(endpoint),
    };
    tracing::info!("Chat endpoint: {}", backend.endpoint());
    Ok(Arc::new(backend))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut events: UnboundedReceiver<ChatEvent>,
) -> Result<()> {
    let mut keys = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    loop {
        app.refresh();
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            maybe_event = keys.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(app, key) {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            Some(event) = events.recv() => {
                app.handle_chat_event(event);
                // Drain whatever else queued up so one frame covers a burst.
                while let Ok(event) = events.try_recv() {
                    app.handle_chat_event(event);
                }
            }
            _ = ticker.tick() => app.on_tick(),
        }
    }
}

/// Returns true when the app should quit
fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Esc => return true,
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.new_conversation();
        }
        KeyCode::Enter => app.send_message(),
        KeyCode::Char(c) => app.push_input(c),
        KeyCode::Backspace => app.pop_input(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::PageUp => app.scroll_page_up(),
        KeyCode::PageDown => app.scroll_page_down(),
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(endpoint: Option<&str>) -> Cli {
        Cli {
            config: None,
            endpoint: endpoint.map(str::to_string),
            log_level: None,
            command: None,
        }
    }

    #[tokio::test]
    async fn test_config_set_writes_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let manager = ConfigManager::load(&path).await.unwrap();

        set_config_value(&manager, "chat.greeting", "Hi there").await.unwrap();

        let reloaded = ConfigManager::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await.chat.greeting, "Hi there");
    }

    #[tokio::test]
    async fn test_config_set_rejects_invalid_values() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let manager = ConfigManager::load(&path).await.unwrap();

        assert!(set_config_value(&manager, "chat.fallback_reply", " ").await.is_err());
        assert!(set_config_value(&manager, "server.port", "80").await.is_err());
        assert_eq!(manager.snapshot().await, murmur_config::Config::default());
    }

    #[test]
    fn test_config_subcommands_parse() {
        let cli = Cli::try_parse_from(["murmur", "config", "set", "chat.min_chunk", "2"]).unwrap();
        match cli.command {
            Some(Commands::Config(ConfigArgs {
                command: ConfigCommands::Set { key, value },
            })) => {
                assert_eq!(key, "chat.min_chunk");
                assert_eq!(value, "2");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["murmur"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_endpoint_override() {
        let config = apply_overrides(Config::default(), &cli(Some("http://10.1.1.1:9000/chat"))).unwrap();
        assert_eq!(config.backend.endpoint, "http://10.1.1.1:9000/chat");

        let config = apply_overrides(Config::default(), &cli(None)).unwrap();
        assert_eq!(config.backend.endpoint, Config::default().backend.endpoint);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        assert!(apply_overrides(Config::default(), &cli(Some("ftp://nowhere"))).is_err());
    }

    #[test]
    fn test_chat_settings_from_config() {
        let mut chat = ChatConfig::default();
        chat.tick_interval_ms = 45;
        chat.max_chunk = 5;
        let settings = chat_settings(&chat);
        assert_eq!(settings.reveal.tick, Duration::from_millis(45));
        assert_eq!(settings.reveal.max_chunk, 5);
        assert_eq!(settings.greeting, chat.greeting);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "murmur",
            "--endpoint",
            "http://127.0.0.1:8080/xiaozhi/chat",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("http://127.0.0.1:8080/xiaozhi/chat"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
