//! Typewriter reveal of an already complete reply.
//!
//! A reveal run walks the full text in small random chunks on a fixed tick
//! and hands each chunk to a [`RevealSink`]. Only one run is live per engine:
//! starting a new one cancels the previous timer before the new task is
//! spawned.

use std::ops::Range;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifier of one reveal run, unique per engine
pub type RunId = u64;

/// Shortest tick a run will use; `tokio::time::interval` rejects zero.
pub const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSettings {
    pub tick: Duration,
    pub min_chunk: usize,
    pub max_chunk: usize,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(30),
            min_chunk: 1,
            max_chunk: 3,
        }
    }
}

/// Receives the chunks of a reveal run.
///
/// `write` returns false when the target is gone or the run has been
/// superseded; the run stops without writing again.
pub trait RevealSink: Send + Sync + 'static {
    fn write(&self, run: RunId, chunk: &str, done: bool) -> bool;
}

/// Position within the text being revealed, measured in bytes but always
/// advanced by whole characters.
#[derive(Debug, Clone)]
pub struct RevealCursor {
    text: String,
    pos: usize,
}

impl RevealCursor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pos: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revealed(&self) -> &str {
        &self.text[..self.pos]
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Step forward by `min..=max` characters, clamped to what is left.
    /// Returns the byte range of the chunk, or `None` once finished.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R, min: usize, max: usize) -> Option<Range<usize>> {
        if self.is_done() {
            return None;
        }
        let min = min.max(1);
        let want = rng.gen_range(min..=max.max(min));
        let rest = &self.text[self.pos..];
        let len = rest
            .char_indices()
            .nth(want)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let start = self.pos;
        self.pos += len;
        Some(start..self.pos)
    }
}

struct RevealRun {
    id: RunId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the single live reveal run
pub struct RevealEngine {
    settings: RevealSettings,
    next_run: RunId,
    current: Option<RevealRun>,
}

impl RevealEngine {
    /// A zero tick is raised to [`MIN_TICK`].
    pub fn new(mut settings: RevealSettings) -> Self {
        settings.tick = settings.tick.max(MIN_TICK);
        Self {
            settings,
            next_run: 1,
            current: None,
        }
    }

    pub fn settings(&self) -> RevealSettings {
        self.settings
    }

    /// Id of the run that currently owns the timer
    pub fn current_run(&self) -> Option<RunId> {
        self.current.as_ref().map(|run| run.id)
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|run| !run.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel any live run, then spawn a new one for `full_text`.
    ///
    /// Empty text schedules nothing and returns `None`. Must be called from
    /// within a tokio runtime.
    pub fn start<S: RevealSink>(&mut self, full_text: impl Into<String>, sink: S) -> Option<RunId> {
        self.cancel();

        let full_text = full_text.into();
        if full_text.is_empty() {
            return None;
        }

        let id = self.next_run;
        self.next_run += 1;

        let token = CancellationToken::new();
        let settings = self.settings;
        let handle = tokio::spawn(run_reveal(id, RevealCursor::new(full_text), settings, sink, token.clone()));

        debug!("Reveal run {} started", id);
        self.current = Some(RevealRun { id, token, handle });
        Some(id)
    }

    /// Forget `run` if it is the current one. Called when a run completes.
    pub fn finish(&mut self, run: RunId) {
        if self.current_run() == Some(run) {
            self.current = None;
        }
    }

    /// Stop the live run, leaving whatever it already wrote untouched
    pub fn cancel(&mut self) {
        if let Some(run) = self.current.take() {
            run.token.cancel();
            run.handle.abort();
            debug!("Reveal run {} cancelled", run.id);
        }
    }
}

impl Drop for RevealEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_reveal<S: RevealSink>(
    id: RunId,
    mut cursor: RevealCursor,
    settings: RevealSettings,
    sink: S,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.tick);
    // The first tick of an interval fires immediately; chunks start one period in.
    ticker.tick().await;
    let mut rng = StdRng::from_entropy();

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(range) = cursor.advance(&mut rng, settings.min_chunk, settings.max_chunk) else {
            return;
        };
        let done = cursor.is_done();
        if !sink.write(id, &cursor.text()[range], done) || done {
            debug!("Reveal run {} stopped (done: {})", id, done);
            return;
        }
    }
}
