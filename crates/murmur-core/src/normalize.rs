//! Turning a loosely typed backend body into reply text.

use serde_json::Value;

/// Reply keys checked in order
pub const REPLY_KEYS: [&str; 2] = ["message", "response"];

/// Where the reply text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// A truthy scalar under one of [`REPLY_KEYS`]
    Field(&'static str),
    /// Valid JSON without a usable reply field; the body is used verbatim
    RawBody,
    /// Not JSON at all
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReply {
    pub text: String,
    pub source: ReplySource,
}

impl NormalizedReply {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Extract the reply from a raw response body.
///
/// Structured bodies yield the first truthy scalar under `message` then
/// `response`; anything else falls back to the body text itself.
pub fn normalize_reply(raw: &str) -> NormalizedReply {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => {
            return NormalizedReply {
                text: raw.to_string(),
                source: ReplySource::PlainText,
            }
        }
    };

    let field = value.as_object().and_then(|object| {
        REPLY_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(scalar_text).map(|text| (*key, text)))
    });

    match field {
        Some((key, text)) => NormalizedReply {
            text,
            source: ReplySource::Field(key),
        },
        None => NormalizedReply {
            text: raw.to_string(),
            source: ReplySource::RawBody,
        },
    }
}

/// Text of a truthy scalar: a non-empty string, a non-zero number or `true`.
/// `false`, `0`, `null`, objects and arrays count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(n) if n.as_f64().map_or(true, |f| f != 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key_wins() {
        let reply = normalize_reply(r#"{"message": "X", "response": "Y"}"#);
        assert_eq!(reply.text, "X");
        assert_eq!(reply.source, ReplySource::Field("message"));
    }

    #[test]
    fn test_response_key_fallback() {
        let reply = normalize_reply(r#"{"response": "Y"}"#);
        assert_eq!(reply.text, "Y");
        assert_eq!(reply.source, ReplySource::Field("response"));
    }

    #[test]
    fn test_empty_message_falls_through_to_response() {
        let reply = normalize_reply(r#"{"message": "", "response": "Y"}"#);
        assert_eq!(reply.text, "Y");
    }

    #[test]
    fn test_plain_text_body() {
        let reply = normalize_reply("Z");
        assert_eq!(reply.text, "Z");
        assert_eq!(reply.source, ReplySource::PlainText);
    }

    #[test]
    fn test_empty_object_uses_raw_body() {
        let reply = normalize_reply("{}");
        assert_eq!(reply.text, "{}");
        assert_eq!(reply.source, ReplySource::RawBody);
    }

    #[test]
    fn test_truthy_scalars_are_stringified() {
        let reply = normalize_reply(r#"{"message": 42}"#);
        assert_eq!(reply.text, "42");
        assert_eq!(reply.source, ReplySource::Field("message"));

        let reply = normalize_reply(r#"{"response": true}"#);
        assert_eq!(reply.text, "true");
        assert_eq!(reply.source, ReplySource::Field("response"));
    }

    #[test]
    fn test_falsy_and_nested_fields_are_skipped() {
        let reply = normalize_reply(r#"{"message": 0, "response": "Y"}"#);
        assert_eq!(reply.text, "Y");

        let body = r#"{"message": false, "response": {"text": "nested"}}"#;
        let reply = normalize_reply(body);
        assert_eq!(reply.text, body);
        assert_eq!(reply.source, ReplySource::RawBody);

        let body = r#"{"message": null, "response": ""}"#;
        assert_eq!(normalize_reply(body).source, ReplySource::RawBody);
    }

    #[test]
    fn test_non_object_json_uses_raw_body() {
        let reply = normalize_reply(r#""quoted""#);
        assert_eq!(reply.text, r#""quoted""#);
        assert_eq!(reply.source, ReplySource::RawBody);
    }

    #[test]
    fn test_empty_body_is_empty_reply() {
        let reply = normalize_reply("");
        assert!(reply.is_empty());
        assert_eq!(reply.source, ReplySource::PlainText);
    }
}
