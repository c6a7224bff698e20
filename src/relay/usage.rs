//! Token usage extraction.
//!
//! Providers report usage under a `usage` object using one of two field-name
//! schemes (`input_tokens`/`output_tokens` or `prompt_tokens`/`completion_tokens`).
//! Extraction is best-effort: anything unparseable yields `(0, 0)`.

use serde_json::Value;

use crate::providers::{UsageScheme, provider_spec};

/// Usage as `(input_tokens, output_tokens)`
pub type UsageDelta = (u64, u64);

fn field(usage: &Value, name: &str) -> u64 {
    usage.get(name).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn is_zero(delta: UsageDelta) -> bool {
    delta == (0, 0)
}

/// Locate the usage object: top-level `usage`, or `message.usage` as sent in
/// Anthropic's `message_start` event.
fn usage_object(doc: &Value) -> Option<&Value> {
    doc.get("usage")
        .filter(|u| u.is_object())
        .or_else(|| doc.get("message").and_then(|m| m.get("usage")))
        .filter(|u| u.is_object())
}

/// Parse a single JSON document for usage, preferring the provider's scheme
/// and falling back to the other one when the preferred pair is all zero.
pub fn extract_usage(body: &[u8], provider: &str) -> UsageDelta {
    let Ok(doc) = serde_json::from_slice::<Value>(body) else {
        return (0, 0);
    };
    let Some(usage) = usage_object(&doc) else {
        return (0, 0);
    };

    let input_output = (field(usage, "input_tokens"), field(usage, "output_tokens"));
    let prompt_completion = (
        field(usage, "prompt_tokens"),
        field(usage, "completion_tokens"),
    );

    let (preferred, fallback) = match provider_spec(provider).usage_scheme {
        UsageScheme::InputOutput => (input_output, prompt_completion),
        UsageScheme::PromptCompletion => (prompt_completion, input_output),
    };

    if is_zero(preferred) { fallback } else { preferred }
}

/// Payload of one captured line: SSE `data:` lines and bare NDJSON records.
fn event_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim_start();
        return (data != "[DONE]" && !data.is_empty()).then_some(data);
    }
    line.starts_with('{').then_some(line)
}

/// Scan a captured stream from the end and return the last event that
/// carries non-zero usage. Totals are only known once generation finishes,
/// so in practice this touches a handful of trailing events.
pub fn extract_usage_from_events(captured: &[u8], provider: &str) -> UsageDelta {
    let text = String::from_utf8_lossy(captured);

    text.lines()
        .rev()
        .filter_map(event_payload)
        .map(|payload| extract_usage(payload.as_bytes(), provider))
        .find(|delta| !is_zero(*delta))
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ANTHROPIC, OLLAMA, OPENAI};

    #[test]
    fn test_anthropic_json_body() {
        let body = br#"{"id":"msg_1","type":"message","usage":{"input_tokens":120,"output_tokens":45}}"#;
        assert_eq!(extract_usage(body, ANTHROPIC), (120, 45));
    }

    #[test]
    fn test_openai_prefers_prompt_completion() {
        let body = br#"{"usage":{"input_tokens":0,"output_tokens":0,"prompt_tokens":30,"completion_tokens":12,"total_tokens":42}}"#;
        assert_eq!(extract_usage(body, OPENAI), (30, 12));
    }

    #[test]
    fn test_openai_falls_back_to_input_output() {
        // Responses API reports input/output names
        let body = br#"{"usage":{"input_tokens":8,"output_tokens":3}}"#;
        assert_eq!(extract_usage(body, OPENAI), (8, 3));
    }

    #[test]
    fn test_anthropic_falls_back_to_prompt_completion() {
        let body = br#"{"usage":{"prompt_tokens":5,"completion_tokens":6}}"#;
        assert_eq!(extract_usage(body, ANTHROPIC), (5, 6));
    }

    #[test]
    fn test_unknown_provider_prefers_input_output() {
        let body = br#"{"usage":{"input_tokens":1,"output_tokens":2,"prompt_tokens":10,"completion_tokens":20}}"#;
        assert_eq!(extract_usage(body, "mystery"), (1, 2));
        let body = br#"{"usage":{"prompt_tokens":10,"completion_tokens":20}}"#;
        assert_eq!(extract_usage(body, "mystery"), (10, 20));
        assert_eq!(extract_usage(body, OLLAMA), (10, 20));
    }

    #[test]
    fn test_malformed_input_is_zero() {
        assert_eq!(extract_usage(b"not json", ANTHROPIC), (0, 0));
        assert_eq!(extract_usage(b"", OPENAI), (0, 0));
        assert_eq!(extract_usage(br#"{"usage":"lots"}"#, OPENAI), (0, 0));
        assert_eq!(extract_usage(br#"{"usage":{"input_tokens":-3}}"#, ANTHROPIC), (0, 0));
        assert_eq!(extract_usage(br#"[1,2,3]"#, ANTHROPIC), (0, 0));
    }

    #[test]
    fn test_message_start_usage() {
        let body = br#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":25,"output_tokens":1}}}"#;
        assert_eq!(extract_usage(body, ANTHROPIC), (25, 1));
    }

    #[test]
    fn test_anthropic_stream_takes_final_delta() {
        let captured = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":25,\"output_tokens\":1}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"input_tokens\":25,\"output_tokens\":15}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), ANTHROPIC),
            (25, 15)
        );
    }

    #[test]
    fn test_openai_stream_usage_chunk_before_done() {
        let captured = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}],\"usage\":null}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}],\"usage\":null}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), OPENAI),
            (9, 2)
        );
    }

    #[test]
    fn test_only_last_frame_has_usage() {
        let captured = concat!(
            "data: {\"usage\":{\"input_tokens\":0,\"output_tokens\":0}}\n\n",
            "data: {\"delta\":\"x\"}\n\n",
            "data: {\"usage\":{}}\n\n",
            "data: {\"usage\":{\"input_tokens\":40,\"output_tokens\":7}}\n\n",
        );
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), ANTHROPIC),
            (40, 7)
        );
    }

    #[test]
    fn test_later_frame_wins_over_earlier() {
        let captured = concat!(
            "data: {\"usage\":{\"input_tokens\":1,\"output_tokens\":1}}\n",
            "data: {\"usage\":{\"input_tokens\":2,\"output_tokens\":9}}\n",
        );
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), ANTHROPIC),
            (2, 9)
        );
    }

    #[test]
    fn test_ndjson_records() {
        let captured = concat!(
            "{\"message\":{\"content\":\"a\"},\"done\":false}\n",
            "{\"done\":true,\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":8}}\n",
        );
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), OLLAMA),
            (4, 8)
        );
    }

    #[test]
    fn test_stream_without_usage_is_zero() {
        let captured = "data: {\"delta\":\"x\"}\n\ndata: [DONE]\n\n: keep-alive\n\n";
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), OPENAI),
            (0, 0)
        );
        assert_eq!(extract_usage_from_events(b"", OPENAI), (0, 0));
        assert_eq!(
            extract_usage_from_events(&[0xff, 0xfe, b'\n'], ANTHROPIC),
            (0, 0)
        );
    }

    #[test]
    fn test_crlf_framing() {
        let captured = "data: {\"usage\":{\"input_tokens\":3,\"output_tokens\":4}}\r\n\r\n";
        assert_eq!(
            extract_usage_from_events(captured.as_bytes(), ANTHROPIC),
            (3, 4)
        );
    }
}
