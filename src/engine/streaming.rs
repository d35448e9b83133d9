use std::sync::mpsc;
use std::thread;

use crate::engine::llm_client::{ChatBackend, ChatRequest};
use crate::error::BackendError;

/// Runs a streamed completion. The backend produces fragments on a scoped
/// thread while this thread hands each one to `on_fragment` and builds the
/// full text. Any producer failure discards what was accumulated.
pub fn stream_completion(
    backend: &dyn ChatBackend,
    request: &ChatRequest,
    on_fragment: &mut dyn FnMut(&str),
) -> Result<String, BackendError> {
    let (tx, rx) = mpsc::channel::<String>();

    thread::scope(|scope| {
        let producer = scope.spawn(move || backend.stream(request, &tx));

        let mut full = String::new();
        for fragment in rx {
            on_fragment(&fragment);
            full.push_str(&fragment);
        }

        match producer.join() {
            Ok(Ok(())) => Ok(full),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BackendError::StreamAborted("stream producer panicked".into())),
        }
    })
}

const NARRATION_KEY: &str = "\"narration\"";

/// Bytes of brace-free text seen before a reply is treated as plain prose.
const PROSE_LOOKAHEAD: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreviewState {
    Undecided,
    Searching,
    InValue,
    Done,
    Passthrough,
}

/// Pulls the human-readable narration text out of a streamed JSON reply as
/// it arrives, so a terminal can show prose instead of raw JSON. Replies
/// that are not JSON pass through untouched.
#[derive(Debug)]
pub struct NarrationPreview {
    raw: String,
    cursor: usize,
    state: PreviewState,
}

impl Default for NarrationPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrationPreview {
    pub fn new() -> Self {
        Self {
            raw: String::new(),
            cursor: 0,
            state: PreviewState::Undecided,
        }
    }

    /// Feeds one fragment and returns the newly visible narration text.
    pub fn push(&mut self, fragment: &str) -> String {
        self.raw.push_str(fragment);
        let mut out = String::new();

        loop {
            match self.state {
                PreviewState::Undecided => {
                    // Fences and lead-in prose are skipped once a brace shows up.
                    if self.raw.contains('{') {
                        self.state = PreviewState::Searching;
                    } else if self.raw.trim_start().starts_with('`') || self.raw.len() < PROSE_LOOKAHEAD {
                        return out;
                    } else {
                        self.state = PreviewState::Passthrough;
                    }
                }

                PreviewState::Passthrough => {
                    out.push_str(&self.raw[self.cursor..]);
                    self.cursor = self.raw.len();
                    return out;
                }

                PreviewState::Searching => {
                    let Some(offset) = self.raw[self.cursor..].find(NARRATION_KEY) else {
                        // Keep enough tail to match a key split across fragments.
                        let mut keep = self.raw.len().saturating_sub(NARRATION_KEY.len() - 1);
                        while !self.raw.is_char_boundary(keep) {
                            keep -= 1;
                        }
                        self.cursor = self.cursor.max(keep);
                        return out;
                    };

                    let key_at = self.cursor + offset;
                    let after_key = key_at + NARRATION_KEY.len();
                    match value_start(&self.raw[after_key..]) {
                        ValueStart::Found(len) => {
                            self.cursor = after_key + len;
                            self.state = PreviewState::InValue;
                        }
                        ValueStart::Incomplete => {
                            self.cursor = key_at;
                            return out;
                        }
                        ValueStart::NotAString => self.cursor = after_key,
                    }
                }

                PreviewState::InValue => {
                    let (text, consumed, closed) = decode_string_prefix(&self.raw[self.cursor..]);
                    out.push_str(&text);
                    self.cursor += consumed;
                    if closed {
                        self.state = PreviewState::Done;
                    }
                    return out;
                }

                PreviewState::Done => return out,
            }
        }
    }
}

enum ValueStart {
    Found(usize),
    Incomplete,
    NotAString,
}

/// Looks for `: "` after a key. Returns the byte length up to and including
/// the opening quote.
fn value_start(s: &str) -> ValueStart {
    let mut seen_colon = false;
    for (i, c) in s.char_indices() {
        match c {
            c if c.is_whitespace() => continue,
            ':' if !seen_colon => seen_colon = true,
            '"' if seen_colon => return ValueStart::Found(i + 1),
            _ => return ValueStart::NotAString,
        }
    }
    ValueStart::Incomplete
}

/// Decodes the body of a JSON string up to its closing quote or up to the
/// last complete escape. Returns (decoded text, bytes consumed, closed).
fn decode_string_prefix(s: &str) -> (String, usize, bool) {
    let mut out = String::new();
    let mut consumed = 0;
    let mut chars = s.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return (out, i + 1, true),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' | 'f' => {}
                    'u' => {
                        let Some((decoded, len)) = decode_unicode_escape(&s[i..]) else {
                            break;
                        };
                        out.push(decoded);
                        for _ in 2..len {
                            chars.next();
                        }
                        consumed = i + len;
                        continue;
                    }
                    other => out.push(other),
                }
                consumed = i + 1 + escaped.len_utf8();
            }
            other => {
                out.push(other);
                consumed = i + other.len_utf8();
            }
        }
    }

    (out, consumed, false)
}

/// Decodes a `\uXXXX` escape at the start of `s`, joining a UTF-16
/// surrogate pair when the low half follows. Returns the char and the bytes
/// used, or `None` while the escape is still incomplete.
fn decode_unicode_escape(s: &str) -> Option<(char, usize)> {
    let unit = u32::from_str_radix(s.get(2..6)?, 16).ok();
    let Some(high @ 0xD800..=0xDBFF) = unit else {
        let decoded = unit.and_then(char::from_u32);
        return Some((decoded.unwrap_or(char::REPLACEMENT_CHARACTER), 6));
    };

    let rest = &s[6..];
    if rest.len() < 6 && is_partial_unicode_escape(rest) {
        return None;
    }
    let low = rest
        .strip_prefix("\\u")
        .and_then(|tail| tail.get(..4))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .filter(|low| (0xDC00..=0xDFFF).contains(low));
    match low {
        Some(low) => {
            let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            Some((char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER), 12))
        }
        None => Some((char::REPLACEMENT_CHARACTER, 6)),
    }
}

fn is_partial_unicode_escape(s: &str) -> bool {
    s.chars().enumerate().all(|(k, c)| match k {
        0 => c == '\\',
        1 => c == 'u',
        _ => c.is_ascii_hexdigit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;

    struct Chunked(Vec<&'static str>);

    impl ChatBackend for Chunked {
        fn complete(&self, _request: &ChatRequest) -> Result<String, BackendError> {
            Ok(self.0.concat())
        }

        fn stream(&self, _request: &ChatRequest, fragments: &Sender<String>) -> Result<(), BackendError> {
            for part in &self.0 {
                fragments.send(part.to_string()).unwrap();
            }
            Ok(())
        }
    }

    struct Broken;

    impl ChatBackend for Broken {
        fn complete(&self, _request: &ChatRequest) -> Result<String, BackendError> {
            Err(BackendError::Backend("offline".into()))
        }

        fn stream(&self, _request: &ChatRequest, fragments: &Sender<String>) -> Result<(), BackendError> {
            fragments.send("{\"narration\": \"half".into()).unwrap();
            Err(BackendError::StreamAborted("connection reset".into()))
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::json("test", "system", "prompt".into(), 0.7, 300)
    }

    #[test]
    fn accumulates_and_forwards_every_fragment() {
        let backend = Chunked(vec!["{\"narr", "ation\": \"Hi\"", "}"]);
        let mut seen = Vec::new();
        let full = stream_completion(&backend, &request(), &mut |f: &str| seen.push(f.to_string())).unwrap();

        assert_eq!(full, "{\"narration\": \"Hi\"}");
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn producer_failure_discards_partial_text() {
        let mut seen = 0;
        let result = stream_completion(&Broken, &request(), &mut |_: &str| seen += 1);
        assert!(matches!(result, Err(BackendError::StreamAborted(_))));
        assert_eq!(seen, 1);
    }

    fn preview_all(parts: &[&str]) -> String {
        let mut preview = NarrationPreview::new();
        parts.iter().map(|p| preview.push(p)).collect()
    }

    #[test]
    fn preview_extracts_narration_across_fragment_boundaries() {
        let text = preview_all(&[
            "{\"sugg",
            "estedActions\": [], \"narr",
            "ation\"",
            " :  \"The door ",
            "creaks open.\", \"stateDelta\": {}}",
        ]);
        assert_eq!(text, "The door creaks open.");
    }

    #[test]
    fn preview_handles_split_escapes() {
        let text = preview_all(&["{\"narration\": \"He said \\", "\"run\\", "\"\\nthen \\u00e9", "t\\u00e9\"}"]);
        assert_eq!(text, "He said \"run\"\nthen été");
    }

    #[test]
    fn preview_passes_plain_text_through() {
        let prose = "The wind howls through the pines. ".repeat(6);
        assert_eq!(preview_all(&["  ", &prose]), format!("  {}", prose));
    }

    #[test]
    fn preview_holds_short_text_without_a_brace() {
        assert_eq!(preview_all(&["  The wind ", "howls."]), "");
    }

    #[test]
    fn preview_skips_code_fence() {
        let text = preview_all(&["```json\n{\"narration\": ", "\"Fog rolls in.\"}\n", "```"]);
        assert_eq!(text, "Fog rolls in.");
    }

    #[test]
    fn preview_skips_prose_before_the_object() {
        let text = preview_all(&["Sure! Here is the scene:\n", "{\"narration\": \"Rain falls.\"}"]);
        assert_eq!(text, "Rain falls.");
    }

    #[test]
    fn preview_ignores_key_without_string_value() {
        let text = preview_all(&["{\"narration\": null, \"note\": \"\\\"narration\\\"\"}"]);
        assert_eq!(text, "");
    }

    #[test]
    fn decode_prefix_stops_before_incomplete_unicode_escape() {
        let (text, consumed, closed) = decode_string_prefix("ab\\u00");
        assert_eq!(text, "ab");
        assert_eq!(consumed, 2);
        assert!(!closed);
    }

    #[test]
    fn decode_prefix_joins_surrogate_pairs() {
        let (text, consumed, closed) = decode_string_prefix("\\ud83c\\udf1f star\"");
        assert_eq!(text, "\u{1F31F} star");
        assert_eq!(consumed, 18);
        assert!(closed);
    }

    #[test]
    fn decode_prefix_waits_for_low_surrogate() {
        let (text, consumed, closed) = decode_string_prefix("ab\\ud83c\\udf");
        assert_eq!(text, "ab");
        assert_eq!(consumed, 2);
        assert!(!closed);
    }

    #[test]
    fn lone_high_surrogate_becomes_replacement() {
        let (text, _, closed) = decode_string_prefix("\\ud83c!\"");
        assert_eq!(text, "\u{FFFD}!");
        assert!(closed);
    }

    #[test]
    fn preview_joins_surrogate_pair_split_across_fragments() {
        let text = preview_all(&["{\"narration\": \"\\ud83c", "\\udf1f glows\"}"]);
        assert_eq!(text, "\u{1F31F} glows");
    }
}
