//! Multi-strategy extraction of a strict-JSON object from an LLM reply.
//!
//! LLMs asked for "strict JSON" routinely wrap it in a fenced code block or
//! prepend prose. Tried in order: fenced block, first balanced object or
//! array, raw parse.

use serde::de::DeserializeOwned;

pub fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Some(fenced) = extract_fenced_block(text) {
        if let Ok(v) = serde_json::from_str(&fenced) {
            return Some(v);
        }
    }
    if let Some(balanced) = extract_first_balanced(text) {
        if let Ok(v) = serde_json::from_str(&balanced) {
            return Some(v);
        }
    }
    serde_json::from_str(text.trim()).ok()
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_marker = &text[start + 3..];
    // Skip an optional language tag on the same line as the opening fence.
    let body_start = after_marker.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_marker[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

fn extract_first_balanced(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'{' || b == b'[' {
            let open = b;
            let close = if open == b'{' { b'}' } else { b']' };
            let mut depth = 0i32;
            let mut in_string = false;
            let mut escape = false;
            for (j, &c) in bytes[i..].iter().enumerate() {
                if in_string {
                    if escape {
                        escape = false;
                    } else if c == b'\\' {
                        escape = true;
                    } else if c == b'"' {
                        in_string = false;
                    }
                    continue;
                }
                match c {
                    b'"' => in_string = true,
                    c if c == open => depth += 1,
                    c if c == close => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(text[i..i + j + 1].to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: i32,
    }

    #[test]
    fn parses_raw_json() {
        let r: Sample = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(r, Sample { a: 1 });
    }

    #[test]
    fn parses_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 2}\n```\nhope that helps";
        let r: Sample = extract_json(text).unwrap();
        assert_eq!(r, Sample { a: 2 });
    }

    #[test]
    fn parses_first_balanced_object_amid_prose() {
        let text = "Sure, the answer is {\"a\": 3} and nothing else.";
        let r: Sample = extract_json(text).unwrap();
        assert_eq!(r, Sample { a: 3 });
    }

    #[test]
    fn balanced_object_ignores_braces_inside_strings() {
        let text = r#"prose {"a": 4, "note": "not a } brace"}"#;
        let r: Sample = extract_json(text).unwrap();
        assert_eq!(r, Sample { a: 4 });
    }

    #[test]
    fn returns_none_for_garbage() {
        let r: Option<Sample> = extract_json("no json here at all");
        assert!(r.is_none());
    }
}
