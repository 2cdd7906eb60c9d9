//! Shared utility functions for the stagehand crate.

use regex::Regex;
use std::sync::LazyLock;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("filename pattern is a valid regex"));

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the outermost JSON object, skipping braces
/// inside string literals.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// Turn a feature name into a file-system safe stem.
///
/// Runs of characters outside `[A-Za-z0-9._-]` collapse into a single `-`;
/// leading dots and dashes are stripped so the result can never be a
/// hidden file or a parent-directory reference.
pub fn file_stem(feature: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(feature.trim(), "-");
    let stem = replaced.trim_start_matches(['.', '-']).trim_end_matches('-');
    if stem.is_empty() {
        "feature".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_simple() {
        let text = r#"{"key": "value"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_with_prefix() {
        let text = r#"Here is the JSON: {"key": "value"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_with_suffix() {
        let text = r#"{"key": "value"} and some more text"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"{"outer": {"inner": "value"}}"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"outer": {"inner": "value"}}"#.to_string())
        );
    }

    #[test]
    fn test_extract_json_object_brace_in_string() {
        let text = r#"log line {"message": "use } carefully", "n": 1} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"message": "use } carefully", "n": 1}"#.to_string())
        );
    }

    #[test]
    fn test_extract_json_object_no_json() {
        assert_eq!(extract_json_object("No JSON here"), None);
    }

    #[test]
    fn test_extract_json_object_unclosed() {
        let text = r#"{"key": "value""#;
        assert_eq!(extract_json_object(text), None);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("login-redesign"), "login-redesign");
        assert_eq!(file_stem("Login Redesign v2"), "Login-Redesign-v2");
        assert_eq!(file_stem("../../etc/passwd"), "etc-passwd");
        assert_eq!(file_stem("   "), "feature");
        assert_eq!(file_stem("a/b\\c"), "a-b-c");
    }
}
