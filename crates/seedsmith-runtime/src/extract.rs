use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static JSON_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)```").ok());

/// Parse the first ```` ```json ```` fenced block in `text`.
///
/// `None` when there is no such block or its body is not valid JSON.
pub fn extract_json_block(text: &str) -> Option<Value> {
    let body = JSON_BLOCK.as_ref()?.captures(text)?.get(1)?.as_str().trim();
    serde_json::from_str(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_block_inside_prose() {
        let text = "Here you go:\n```json\n{\"1\": \"USER\"}\n```\nDone.";
        assert_eq!(extract_json_block(text), Some(json!({"1": "USER"})));
    }

    #[test]
    fn missing_or_malformed_is_none() {
        assert_eq!(extract_json_block("no block here"), None);
        assert_eq!(extract_json_block("```json\n{\"a\": }\n```"), None);
        assert_eq!(extract_json_block("```text\n{}\n```"), None);
        assert_eq!(extract_json_block("```json\n{\"open\": true}"), None);
    }

    #[test]
    fn first_block_wins() {
        let text = "```json\n[1]\n```\n```json\n[2]\n```";
        assert_eq!(extract_json_block(text), Some(json!([1])));
    }
}
