//! Tolerant readers for completion text.
//!
//! Models wrap JSON in fences, add prose around it, or answer with Python
//! literals. Each reader tries the strict form first and falls back step by
//! step; total failure is `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::literal;
use crate::llm_client::strip_code_fences;
use crate::models::fill::value_text;

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quote regex"));

/// Reads a JSON object from completion text.
///
/// Order: fences stripped, whole text as JSON, greedy first-`{`-to-last-`}`
/// slice as JSON, then the permissive literal parser on the whole text and
/// on the slice.
pub fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return into_object(value);
    }

    let braced = brace_slice(&text);
    if let Some(slice) = braced {
        if let Ok(value) = serde_json::from_str::<Value>(slice) {
            return into_object(value);
        }
    }

    literal::parse(&text)
        .or_else(|| braced.and_then(literal::parse))
        .and_then(into_object)
}

/// Reads a JSON array of names from completion text.
///
/// A JSON answer that is not an array yields `None`. Text that is not JSON
/// at all falls back to every double-quoted string in it.
pub fn parse_string_array(raw: &str) -> Option<Vec<String>> {
    let text = strip_code_fences(raw);

    match serde_json::from_str::<Value>(&text) {
        // `null` entries stay as blanks so later names keep their position.
        Ok(Value::Array(items)) => Some(items.iter().map(value_text).collect()),
        Ok(_) => None,
        Err(_) => {
            let quoted: Vec<String> = QUOTED
                .captures_iter(&text)
                .map(|c| c[1].to_string())
                .collect();
            (!quoted.is_empty()).then_some(quoted)
        }
    }
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// From the first `{` to the last `}`, inclusive.
fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_object() {
        let map = parse_object(r#"{"{1}": "张三"}"#).unwrap();
        assert_eq!(Value::Object(map), json!({"{1}": "张三"}));
    }

    #[test]
    fn test_fenced_object_with_trailing_prose() {
        let raw = "Here you go:\n```json\n{\"{1}\": \"张三\", \"{2}\": \"\"}\n```\nLet me know if you need more.";
        let map = parse_object(raw).unwrap();
        assert_eq!(map.get("{1}"), Some(&json!("张三")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_python_literal_answer() {
        let map = parse_object("{'{1}': '张三', '{2}': None}").unwrap();
        assert_eq!(map.get("{2}"), Some(&Value::Null));
    }

    #[test]
    fn test_python_literal_inside_prose() {
        let map = parse_object("结果如下：{'1': '男'}。").unwrap();
        assert_eq!(map.get("1"), Some(&json!("男")));
    }

    #[test]
    fn test_unusable_answers() {
        assert_eq!(parse_object("抱歉，我无法完成"), None);
        assert_eq!(parse_object("[1, 2]"), None);
        assert_eq!(parse_object("{broken"), None);
        assert_eq!(parse_object(""), None);
    }

    #[test]
    fn test_string_array_json_and_fallback() {
        assert_eq!(
            parse_string_array("```json\n[\"身高\", \"体重\"]\n```"),
            Some(vec!["身高".to_string(), "体重".to_string()])
        );
        assert_eq!(
            parse_string_array("缺失字段有 \"照片\" 和 \"签名\""),
            Some(vec!["照片".to_string(), "签名".to_string()])
        );
        assert_eq!(parse_string_array("{\"a\": 1}"), None);
        assert_eq!(parse_string_array("nothing here"), None);
    }
}
