use regex::Regex;
use scraper::Html;
use serde_json::Value;
use tracing::{debug, warn};

use super::locator::select;

/// Recover a JSON object literal assigned to `marker` inside an inline
/// `<script>`, e.g. `window.chartPie = {...};`.
///
/// Malformed or truncated literals yield `None`.
pub fn extract(doc: &Html, marker: &str) -> Option<Value> {
    for script in select(doc.root_element(), "script") {
        let text: String = script.text().collect();
        if !text.contains(marker) {
            continue;
        }
        let Some(literal) = isolate_literal(&text, marker) else {
            debug!("Found {} but no object literal after it", marker);
            continue;
        };
        match serde_json::from_str::<Value>(literal) {
            Ok(value) => return Some(value),
            Err(e) => {
                warn!("Embedded data after {} failed to parse: {}", marker, e);
                return None;
            }
        }
    }
    None
}

/// Slice of `text` holding the object literal assigned to `marker`.
/// Tries every assignment site with a brace-balanced scan, then a regex
/// bounded by the statement's closing `};`.
fn isolate_literal<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    for (pos, _) in text.match_indices(marker) {
        let rest = text[pos + marker.len()..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        if !rest.starts_with('{') {
            continue;
        }
        if let Some(end) = balanced_object_end(rest) {
            return Some(&rest[..end]);
        }
    }

    let pattern = format!(r"(?sm){}\s*=\s*(\{{.*?\}})\s*;[ \t]*$", regex::escape(marker));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Byte offset just past the `}` closing the object that opens at `s[0]`.
/// Braces inside JSON strings do not count.
fn balanced_object_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"
        <script>var other = 1;</script>
        <script>
          window.dataLayer = [];
          window.chartPie = {"focus": {"charts": {"mobile": {"legend_title": "Mobile {apps}", "slices": [{"name": "iOS", "percent": 0.6}]}}}, "clients": {"slices": [{"name": "Small \"biz\"", "percent": 0.25}]}};
          window.after = {"x": 1};
        </script>"#;

    #[test]
    fn recovers_nested_literal() {
        let doc = Html::parse_document(NESTED);
        let v = extract(&doc, "window.chartPie").unwrap();
        assert_eq!(
            v["focus"]["charts"]["mobile"]["slices"][0]["name"].as_str(),
            Some("iOS")
        );
        assert_eq!(v["focus"]["charts"]["mobile"]["legend_title"].as_str(), Some("Mobile {apps}"));
        assert_eq!(v["clients"]["slices"][0]["name"].as_str(), Some("Small \"biz\""));
        assert!(v.get("x").is_none());
    }

    #[test]
    fn naive_lazy_bound_truncates_nested_literal() {
        let naive = Regex::new(r"(?s)window\.chartPie\s*=\s*(\{.*?\})").unwrap();
        let doc = Html::parse_document(NESTED);
        let script: String = select(doc.root_element(), "script")
            .into_iter()
            .map(|s| s.text().collect::<String>())
            .find(|t| t.contains("window.chartPie"))
            .unwrap();
        let cut = &naive.captures(&script).unwrap()[1];
        assert!(serde_json::from_str::<Value>(cut).is_err());
    }

    #[test]
    fn skips_non_assignment_mentions() {
        let doc = Html::parse_document(
            r#"<script>if (window.chartPie) { draw(); }
               window.chartPie = {"industries": {"slices": []}};</script>"#,
        );
        let v = extract(&doc, "window.chartPie").unwrap();
        assert!(v["industries"]["slices"].as_array().unwrap().is_empty());
    }

    #[test]
    fn malformed_literal_is_absent() {
        let doc = Html::parse_document(
            r#"<script>window.chartPie = {"clients": {"slices": [,]}};</script>"#,
        );
        assert!(extract(&doc, "window.chartPie").is_none());
    }

    #[test]
    fn truncated_literal_is_absent() {
        let doc = Html::parse_document(
            r#"<script>window.chartPie = {"clients": {"slices": [</script>"#,
        );
        assert!(extract(&doc, "window.chartPie").is_none());
    }

    #[test]
    fn missing_marker_is_absent() {
        let doc = Html::parse_document("<script>var a = {};</script>");
        assert!(extract(&doc, "window.chartPie").is_none());
    }

    #[test]
    fn balanced_end_ignores_string_braces() {
        let s = r#"{"a": "}{", "b": {"c": "\"}"}} trailing"#;
        let end = balanced_object_end(s).unwrap();
        assert_eq!(&s[..end], r#"{"a": "}{", "b": {"c": "\"}"}}"#);
    }
}
