use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::warn;
use url::Url;

use super::links::resolve_link_target;

/// Where a field's value may be found. Fields carry an ordered list of these;
/// the first one that yields something wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Whitespace-collapsed text of a matching node.
    Text(&'static str),
    /// Text of a matching node with each text run on its own line.
    Paragraphs(&'static str),
    /// Value of an attribute on a matching node.
    Attr(&'static str, &'static str),
    /// Destination of a matching anchor, unwrapped from tracking redirects.
    Link(&'static str),
    /// A string value from the page's JSON-LD blocks.
    JsonLd(&'static str),
}

/// Resolves fields against a parsed document via ordered fallback locators.
pub struct FieldExtractor {
    origin: Url,
}

impl FieldExtractor {
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn resolve(&self, doc: &Html, candidates: &[Locator]) -> Option<String> {
        self.resolve_in(doc.root_element(), candidates)
    }

    /// First non-empty value from the first locator that produces one.
    /// Later locators are not evaluated.
    pub fn resolve_in(&self, scope: ElementRef<'_>, candidates: &[Locator]) -> Option<String> {
        candidates
            .iter()
            .find_map(|loc| self.values(scope, loc).into_iter().next())
    }

    pub fn resolve_all(&self, doc: &Html, candidates: &[Locator]) -> Vec<String> {
        self.resolve_all_in(doc.root_element(), candidates)
    }

    /// Every non-empty value of the first locator that produces any.
    pub fn resolve_all_in(&self, scope: ElementRef<'_>, candidates: &[Locator]) -> Vec<String> {
        candidates
            .iter()
            .map(|loc| self.values(scope, loc))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    fn values(&self, scope: ElementRef<'_>, loc: &Locator) -> Vec<String> {
        match *loc {
            Locator::Text(css) => select(scope, css)
                .into_iter()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .collect(),
            Locator::Paragraphs(css) => select(scope, css)
                .into_iter()
                .map(paragraph_text)
                .filter(|t| !t.is_empty())
                .collect(),
            Locator::Attr(css, attr) => select(scope, css)
                .into_iter()
                .filter_map(|el| el.value().attr(attr))
                .map(collapse_whitespace)
                .filter(|t| !t.is_empty())
                .collect(),
            Locator::Link(css) => select(scope, css)
                .into_iter()
                .filter_map(|el| el.value().attr("href"))
                .filter_map(|href| resolve_link_target(href, &self.origin))
                .collect(),
            Locator::JsonLd(key) => json_ld_values(scope, key),
        }
    }
}

/// Nodes under `scope` matching `css`. An unparsable selector matches nothing.
pub fn select<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => scope.select(&sel).collect(),
        Err(e) => {
            warn!("Invalid selector {:?}: {:?}", css, e);
            Vec::new()
        }
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn paragraph_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn json_ld_values(scope: ElementRef<'_>, key: &str) -> Vec<String> {
    let mut out = Vec::new();
    for script in select(scope, "script[type='application/ld+json']") {
        let raw: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            collect_json_ld(&value, key, &mut out);
        }
    }
    out
}

fn collect_json_ld(value: &Value, key: &str, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_json_ld(item, key, out);
            }
        }
        Value::Object(map) => {
            if let Some(s) = map.get(key).and_then(Value::as_str) {
                let s = collapse_whitespace(s);
                if !s.is_empty() {
                    out.push(s);
                }
            }
            if let Some(graph) = map.get("@graph") {
                collect_json_ld(graph, key, out);
            }
        }
        _ => {}
    }
}
