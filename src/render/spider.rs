use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::debug;

use super::{FetchedPage, PageSource};
use crate::error::FetchError;

/// Browser-rendered pages via spider.cloud.
pub struct SpiderSource {
    spider: Spider,
}

impl SpiderSource {
    /// Reads `SPIDER_API_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self { spider })
    }
}

#[async_trait]
impl PageSource for SpiderSource {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| FetchError::unreachable(url, e))?;
        debug!("spider.cloud answered for {} in {}ms", url, start.elapsed().as_millis());

        parse_response(url, response)
    }
}

/// spider.cloud answers with `[{"content": ..., "status": ..., "url": ...}]`,
/// sometimes wrapped in a JSON string.
fn parse_response(url: &str, value: serde_json::Value) -> Result<FetchedPage, FetchError> {
    let parsed: serde_json::Value = match value.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(value.clone()),
        None => value,
    };

    let first = parsed.as_array().and_then(|arr| arr.first());

    let status = first
        .and_then(|obj| obj.get("status"))
        .and_then(|s| s.as_u64())
        .map(|s| u16::try_from(s).unwrap_or(u16::MAX));
    if let Some(status) = status.filter(|s| *s >= 400) {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let html = first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| FetchError::EmptyDocument { url: url.to_string() })?;

    let final_url = first
        .and_then(|obj| obj.get("url"))
        .and_then(|u| u.as_str())
        .unwrap_or(url);

    Ok(FetchedPage {
        url: final_url.to_string(),
        html: html.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_first_result() {
        let v = json!([{"content": "<p>hi</p>", "status": 200, "url": "https://clutch.co/p?x"}]);
        let page = parse_response("https://clutch.co/p", v).unwrap();
        assert_eq!(page.html, "<p>hi</p>");
        assert_eq!(page.url, "https://clutch.co/p?x");
    }

    #[test]
    fn unwraps_string_payload() {
        let v = json!(r#"[{"content": "<p>hi</p>", "status": 200}]"#);
        let page = parse_response("https://clutch.co/p", v).unwrap();
        assert_eq!(page.url, "https://clutch.co/p");
    }

    #[test]
    fn error_status_is_fetch_error() {
        let v = json!([{"content": "blocked", "status": 403}]);
        let err = parse_response("https://clutch.co/p", v).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }

    #[test]
    fn out_of_range_status_is_not_truncated() {
        // 65736 would wrap to 200 with a plain cast.
        let v = json!([{"content": "<p>hi</p>", "status": 65736}]);
        assert!(matches!(
            parse_response("https://clutch.co/p", v),
            Err(FetchError::Status { .. })
        ));
    }

    #[test]
    fn missing_content_is_empty_document() {
        let v = json!([{"status": 200}]);
        assert!(matches!(
            parse_response("https://clutch.co/p", v),
            Err(FetchError::EmptyDocument { .. })
        ));
    }
}
