//! [Exa](https://exa.ai) search client.
//!
//! Issues keyword searches restricted to a publication-date window and a
//! user location, asking for the article text (with HTML tags) in the same
//! call so no second fetch per article is needed.

use super::{NewsSearchClient, RawArticle, SearchError, SearchRequest};
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.exa.ai/search";

#[derive(Debug, Clone)]
pub struct ExaClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchBody<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    user_location: &'a str,
    num_results: usize,
    start_published_date: String,
    end_published_date: String,
    contents: ExaContents,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: ExaTextOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextOptions {
    include_html_tags: bool,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<RawArticle>,
}

impl ExaClient {
    /// Build a client with a per-request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
        })
    }

    fn body<'a>(request: &'a SearchRequest) -> ExaSearchBody<'a> {
        ExaSearchBody {
            query: &request.query,
            kind: "keyword",
            user_location: &request.region,
            num_results: request.num_results,
            start_published_date: request
                .start_published
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            end_published_date: request
                .end_published
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            contents: ExaContents {
                text: ExaTextOptions {
                    include_html_tags: true,
                },
            },
        }
    }
}

fn transport_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else if e.is_decode() {
        SearchError::Malformed(e.to_string())
    } else {
        SearchError::Transport(e.to_string())
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl NewsSearchClient for ExaClient {
    #[instrument(level = "info", skip_all, fields(query = %request.query))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawArticle>, SearchError> {
        let t0 = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers());
            warn!(?retry_after, "Exa rate limit hit");
            return Err(SearchError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: crate::utils::truncate_for_log(&body, 300),
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        let parsed = serde_json::from_str::<ExaSearchResponse>(&text)
            .map_err(|e| SearchError::Malformed(e.to_string()))?;
        debug!(
            results = parsed.results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Exa search returned"
        );
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request() -> SearchRequest {
        SearchRequest {
            query: "economy markets".to_string(),
            region: "IN".to_string(),
            num_results: 5,
            start_published: Utc.with_ymd_and_hms(2025, 5, 5, 0, 0, 0).unwrap(),
            end_published: Utc.with_ymd_and_hms(2025, 5, 5, 23, 59, 59).unwrap(),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let req = request();
        let body = serde_json::to_value(ExaClient::body(&req)).unwrap();
        assert_eq!(body["query"], "economy markets");
        assert_eq!(body["type"], "keyword");
        assert_eq!(body["userLocation"], "IN");
        assert_eq!(body["numResults"], 5);
        assert_eq!(body["startPublishedDate"], "2025-05-05T00:00:00.000Z");
        assert_eq!(body["endPublishedDate"], "2025-05-05T23:59:59.000Z");
        assert_eq!(body["contents"]["text"]["includeHtmlTags"], true);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let json = r#"{"requestId": "r1", "results": [{"title": "A", "url": "https://example.com/a", "text": "<p>Hi.</p>"}, {}]}"#;
        let parsed: ExaSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1], RawArticle::default());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
