//! reqwest-backed Canvas client.

use super::pagination::parse_next_link;
use super::{CanvasApi, CourseEvent, Page, PageRequest, PAGE_SIZE};
use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::Course;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LINK};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// `GET courses/:id/front_page` response.
#[derive(Debug, Deserialize)]
struct FrontPage {
    #[serde(default)]
    body: Option<String>,
}

/// The part of `PUT courses/:id` we read back.
#[derive(Debug, Deserialize)]
struct UpdatedCourse {
    #[serde(default)]
    workflow_state: Option<String>,
}

/// Canvas client with bearer authentication and a fixed per-request timeout.
///
/// There is no retry; every failure is returned to the caller.
pub struct HttpCanvasClient {
    settings: ApiSettings,
    http: reqwest::Client,
}

impl HttpCanvasClient {
    /// Create a client from explicit settings.
    pub fn new(settings: ApiSettings) -> Result<Self> {
        Self::with_builder(settings, reqwest::Client::builder())
    }

    fn with_builder(settings: ApiSettings, builder: reqwest::ClientBuilder) -> Result<Self> {
        info!(
            "Initializing Canvas client for {} (timeout {}s)",
            settings.base_url,
            settings.timeout.as_secs()
        );

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .context("Canvas token contains characters not allowed in a header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = builder
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { settings, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.settings
            .base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Send a request and require a success status.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    url: url.to_string(),
                    seconds: self.settings.timeout.as_secs(),
                }
            } else if e.is_connect() {
                ApiError::Transport(format!("cannot connect to Canvas at {}", url))
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned {}", url, status);
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Cursor from the `Link` header. A header that is not visible ASCII is
/// malformed, not absent.
fn next_link(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let link = match headers.get(LINK) {
        Some(value) => Some(value.to_str().map_err(|_| {
            ApiError::MalformedLink(String::from_utf8_lossy(value.as_bytes()).into_owned())
        })?),
        None => None,
    };
    parse_next_link(link)
}

#[async_trait]
impl CanvasApi for HttpCanvasClient {
    fn search_request(&self, search_term: &str) -> Result<PageRequest, ApiError> {
        let mut url = self.endpoint(&format!(
            "accounts/{}/courses",
            self.settings.account_id
        ))?;
        url.query_pairs_mut()
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("search_term", search_term);

        Ok(PageRequest::new(url.to_string()))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiError> {
        let response = self.send(self.http.get(&request.url), &request.url).await?;

        let next = next_link(response.headers())?.map(PageRequest::new);

        let courses: Vec<Course> = Self::decode(response, &request.url).await?;

        Ok(Page { courses, next })
    }

    async fn fetch_front_page(&self, course_id: u64) -> Result<String, ApiError> {
        let url = self.endpoint(&format!("courses/{}/front_page", course_id))?;
        let response = self.send(self.http.get(url.clone()), url.as_str()).await?;

        let page: FrontPage = Self::decode(response, url.as_str()).await?;
        Ok(page.body.unwrap_or_default())
    }

    async fn change_state(&self, course_id: u64, event: CourseEvent) -> Result<String, ApiError> {
        let url = self.endpoint(&format!("courses/{}", course_id))?;
        let body = json!({ "course": { "event": event.as_str() } });

        let response = self
            .send(self.http.put(url.clone()).json(&body), url.as_str())
            .await?;

        let updated: UpdatedCourse = Self::decode(response, url.as_str()).await?;
        Ok(updated
            .workflow_state
            .unwrap_or_else(|| event.target_state().to_string()))
    }
}
