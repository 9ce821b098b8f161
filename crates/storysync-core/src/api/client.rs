//! API client for the Story App REST API.
//!
//! `ApiClient` implements [`RemoteApi`] on top of a shared `reqwest::Client`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::debug;

use crate::models::{HttpRequest, HttpResponse, PushSubscriptionRecord};

use super::{ApiError, RemoteApi, StorySubmission};

// ============================================================================
// Constants
// ============================================================================

/// Story creation endpoint used when replaying the outbox.
const STORIES_PATH: &str = "/v1/stories";

/// Push registration endpoint (POST to register, DELETE to deregister).
const PUSH_SUBSCRIBE_PATH: &str = "/v1/notifications/subscribe";

/// HTTP request timeout in seconds.
/// The engine has no timeout of its own; a hung request stays suspended
/// until this fires.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the Story App backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status.as_u16(), &body))
        }
    }

    fn story_form(story: &StorySubmission) -> Result<Form, ApiError> {
        let mut form = Form::new();
        if let Some(ref description) = story.description {
            form = form.text("description", description.clone());
        }
        if let Some(lat) = story.lat {
            form = form.text("lat", lat.to_string());
        }
        if let Some(lon) = story.lon {
            form = form.text("lon", lon.to_string());
        }
        if let Some(ref photo) = story.photo {
            let part = Part::bytes(photo.bytes.clone())
                .file_name(photo.file_name.clone())
                .mime_str(&photo.content_type)?;
            form = form.part("photo", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ApiError::InvalidRequest(format!("method {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "Fetched");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn submit_story(&self, story: &StorySubmission) -> Result<(), ApiError> {
        let mut builder = self
            .client
            .post(self.url(STORIES_PATH))
            .multipart(Self::story_form(story)?);
        if let Some(ref token) = story.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn register_push(
        &self,
        token: &str,
        subscription: &PushSubscriptionRecord,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(PUSH_SUBSCRIBE_PATH))
            .bearer_auth(token)
            .json(subscription)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn deregister_push(&self, token: &str, endpoint: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(PUSH_SUBSCRIBE_PATH))
            .bearer_auth(token)
            .json(&serde_json::json!({ "endpoint": endpoint }))
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
