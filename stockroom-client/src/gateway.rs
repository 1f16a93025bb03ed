//! REST gateway to the stockroom server.
//!
//! The engine talks to the network through the [`ApiGateway`] trait;
//! [`RestGateway`] is the reqwest-backed implementation and tests swap
//! in mocks at the same seam.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use stockroom_api_types::{
    ApproveBody, BatchOutcome, BulkApproveBody, BulkRejectBody, CreateIssueRequestBody,
    ErrorDetail, PageEnvelope, RejectBody, SubmitBody,
};
use stockroom_core::{Bill, EquipmentItem, Handout, IssueRequest, RecordId};
use stockroom_store::PartitionKey;

use crate::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never completed: connectivity, DNS, timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with a structured rejection.
    #[error("Server rejected the request ({status}): {detail}")]
    Server { status: u16, detail: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

/// Network boundary used by the engine.
///
/// Read calls return the server's page envelope untouched; write calls
/// return the updated record (or batch outcome) the server echoes back.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn fetch_requests(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<IssueRequest>, GatewayError>;

    async fn fetch_items(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<EquipmentItem>, GatewayError>;

    async fn fetch_bills(&self, key: &PartitionKey) -> Result<PageEnvelope<Bill>, GatewayError>;

    async fn fetch_handouts(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<Handout>, GatewayError>;

    async fn create_request(
        &self,
        body: &CreateIssueRequestBody,
    ) -> Result<IssueRequest, GatewayError>;

    async fn approve_request(
        &self,
        id: RecordId,
        body: &ApproveBody,
    ) -> Result<IssueRequest, GatewayError>;

    async fn reject_request(
        &self,
        id: RecordId,
        body: &RejectBody,
    ) -> Result<IssueRequest, GatewayError>;

    async fn bulk_approve(&self, body: &BulkApproveBody) -> Result<BatchOutcome, GatewayError>;

    async fn bulk_reject(&self, body: &BulkRejectBody) -> Result<BatchOutcome, GatewayError>;

    async fn submit_request(
        &self,
        id: RecordId,
        body: &SubmitBody,
    ) -> Result<IssueRequest, GatewayError>;
}

/// reqwest-backed gateway.
#[derive(Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let auth_header = build_auth_headers(config)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    async fn get_page<T>(
        &self,
        resource: &str,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<T>, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, resource);
        let query: Vec<(String, String)> = key
            .params()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let response = self
            .client
            .get(url)
            .headers(self.auth_header.clone())
            .query(&query)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await?;
        parse_response(response).await
    }
}

#[async_trait]
impl ApiGateway for RestGateway {
    async fn fetch_requests(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<IssueRequest>, GatewayError> {
        self.get_page("issue-requests", key).await
    }

    async fn fetch_items(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<EquipmentItem>, GatewayError> {
        self.get_page("items", key).await
    }

    async fn fetch_bills(&self, key: &PartitionKey) -> Result<PageEnvelope<Bill>, GatewayError> {
        self.get_page("bills", key).await
    }

    async fn fetch_handouts(
        &self,
        key: &PartitionKey,
    ) -> Result<PageEnvelope<Handout>, GatewayError> {
        self.get_page("handouts", key).await
    }

    async fn create_request(
        &self,
        body: &CreateIssueRequestBody,
    ) -> Result<IssueRequest, GatewayError> {
        self.post_json("/issue-requests", body).await
    }

    async fn approve_request(
        &self,
        id: RecordId,
        body: &ApproveBody,
    ) -> Result<IssueRequest, GatewayError> {
        self.post_json(&format!("/issue-requests/{}/approve", id), body)
            .await
    }

    async fn reject_request(
        &self,
        id: RecordId,
        body: &RejectBody,
    ) -> Result<IssueRequest, GatewayError> {
        self.post_json(&format!("/issue-requests/{}/reject", id), body)
            .await
    }

    async fn bulk_approve(&self, body: &BulkApproveBody) -> Result<BatchOutcome, GatewayError> {
        self.post_json("/issue-requests/bulk-approve", body).await
    }

    async fn bulk_reject(&self, body: &BulkRejectBody) -> Result<BatchOutcome, GatewayError> {
        self.post_json("/issue-requests/bulk-reject", body).await
    }

    async fn submit_request(
        &self,
        id: RecordId,
        body: &SubmitBody,
    ) -> Result<IssueRequest, GatewayError> {
        self.post_json(&format!("/issue-requests/{}/submit", id), body)
            .await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json::<T>().await?)
    } else {
        let text = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ErrorDetail>(&text) {
            Ok(body) => body.detail,
            Err(_) => text,
        };
        Err(GatewayError::Server {
            status: status.as_u16(),
            detail,
        })
    }
}

fn build_auth_headers(config: &ClientConfig) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &config.auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| GatewayError::Config(e.to_string()))?,
        );
    }
    if let Some(token) = &config.auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| GatewayError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = GatewayError::Server {
            status: 422,
            detail: "quantity exceeds availability".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("422"));
        assert!(msg.contains("quantity exceeds availability"));
    }

    #[test]
    fn test_error_detail_fallback_to_raw_text() {
        // Server bodies that are not the structured shape still surface.
        let detail = match serde_json::from_str::<ErrorDetail>("oops") {
            Ok(body) => body.detail,
            Err(_) => "oops".to_string(),
        };
        assert_eq!(detail, "oops");
    }
}
