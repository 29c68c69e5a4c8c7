// src/pipeline/reqwest_integration.rs
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use http::StatusCode;
use serde_json::Value;
use snafu::ResultExt;
use tower::Service;

use super::orchestrator::{BuildClientSnafu, InvalidSettingsSnafu, PipelineError};
use super::{HttpError, WorkItem};

/// The load target: a `tower::Service` that POSTs each [`WorkItem`] as JSON.
///
/// Only a 200 response with a JSON body counts as success. Every other status
/// becomes [`HttpError::ServerError`] carrying the status and the response body.
#[derive(Clone, Debug)]
pub struct HttpTarget {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpTarget {
    /// Builds a target with its own client and a per-request `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let endpoint = match reqwest::Url::parse(endpoint) {
            Ok(url) => url,
            Err(error) => {
                return InvalidSettingsSnafu {
                    reason: format!("invalid endpoint '{endpoint}': {error}"),
                }
                .fail();
            }
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(BuildClientSnafu)?;

        Ok(Self { client, endpoint })
    }

    /// Uses a caller-configured client; its timeout applies instead of the request timeout.
    pub fn new_with_client(client: reqwest::Client, endpoint: reqwest::Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

impl Service<WorkItem> for HttpTarget {
    type Response = Value;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, item: WorkItem) -> Self::Future {
        let request_future = self.client.post(self.endpoint.clone()).json(&item).send();

        Box::pin(async move {
            let response = request_future.await.map_err(classify)?;
            let status = response.status();

            if status != StatusCode::OK {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Could not read error body".to_string());
                debug!(%status, error_body = %body, item_id = item.item_id, "Non-success status.");

                return Err(HttpError::ServerError {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(classify)?;
            serde_json::from_slice(&bytes).map_err(|error| HttpError::Decode {
                details: error.to_string(),
            })
        })
    }
}

fn classify(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout
    } else if error.is_builder() {
        HttpError::InvalidRequest {
            details: error.to_string(),
        }
    } else if error.is_connect() || error.is_request() || error.is_body() {
        HttpError::Transport {
            source: Box::new(error),
        }
    } else {
        HttpError::ClientError {
            source: Box::new(error),
        }
    }
}
