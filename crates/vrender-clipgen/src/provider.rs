//! HTTP client for the external image-to-video provider: submit a job against
//! a named model endpoint, poll it to completion, then hand back the result URL.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vrender_models::{retry_async, BackoffConfig};

use crate::error::{ClipGenError, ClipGenResult};

/// Poll interval and end-to-end timeout defaults (§4.5, §5).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    image_url: &'a str,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_status(raw: &str) -> JobStatus {
    match raw {
        "COMPLETED" => JobStatus::Completed,
        "FAILED" | "ERROR" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

/// One named model candidate: an endpoint base URL plus an API key.
#[derive(Debug, Clone)]
pub struct ModelEndpoint {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
}

pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Submit one scene's clip-generation job to `model`, returning the
    /// provider's `request_id`.
    pub async fn submit(
        &self,
        model: &ModelEndpoint,
        prompt: &str,
        image_url: &str,
        duration: u32,
    ) -> ClipGenResult<String> {
        let url = format!("{}/submit", model.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&model.api_key)
            .json(&SubmitRequest {
                prompt,
                image_url,
                duration,
            })
            .send()
            .await
            .map_err(|e| ClipGenError::ProviderSubmit {
                model: model.name.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClipGenError::ProviderSubmit {
                model: model.name.clone(),
                reason: format!("{status}: {body}"),
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClipGenError::InvalidResponse(e.to_string()))?;
        Ok(parsed.request_id)
    }

    /// Poll `request_id` against `model` with `poll_interval` until a terminal
    /// state or `timeout` elapses. Returns the result URL on `COMPLETED`.
    pub async fn poll_until_complete(
        &self,
        model: &ModelEndpoint,
        request_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> ClipGenResult<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ClipGenError::ProviderTimeout {
                    model: model.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            let poll = self.poll_once(model, request_id).await?;
            match parse_status(&poll.status) {
                JobStatus::Completed => {
                    return poll
                        .result_url
                        .ok_or_else(|| ClipGenError::InvalidResponse("COMPLETED without result_url".into()))
                }
                JobStatus::Failed => {
                    return Err(ClipGenError::ProviderSubmit {
                        model: model.name.clone(),
                        reason: poll.error.unwrap_or_else(|| "provider reported failure".into()),
                    })
                }
                JobStatus::Pending => {
                    debug!(model = %model.name, request_id, status = %poll.status, "clip job still pending");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    async fn poll_once(&self, model: &ModelEndpoint, request_id: &str) -> ClipGenResult<PollResponse> {
        let url = format!("{}/status/{}", model.base_url, request_id);
        let config = BackoffConfig::new(3, Duration::from_millis(200), Duration::from_secs(2));
        retry_async(
            config,
            |e: &ClipGenError| e.is_retryable(),
            || async {
                let response = self
                    .http
                    .get(&url)
                    .bearer_auth(&model.api_key)
                    .send()
                    .await?;
                response
                    .json::<PollResponse>()
                    .await
                    .map_err(|e| ClipGenError::InvalidResponse(e.to_string()))
            },
        )
        .await
    }

    /// Stream the completed clip's bytes from the provider's result URL.
    pub async fn download_result(&self, result_url: &str) -> ClipGenResult<Vec<u8>> {
        let response = self
            .http
            .get(result_url)
            .send()
            .await
            .map_err(|e| ClipGenError::ProviderDownload(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClipGenError::ProviderDownload(format!("status {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClipGenError::ProviderDownload(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_classify_correctly() {
        assert_eq!(parse_status("COMPLETED"), JobStatus::Completed);
        assert_eq!(parse_status("FAILED"), JobStatus::Failed);
        assert_eq!(parse_status("ERROR"), JobStatus::Failed);
        assert_eq!(parse_status("IN_PROGRESS"), JobStatus::Pending);
    }
}
