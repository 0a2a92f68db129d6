//! Caller side of the job contract: submit a job, then poll its status until
//! it finishes or the caller gives up.

use std::time::Duration;

use reqwest::{Client, Response};
use tokio::time::Instant;

use crate::error::{ClientError, HttpErrorResponse};
use crate::job::model::{JobHandle, JobInput, JobOutput, JobStatus, RunRequest, RunResponse, StatusResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.runpod.ai";

/// How [`EndpointClient::wait`] polls for a result.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Pause between two status requests
    pub interval: Duration,
    /// Total time after which the job is treated as failed locally
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointClient {
    http: Client,
    base_url: String,
    endpoint_id: String,
    api_key: String,
}

impl EndpointClient {
    pub fn new(endpoint_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_id: endpoint_id.into(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/v2/{}/{}", self.base_url, self.endpoint_id, path)
    }

    /// Submits a job and returns its handle without waiting for the result.
    #[tracing::instrument(level = "info", skip_all, fields(endpoint_id = %self.endpoint_id))]
    pub async fn submit(&self, input: &JobInput) -> Result<JobHandle, ClientError> {
        let response = self
            .http
            .post(self.endpoint_url("run"))
            .bearer_auth(&self.api_key)
            .json(&RunRequest {
                input: input.clone(),
            })
            .send()
            .await?;

        let run: RunResponse = check_status(response).await?.json().await?;
        if run.id.as_str().is_empty() {
            return Err(ClientError::EmptyHandle);
        }
        tracing::info!(job_id = %run.id, "Job submitted");
        Ok(run.id)
    }

    /// Reads the current status of a job. Has no effect on the job.
    pub async fn status(&self, id: &JobHandle) -> Result<StatusResponse, ClientError> {
        let response = self
            .http
            .get(self.endpoint_url(&format!("status/{}", id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Polls until the job reaches a terminal state or `options.timeout` elapses.
    #[tracing::instrument(level = "info", skip(self, options), fields(job_id = %id))]
    pub async fn wait(&self, id: &JobHandle, options: PollOptions) -> Result<JobOutput, ClientError> {
        let started = Instant::now();
        loop {
            let status = self.status(id).await?;
            match status.status {
                JobStatus::Completed => {
                    let output = status
                        .output
                        .ok_or_else(|| ClientError::MissingOutput(id.to_string()))?;
                    return match output.handler_error() {
                        Some(error) => Err(ClientError::JobFailed {
                            id: id.to_string(),
                            error,
                        }),
                        None => Ok(output),
                    };
                }
                JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut => {
                    return Err(ClientError::JobFailed {
                        id: id.to_string(),
                        error: status
                            .error
                            .unwrap_or_else(|| format!("job ended as {}", status.status)),
                    })
                }
                JobStatus::InQueue | JobStatus::InProgress | JobStatus::Unknown => {
                    tracing::debug!("Job is {}", status.status);
                }
            }

            if started.elapsed() + options.interval > options.timeout {
                return Err(ClientError::Timeout {
                    id: id.to_string(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(options.interval).await;
        }
    }

    /// Submits a job and waits for its output.
    pub async fn transcribe(
        &self,
        input: &JobInput,
        options: PollOptions,
    ) -> Result<JobOutput, ClientError> {
        let id = self.submit(input).await?;
        self.wait(&id, options).await
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<HttpErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
