use reqwest::Client;

use crate::job::model::StatusResponse;

/// Posts terminal job results to a backend, e.g. the engine API that
/// consumes transcripts. Delivery is best effort.
#[derive(Clone, Debug)]
pub struct ResultForwarder {
    client: Client,
    url: String,
    token: Option<String>,
}

impl ResultForwarder {
    pub fn new(client: Client, url: &str, token: Option<&str>) -> Self {
        Self {
            client,
            url: url.to_string(),
            token: token.map(str::to_string),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(job_id = %result.id, status = %result.status))]
    pub async fn forward(&self, result: &StatusResponse) {
        let mut request = self.client.post(&self.url).json(result);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(_) => tracing::debug!("Forwarded job result to {}", self.url),
            Err(e) => tracing::warn!("Failed to forward job result to {}: {}", self.url, e),
        }
    }
}
