//! HTTP client for the scenario job server.
//!
//! Jobs are claimed with `GET {queue_url}` and reported with
//! `POST {queue_url}{endpoint}`.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{QueueError, Result};
use crate::job::{JobEnvelope, JobReport};

/// Path of the job queue on the server.
pub const QUEUE_PATH: &str = "/jobsqueue/";

/// Polls the job server and posts results back.
#[derive(Debug, Clone)]
pub struct JobQueueClient {
    client: Client,
    queue_url: String,
}

impl JobQueueClient {
    /// Client for `http://{host}:{port}/jobsqueue/`.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Self::from_base_url(&format!("http://{host}:{port}"), timeout)
    }

    /// Client for an explicit server URL such as `https://jobs.internal:8000`.
    pub fn from_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            queue_url: format!("{}{}", base_url.trim_end_matches('/'), QUEUE_PATH),
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// URL a report for `endpoint` is posted to.
    pub fn report_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.queue_url, endpoint.trim_start_matches('/'))
    }

    /// Claim the next job, or `None` when the queue is idle.
    #[instrument(skip(self), fields(url = %self.queue_url))]
    pub async fn claim_next(&self) -> Result<Option<JobEnvelope>> {
        let response = self.client.get(&self.queue_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Status {
                status: status.as_u16(),
                url: self.queue_url.clone(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Polled job queue");
        JobEnvelope::parse(&body)
    }

    /// Post a job report to `endpoint`.
    #[instrument(skip(self, report), fields(status = ?report.status))]
    pub async fn report(&self, endpoint: &str, report: &JobReport) -> Result<()> {
        let url = self.report_url(endpoint);
        let response = self.client.post(&url).json(report).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Status {
                status: status.as_u16(),
                url,
            });
        }
        debug!(url = %url, "Reported job");
        Ok(())
    }
}
