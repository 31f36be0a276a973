//! Errors raised while talking to the job server.

use thiserror::Error;

use crate::job::{Job, JobReport, ServerAttrs};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("job server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope carries no server attributes to report against.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// A claimed job whose type or arguments this worker cannot run.
    #[error("job {} of type {job_type:?} rejected: {reason}", .server_attrs.job_id())]
    Rejected {
        job_type: String,
        server_attrs: Box<ServerAttrs>,
        reason: String,
    },
}

impl QueueError {
    /// Endpoint and `failed` report for a claimed job that could not be
    /// parsed. Other errors have no job to report.
    pub fn failure_report(&self) -> Option<(&'static str, JobReport)> {
        match self {
            QueueError::Rejected {
                job_type,
                server_attrs,
                ..
            } => Some((
                Job::endpoint_for(job_type),
                JobReport::failed(server_attrs.as_ref().clone()),
            )),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
