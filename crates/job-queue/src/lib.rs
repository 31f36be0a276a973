//! Jobs exchanged with the scenario job server.
//!
//! Workers poll `GET {queue}/jobsqueue/`, run the claimed [`Job`], and post
//! a [`JobReport`] to the job's endpoint. The server answers `null` when it
//! has no work and may wrap the envelope in a JSON string.

pub mod client;
pub mod error;
pub mod job;

pub use client::JobQueueClient;
pub use error::{QueueError, Result};
pub use job::{
    ClassnamesArgs, Job, JobEnvelope, JobOutput, JobReport, JobStatus, LulcStats, ParcelFillArgs,
    ServerAttrs, StatsArgs, WallpaperArgs,
};
