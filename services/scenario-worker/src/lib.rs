//! Scenario worker library.
//!
//! The binary polls the job server; these modules are exposed so the job
//! pipeline can be driven from tests without a server.

pub mod dispatch;
pub mod engine_thread;
pub mod fetch;

pub use dispatch::{scenario_output_path, Worker};
pub use engine_thread::EngineHandle;
pub use fetch::SourceFetcher;
