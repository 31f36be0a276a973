//! Runs the blocking scenario engine on a dedicated thread.
//!
//! The thread owns the [`ScenarioEngine`]; async callers send it closures and
//! await the reply, so at most one raster operation runs at a time.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use raster_engine::{CancelFlag, EngineConfig, ScenarioEngine};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

type Task = Box<dyn FnOnce(&ScenarioEngine) + Send>;

/// Async handle to the engine thread.
pub struct EngineHandle {
    tasks: Option<mpsc::Sender<Task>>,
    thread: Option<JoinHandle<()>>,
    cancel: CancelFlag,
    reference: PathBuf,
}

impl EngineHandle {
    /// Start the engine thread and wait until the reference raster is loaded.
    ///
    /// Fails when no reference candidate is readable or the configuration is
    /// invalid.
    pub async fn spawn(config: EngineConfig) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (task_tx, task_rx) = mpsc::channel::<Task>();

        let thread = std::thread::Builder::new()
            .name("scenario-engine".to_string())
            .spawn(move || {
                let engine = match ScenarioEngine::new(config) {
                    Ok(engine) => engine,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((engine.cancel_flag(), engine.grid().path().to_path_buf())));

                while let Ok(task) = task_rx.recv() {
                    task(&engine);
                }
                debug!("Engine thread stopped");
            })
            .context("Failed to spawn engine thread")?;

        let (cancel, reference) = ready_rx
            .await
            .context("Engine thread exited during start-up")?
            .context("Failed to start scenario engine")?;

        info!(reference = %reference.display(), "Engine thread ready");

        Ok(Self {
            tasks: Some(task_tx),
            thread: Some(thread),
            cancel,
            reference,
        })
    }

    /// Run `f` against the engine and return its result.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ScenarioEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let task: Task = Box::new(move |engine| {
            let _ = reply_tx.send(f(engine));
        });

        self.tasks
            .as_ref()
            .ok_or_else(|| anyhow!("Engine thread is shut down"))?
            .send(task)
            .map_err(|_| anyhow!("Engine thread has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("Engine thread dropped the request"))
    }

    /// Flag that stops the running operation at its next checkpoint.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Path of the loaded reference raster.
    pub fn reference(&self) -> &PathBuf {
        &self.reference
    }

    /// Close the task channel and wait for the thread to finish its current
    /// operation.
    pub fn shutdown(mut self) {
        self.tasks.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.tasks.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_engine::EngineError;

    #[tokio::test]
    async fn test_missing_reference_fails_start_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            reference_candidates: vec![dir.path().join("absent.tif")],
            ..Default::default()
        };

        let err = EngineHandle::spawn(config).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ReferenceUnavailable { .. })
        ));
    }
}
