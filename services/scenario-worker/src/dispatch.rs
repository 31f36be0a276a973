//! Turns claimed jobs into engine calls and job reports.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use job_queue::{Job, JobEnvelope, JobOutput, JobReport, LulcStats, QueueError, ServerAttrs};
use raster_engine::EngineError;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::engine_thread::EngineHandle;
use crate::fetch::SourceFetcher;

/// `{output_dir}/scenarios/{scenario_id}/{scenario_id}_{job_type}.tif`
pub fn scenario_output_path(output_dir: &Path, scenario_id: &str, job_type: &str) -> PathBuf {
    output_dir
        .join("scenarios")
        .join(scenario_id)
        .join(format!("{scenario_id}_{job_type}.tif"))
}

/// Executes jobs on the engine thread.
pub struct Worker {
    engine: EngineHandle,
    fetcher: SourceFetcher,
    output_dir: PathBuf,
}

impl Worker {
    pub fn new(engine: EngineHandle, fetcher: SourceFetcher, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            fetcher,
            output_dir: output_dir.into(),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Stop the engine thread once the running operation returns.
    pub fn shutdown(self) {
        self.engine.shutdown();
    }

    /// Run one job. Failures become a `failed` report and never propagate.
    #[instrument(skip(self, envelope), fields(
        job_id = %envelope.server_attrs.job_id(),
        job_type = envelope.job.job_type()
    ))]
    pub async fn run(&self, envelope: &JobEnvelope) -> JobReport {
        let attrs = envelope.server_attrs.clone();
        match self.execute(&envelope.job, &attrs).await {
            Ok(output) => {
                info!("Job complete");
                JobReport::success(attrs, output)
            }
            Err(e) => {
                let kind = e
                    .downcast_ref::<EngineError>()
                    .map(EngineError::kind)
                    .unwrap_or("worker");
                error!(kind, error = %format!("{e:#}"), "Job failed");
                JobReport::failed(attrs)
            }
        }
    }

    /// Turn a claimed job that could not be parsed into a `failed` report
    /// and the endpoint to post it to. `None` when there is no job to report.
    pub fn reject(&self, err: &QueueError) -> Option<(&'static str, JobReport)> {
        let (endpoint, report) = err.failure_report()?;
        error!(
            job_id = %report.server_attrs.job_id(),
            endpoint,
            error = %err,
            "Rejected job"
        );
        Some((endpoint, report))
    }

    async fn execute(&self, job: &Job, attrs: &ServerAttrs) -> Result<JobOutput> {
        match job {
            Job::ParcelFill(args) => {
                let target = self.prepare_output(attrs, job).await?;
                let base = match &args.lulc_source_url {
                    Some(url) => Some(self.fetcher.resolve(url).await?),
                    None => None,
                };
                let parcel = args.target_parcel_wkt.clone();
                let class = args.lulc_class;
                let out = target.clone();

                let lulc_stats = self
                    .engine
                    .run(move |engine| -> Result<LulcStats, EngineError> {
                        engine.fill_parcel(&parcel, class, &out)?;
                        let base = base.as_deref().unwrap_or(engine.grid().path());
                        let before = engine.pixel_counts_under_parcel(&parcel, base)?;
                        let after = engine.pixel_counts_under_parcel(&parcel, &out)?;
                        Ok(LulcStats::before_after(&before, &after))
                    })
                    .await??;

                Ok(JobOutput::Scenario {
                    lulc_path: target.display().to_string(),
                    lulc_stats,
                })
            }
            Job::Wallpaper(args) => {
                let target = self.prepare_output(attrs, job).await?;
                let source = self.fetcher.resolve(&args.lulc_source_url).await?;
                let parcel = args.target_parcel_wkt.clone();
                let pattern = args.pattern_bbox_wkt.clone();
                let out = target.clone();

                let lulc_stats = self
                    .engine
                    .run(move |engine| -> Result<LulcStats, EngineError> {
                        engine.wallpaper_parcel(&parcel, &pattern, &source, &out, None)?;
                        let before = engine.pixel_counts_under_parcel(&parcel, &source)?;
                        let after = engine.pixel_counts_under_parcel(&parcel, &out)?;
                        Ok(LulcStats::before_after(&before, &after))
                    })
                    .await??;

                Ok(JobOutput::Scenario {
                    lulc_path: target.display().to_string(),
                    lulc_stats,
                })
            }
            Job::StatsUnderParcel(args) => {
                let source = self.fetcher.resolve(&args.lulc_source_url).await?;
                let parcel = args.target_parcel_wkt.clone();

                let counts = self
                    .engine
                    .run(move |engine| engine.pixel_counts_under_parcel(&parcel, &source))
                    .await??;

                Ok(JobOutput::Stats {
                    lulc_stats: LulcStats::base(&counts),
                })
            }
            Job::RasterClassnames(args) => {
                let source = match &args.lulc_source_url {
                    Some(url) => Some(self.fetcher.resolve_with_sidecar(url).await?),
                    None => None,
                };

                let classes = self
                    .engine
                    .run(move |engine| engine.classnames(source.as_deref()))
                    .await??;

                Ok(JobOutput::Classnames(classes))
            }
        }
    }

    /// Output path for a scenario-producing job, with its directory created.
    async fn prepare_output(&self, attrs: &ServerAttrs, job: &Job) -> Result<PathBuf> {
        let scenario_id = attrs
            .scenario_id()
            .ok_or_else(|| anyhow!("{} job {} has no scenario_id", job.job_type(), attrs.job_id()))?;
        let target = scenario_output_path(&self.output_dir, &scenario_id, job.job_type());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_output_path() {
        let path = scenario_output_path(Path::new("/data/out"), "42", "wallpaper");
        assert_eq!(path, PathBuf::from("/data/out/scenarios/42/42_wallpaper.tif"));
    }
}
