//! Job descriptors, the queue envelope and the reports sent back.

use crate::error::{QueueError, Result};
use scenario_common::{ClassEntry, ClassHistogram};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Arguments of a `parcel_fill` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelFillArgs {
    pub target_parcel_wkt: String,
    pub lulc_class: u16,
    /// Raster the "before" statistics are taken from; the reference raster
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lulc_source_url: Option<String>,
}

/// Arguments of a `wallpaper` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallpaperArgs {
    pub target_parcel_wkt: String,
    pub pattern_bbox_wkt: String,
    pub lulc_source_url: String,
}

/// Arguments of a `stats_under_parcel` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsArgs {
    pub target_parcel_wkt: String,
    pub lulc_source_url: String,
}

/// Arguments of a `raster_classnames` job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassnamesArgs {
    /// Raster to read; the reference raster when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lulc_source_url: Option<String>,
}

/// Every job kind the worker understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job_type", content = "job_args", rename_all = "snake_case")]
pub enum Job {
    ParcelFill(ParcelFillArgs),
    Wallpaper(WallpaperArgs),
    StatsUnderParcel(StatsArgs),
    RasterClassnames(ClassnamesArgs),
}

impl Job {
    /// The `job_type` string on the wire.
    pub fn job_type(&self) -> &'static str {
        match self {
            Job::ParcelFill(_) => "parcel_fill",
            Job::Wallpaper(_) => "wallpaper",
            Job::StatsUnderParcel(_) => "stats_under_parcel",
            Job::RasterClassnames(_) => "raster_classnames",
        }
    }

    /// Queue endpoint the job's report is posted to.
    pub fn endpoint(&self) -> &'static str {
        Self::endpoint_for(self.job_type())
    }

    /// Endpoint for a raw `job_type`; unknown types report to `scenario`.
    pub fn endpoint_for(job_type: &str) -> &'static str {
        match job_type {
            "stats_under_parcel" => "parcel_stats",
            "raster_classnames" => "raster_classnames",
            _ => "scenario",
        }
    }
}

/// Server bookkeeping attached to a job and echoed back in its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAttrs {
    pub job_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Value>,
    /// Anything else the server sent, kept so it round-trips unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerAttrs {
    pub fn job_id(&self) -> String {
        id_text(&self.job_id)
    }

    pub fn scenario_id(&self) -> Option<String> {
        self.scenario_id
            .as_ref()
            .filter(|v| !v.is_null())
            .map(id_text)
    }
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A claimed job together with its server attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEnvelope {
    pub job: Job,
    pub server_attrs: ServerAttrs,
}

impl JobEnvelope {
    /// Parse a `GET /jobsqueue/` response body. `Ok(None)` means no work.
    pub fn parse(body: &str) -> Result<Option<Self>> {
        if body.trim().is_empty() {
            return Ok(None);
        }
        Self::from_value(serde_json::from_str(body)?)
    }

    /// Decode an envelope, unwrapping one level of string encoding.
    pub fn from_value(value: Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(inner) if inner.trim().is_empty() => Ok(None),
            Value::String(inner) => match serde_json::from_str::<Value>(&inner)? {
                Value::String(_) => Err(QueueError::InvalidJob(
                    "envelope is encoded more than twice".to_string(),
                )),
                decoded => Self::from_value(decoded),
            },
            Value::Object(mut map) => {
                let server_attrs = map
                    .remove("server_attrs")
                    .ok_or_else(|| QueueError::InvalidJob("missing server_attrs".to_string()))?;
                let server_attrs: ServerAttrs = serde_json::from_value(server_attrs)?;

                let job_type = map
                    .get("job_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if map.get("job_args").map_or(true, Value::is_null) {
                    map.insert("job_args".to_string(), Value::Object(Map::new()));
                }

                let job = match serde_json::from_value(Value::Object(map)) {
                    Ok(job) => job,
                    Err(e) => {
                        return Err(QueueError::Rejected {
                            job_type,
                            server_attrs: Box::new(server_attrs),
                            reason: e.to_string(),
                        })
                    }
                };
                Ok(Some(Self { job, server_attrs }))
            }
            other => Err(QueueError::InvalidJob(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

/// Outcome reported for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
}

/// Class fractions under a parcel before and, for edits, after the edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LulcStats {
    pub base: BTreeMap<u16, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<u16, f64>>,
}

impl LulcStats {
    pub fn base(base: &ClassHistogram) -> Self {
        Self {
            base: base.fractions(),
            result: None,
        }
    }

    pub fn before_after(base: &ClassHistogram, result: &ClassHistogram) -> Self {
        Self {
            base: base.fractions(),
            result: Some(result.fractions()),
        }
    }
}

/// Result payload of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    /// Fill and wallpaper: the new raster and its statistics.
    Scenario {
        lulc_path: String,
        lulc_stats: LulcStats,
    },
    /// Statistics only.
    Stats { lulc_stats: LulcStats },
    /// Class code to name and colour.
    Classnames(BTreeMap<u16, ClassEntry>),
}

/// Body posted to the job's endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    pub server_attrs: ServerAttrs,
    pub status: JobStatus,
}

impl JobReport {
    pub fn success(server_attrs: ServerAttrs, result: JobOutput) -> Self {
        Self {
            result: Some(result),
            server_attrs,
            status: JobStatus::Success,
        }
    }

    pub fn failed(server_attrs: ServerAttrs) -> Self {
        Self {
            result: None,
            server_attrs,
            status: JobStatus::Failed,
        }
    }
}
