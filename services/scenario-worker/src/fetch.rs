//! Resolves `lulc_source_url` values to local raster paths.
//!
//! Local paths are used in place. `http(s)` URLs are streamed into a cache
//! directory through a `.partial` file and renamed once complete, so a
//! cached file is always whole.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Suffix GDAL uses for attribute-table sidecars.
const SIDECAR_SUFFIX: &str = ".aux.xml";

/// Downloads remote sources into a local cache.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
    cache_dir: PathBuf,
}

impl SourceFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local path of a source raster, downloading it first if remote.
    #[instrument(skip(self))]
    pub async fn resolve(&self, source: &str) -> Result<PathBuf> {
        if is_remote(source) {
            let path = self.cache_path(source);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                self.download(source, &path).await?;
            } else {
                debug!(path = %path.display(), "Using cached source");
            }
            return Ok(path);
        }

        let path = PathBuf::from(source.strip_prefix("file://").unwrap_or(source));
        if !fs::try_exists(&path).await.unwrap_or(false) {
            bail!("Source raster {} does not exist", path.display());
        }
        Ok(path)
    }

    /// Like [`resolve`](Self::resolve), also fetching the `.aux.xml`
    /// attribute-table sidecar of a remote raster when the server has one.
    pub async fn resolve_with_sidecar(&self, source: &str) -> Result<PathBuf> {
        let path = self.resolve(source).await?;
        if is_remote(source) {
            let sidecar_url = format!("{source}{SIDECAR_SUFFIX}");
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(SIDECAR_SUFFIX);
            let sidecar = PathBuf::from(sidecar);
            if !fs::try_exists(&sidecar).await.unwrap_or(false) {
                if let Err(e) = self.download(&sidecar_url, &sidecar).await {
                    debug!(url = %sidecar_url, error = %e, "No attribute-table sidecar");
                }
            }
        }
        Ok(path)
    }

    /// Cache location for a remote URL: a hash of the URL plus its file name.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let name = url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .unwrap_or("source.tif");
        self.cache_dir
            .join(format!("{:016x}-{}", hasher.finish(), sanitize(name)))
    }

    async fn download(&self, url: &str, path: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request for {url} failed"))?;
        let status = response.status();
        if status != StatusCode::OK {
            bail!("Download of {url} returned {status}");
        }

        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let bytes = match write_body(response, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e.context(format!("Download of {url} was interrupted")));
            }
        };

        fs::rename(&partial, path).await?;
        info!(url = %url, path = %path.display(), bytes, "Downloaded source");
        Ok(())
    }
}

/// Stream a response body into `path`, returning the byte count.
async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes)
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}
