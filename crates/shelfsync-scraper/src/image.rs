//! Best-effort product image downloads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{header, Client};
use shelfsync_core::{AppConfig, ProductRecord};

use crate::normalize::{image_file_name, is_safe_file_name};

/// Downloads images into a single directory.
///
/// Every failure (bad URL, network error, non-2xx, disk error) is logged and
/// reported as `None`; an image never aborts a sync.
pub struct ImageFetcher {
    client: Client,
    images_dir: PathBuf,
    user_agent: Option<String>,
}

impl ImageFetcher {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying client cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: Option<String>,
        images_dir: PathBuf,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            images_dir,
            user_agent,
        })
    }

    /// Uses the first configured identity and `<data_dir>/images`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.image_timeout_secs,
            config.user_agents.first().cloned(),
            config.images_dir(),
        )
    }

    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Downloads `url` to `<images_dir>/<destination_name>` and returns the
    /// stored file name.
    pub async fn fetch(&self, url: &str, destination_name: &str) -> Option<String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            tracing::warn!(url, "skipping image with non-HTTP URL");
            return None;
        }
        if !is_safe_file_name(destination_name) {
            tracing::warn!(url, destination_name, "refusing unsafe image file name");
            return None;
        }

        let mut request = self.client.get(url);
        if let Some(ua) = &self.user_agent {
            request = request.header(header::USER_AGENT, ua);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, error = %e, "image download failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(url, status = response.status().as_u16(), "image download returned non-2xx");
            return None;
        }
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to read image body");
                return None;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.images_dir).await {
            tracing::warn!(dir = %self.images_dir.display(), error = %e, "failed to create images directory");
            return None;
        }
        let path = self.images_dir.join(destination_name);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to store image");
            return None;
        }

        tracing::debug!(url, file = destination_name, bytes = bytes.len(), "image stored");
        Some(destination_name.to_owned())
    }

    /// Fetches the image of every record that has a source URL, at most
    /// `concurrency` at a time, and sets `image_reference` on success.
    ///
    /// Returns the number of images stored.
    pub async fn fetch_all(&self, records: &mut [ProductRecord], concurrency: usize) -> usize {
        let mut used_names: HashSet<String> = HashSet::new();
        let jobs: Vec<(usize, String, String)> = records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                let url = record.source_image_url.clone()?;
                let mut name = image_file_name(&url, &record.title);
                if !used_names.insert(name.clone()) {
                    name = format!("{idx}-{name}");
                    used_names.insert(name.clone());
                }
                Some((idx, url, name))
            })
            .collect();

        let total = jobs.len();
        let results: Vec<(usize, Option<String>)> = stream::iter(jobs)
            .map(|(idx, url, name)| async move { (idx, self.fetch(&url, &name).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut stored = 0usize;
        for (idx, file) in results {
            if let (Some(record), Some(file)) = (records.get_mut(idx), file) {
                record.image_reference = Some(file);
                stored += 1;
            }
        }

        tracing::info!(stored, failed = total - stored, "image downloads finished");
        stored
    }
}
