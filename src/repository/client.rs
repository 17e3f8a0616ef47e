// src/repository/client.rs

//! Index downloads for remote and local archives

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Fetches index files from `http(s)://`, `file://` or plain path locations
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch a file, returning `None` if the location doesn't exist
    pub fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url)
        } else {
            fetch_local(url.strip_prefix("file://").unwrap_or(url))
        }
    }

    fn fetch_http(&self, url: &str) -> Result<Option<Vec<u8>>> {
        info!("Downloading {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if response.status() == StatusCode::NOT_FOUND {
                        debug!("{} not found", url);
                        return Ok(None);
                    }
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let bytes = response
                        .bytes()
                        .map_err(|e| Error::DownloadError(format!("Failed to read response: {}", e)))?;
                    return Ok(Some(bytes.to_vec()));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

fn fetch_local(path: &str) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found", path);
            Ok(None)
        }
        Err(e) => Err(Error::IoError(format!("Failed to read {}: {}", path, e))),
    }
}
