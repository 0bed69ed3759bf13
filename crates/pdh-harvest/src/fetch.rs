//! Bounded-concurrency HTTP fetcher
//!
//! Takes a batch of (URL, target path) requests and downloads them with a
//! global in-flight cap, a per-host cap, retry with exponential backoff and
//! jitter, and resume: a target that already exists with the expected size
//! (and checksum when known) is skipped. Downloads land in a `.part`
//! sibling and are renamed into place, so partial files never shadow a
//! complete one.

use crate::config::HttpConfig;
use pdh_common::{ChecksumAlgorithm, HarvestError, Result};
use rand::Rng;
use reqwest::{Client, StatusCode, Url};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

/// Expected payload class; drives the content-type allow list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// ODE JSON responses
    Json,
    /// Volume index pages
    Html,
    /// PDS3 catalog files (plain text served under assorted types)
    Pds3,
}

impl RequestClass {
    /// Substrings accepted in the response content-type
    fn allowed_content_types(&self) -> &'static [&'static str] {
        match self {
            RequestClass::Json => &["application/json", "text/json"],
            RequestClass::Html => &["text/html", "application/xhtml"],
            RequestClass::Pds3 => &["text/plain", "application/octet-stream", "text/html"],
        }
    }

    fn accepts(&self, content_type: &str) -> bool {
        let lowered = content_type.to_lowercase();
        self.allowed_content_types()
            .iter()
            .any(|allowed| lowered.contains(allowed))
    }
}

/// One download request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub dest: PathBuf,
    pub class: RequestClass,
    pub expected_size: Option<u64>,
    pub expected_sha256: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, class: RequestClass) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            class,
            expected_size: None,
            expected_sha256: None,
        }
    }

    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn with_expected_sha256(mut self, checksum: impl Into<String>) -> Self {
        self.expected_sha256 = Some(checksum.into());
        self
    }
}

/// Progress events emitted while a batch runs
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Started { url: String },
    Progress { url: String, bytes: u64 },
    Completed { url: String, path: PathBuf, bytes: u64, suspect: bool },
    Failed { url: String, reason: String },
}

/// Result of one batch
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Paths of files completed in this run (skips excluded)
    pub completed: Vec<PathBuf>,
    /// (url, reason) for requests that failed terminally
    pub failed: Vec<(String, String)>,
    /// Requests skipped because the target was already present
    pub skipped: usize,
    /// Completed downloads whose content-type was outside the allow list
    pub suspect: usize,
}

enum AttemptError {
    /// Transport error, 5xx or 429; retried with backoff
    Transient(String),
    /// Other 4xx or checksum mismatch ceiling; not retried
    Terminal(String),
}

/// The downloader. Cheap to clone per batch via `Arc` internals.
pub struct Fetcher {
    client: Client,
    config: HttpConfig,
    cancel: Arc<AtomicBool>,
    host_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| HarvestError::network("client", err.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            host_permits: Mutex::new(HashMap::new()),
        })
    }

    /// Flag checked between requests; set to drain and return early
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Share an externally owned cancellation flag (the driver's)
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Per-host semaphore, created on first use
    fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let mut permits = self.host_permits.lock().expect("host permit map poisoned");
        permits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_host_cap)))
            .clone()
    }

    /// Backoff before retry `attempt` (1-based), with jitter, capped
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.config.backoff_cap_ms);
        let jitter = rand::thread_rng().gen_range(0..=capped / 2);
        Duration::from_millis(capped / 2 + jitter)
    }

    /// Resume check: skip when the target already matches expectations
    fn already_complete(&self, request: &FetchRequest) -> bool {
        let Ok(metadata) = std::fs::metadata(&request.dest) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        if let Some(expected) = request.expected_size {
            if metadata.len() != expected {
                return false;
            }
        }
        if let Some(expected) = &request.expected_sha256 {
            match pdh_common::checksum::compute_file_checksum(
                &request.dest,
                ChecksumAlgorithm::Sha256,
            ) {
                Ok(actual) if &actual == expected => {},
                _ => return false,
            }
        }
        true
    }

    /// Download a batch with bounded concurrency and fair per-host caps.
    ///
    /// Completion order is unspecified; callers that need page order sort
    /// by index when reading from the store.
    pub async fn fetch_all(
        &self,
        requests: Vec<FetchRequest>,
        events: Option<mpsc::Sender<FetchEvent>>,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            if self.already_complete(&request) {
                debug!(url = %request.url, "Target present with expected content, skipped");
                outcome.skipped += 1;
            } else {
                pending.push(request);
            }
        }

        let results = stream::iter(pending.into_iter().map(|request| {
            let events = events.clone();
            async move {
                if self.is_cancelled() {
                    return (request, Err(AttemptError::Terminal("cancelled".into())));
                }
                let semaphore = self.host_semaphore(&request.url);
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");

                if let Some(tx) = &events {
                    let _ = tx
                        .send(FetchEvent::Started {
                            url: request.url.clone(),
                        })
                        .await;
                }
                let result = self.fetch_with_retry(&request, events.as_ref()).await;
                (request, result)
            }
        }))
        .buffer_unordered(self.config.max_in_flight)
        .collect::<Vec<_>>()
        .await;

        for (request, result) in results {
            match result {
                Ok((bytes, suspect)) => {
                    if suspect {
                        outcome.suspect += 1;
                    }
                    if let Some(tx) = &events {
                        let _ = tx
                            .send(FetchEvent::Completed {
                                url: request.url.clone(),
                                path: request.dest.clone(),
                                bytes,
                                suspect,
                            })
                            .await;
                    }
                    outcome.completed.push(request.dest);
                },
                Err(AttemptError::Transient(reason)) | Err(AttemptError::Terminal(reason)) => {
                    if let Some(tx) = &events {
                        let _ = tx
                            .send(FetchEvent::Failed {
                                url: request.url.clone(),
                                reason: reason.clone(),
                            })
                            .await;
                    }
                    outcome.failed.push((request.url, reason));
                },
            }
        }

        info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            skipped = outcome.skipped,
            suspect = outcome.suspect,
            "Fetch batch finished"
        );
        outcome
    }

    async fn fetch_with_retry(
        &self,
        request: &FetchRequest,
        events: Option<&mpsc::Sender<FetchEvent>>,
    ) -> std::result::Result<(u64, bool), AttemptError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.config.max_retries {
            if self.is_cancelled() {
                return Err(AttemptError::Terminal("cancelled".into()));
            }
            match self.fetch_once(request, events).await {
                Ok(done) => return Ok(done),
                Err(AttemptError::Terminal(reason)) => {
                    return Err(AttemptError::Terminal(reason));
                },
                Err(AttemptError::Transient(reason)) => {
                    warn!(
                        url = %request.url,
                        attempt,
                        max = self.config.max_retries,
                        reason = %reason,
                        "Download attempt failed"
                    );
                    last_reason = reason;
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                },
            }
        }

        Err(AttemptError::Transient(format!(
            "gave up after {} attempts: {}",
            self.config.max_retries, last_reason
        )))
    }

    async fn fetch_once(
        &self,
        request: &FetchRequest,
        events: Option<&mpsc::Sender<FetchEvent>>,
    ) -> std::result::Result<(u64, bool), AttemptError> {
        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(|err| AttemptError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient(format!("HTTP {}", status)));
        }
        if status.is_client_error() {
            return Err(AttemptError::Terminal(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(AttemptError::Transient(format!("HTTP {}", status)));
        }

        // Content-type outside the allow list: keep the download but mark
        // it suspect; a transform-time decode failure quarantines it.
        let suspect = match response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(content_type) if !request.class.accepts(content_type) => {
                warn!(
                    url = %request.url,
                    content_type = %content_type,
                    "Unexpected content type, download marked suspect"
                );
                true
            },
            _ => false,
        };

        if let Some(parent) = request.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AttemptError::Terminal(err.to_string()))?;
        }

        // Any prior partial download is discarded before the re-attempt
        let part = request.dest.with_extension(part_extension(&request.dest));
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|err| AttemptError::Terminal(err.to_string()))?;

        let mut written = 0u64;
        let mut body = response;
        loop {
            match body.chunk().await {
                Ok(Some(chunk)) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|err| AttemptError::Terminal(err.to_string()))?;
                    written += chunk.len() as u64;
                    if let Some(tx) = events {
                        let _ = tx
                            .send(FetchEvent::Progress {
                                url: request.url.clone(),
                                bytes: written,
                            })
                            .await;
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(AttemptError::Transient(err.to_string()));
                },
            }
        }
        file.flush()
            .await
            .map_err(|err| AttemptError::Terminal(err.to_string()))?;
        drop(file);

        if let Some(expected) = &request.expected_sha256 {
            let actual =
                pdh_common::checksum::compute_file_checksum(&part, ChecksumAlgorithm::Sha256)
                    .map_err(|err| AttemptError::Terminal(err.to_string()))?;
            if &actual != expected {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(AttemptError::Transient(format!(
                    "checksum mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        tokio::fs::rename(&part, &request.dest)
            .await
            .map_err(|err| AttemptError::Terminal(err.to_string()))?;

        Ok((written, suspect))
    }
}

/// `.part` sibling extension preserving the original one
fn part_extension(dest: &std::path::Path) -> String {
    match dest.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.part", ext),
        None => "part".to_string(),
    }
}
