//! Harvest configuration
//!
//! An explicit context object threaded through all phases; the pipeline has
//! no process-wide singletons.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ODE REST endpoint
pub const DEFAULT_ODE_SERVICE_URL: &str = "https://oderest.rsl.wustl.edu/live2/";

/// Default Dataset Explorer host used to reach volume index pages
pub const DEFAULT_EXPLORER_URL: &str = "https://ode.rsl.wustl.edu";

/// Maximum page size accepted by the ODE records endpoint
pub const MAX_PAGE_SIZE: usize = 5000;

/// HTTP client policy: concurrency, retry, timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total in-flight request cap
    pub max_in_flight: usize,

    /// Per-host in-flight request cap
    pub per_host_cap: usize,

    /// Maximum attempts per request (first try included)
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubled per attempt)
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff sleep in milliseconds
    pub backoff_cap_ms: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Read timeout per attempt in seconds
    pub read_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            per_host_cap: 3,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            connect_timeout_secs: 30,
            read_timeout_secs: 180,
            user_agent: "pds-harvest/0.1".to_string(),
        }
    }
}

impl HttpConfig {
    /// Overall deadline for one request across all attempts
    pub fn request_deadline_secs(&self) -> u64 {
        self.max_retries as u64 * (self.read_timeout_secs + self.backoff_cap_ms / 1000)
    }
}

/// Configuration for the whole harvest pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Root of the local storage tree
    pub root_dir: PathBuf,

    /// ODE REST endpoint for discovery and record queries
    pub ode_service_url: String,

    /// Dataset Explorer host for volume index pages
    pub explorer_url: String,

    /// Records per page requested from the ODE service
    pub page_size: usize,

    /// When set, extraction stops after the first N pages per collection
    pub sample_pages: Option<usize>,

    /// HTTP client policy
    pub http: HttpConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("work/database"),
            ode_service_url: DEFAULT_ODE_SERVICE_URL.to_string(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            sample_pages: None,
            http: HttpConfig::default(),
        }
    }
}

impl HarvestConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Set the records page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Limit extraction to the first N pages per collection
    pub fn with_sample_pages(mut self, pages: usize) -> Self {
        self.sample_pages = Some(pages);
        self
    }

    /// Set the total in-flight request cap
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.http.max_in_flight = n;
        self
    }

    /// Set the ODE service endpoint
    pub fn with_ode_service_url(mut self, url: impl Into<String>) -> Self {
        self.ode_service_url = url.into();
        self
    }

    /// Set the Dataset Explorer host
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = url.into();
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.ode_service_url.is_empty() {
            return Err("ode_service_url must not be empty".to_string());
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(format!(
                "page_size must be in 1..={}, got {}",
                MAX_PAGE_SIZE, self.page_size
            ));
        }
        if self.http.max_in_flight == 0 || self.http.per_host_cap == 0 {
            return Err("concurrency caps must be positive".to_string());
        }
        if self.http.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        Ok(())
    }
}
