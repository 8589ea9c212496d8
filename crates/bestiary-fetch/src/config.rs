use std::cmp;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Attempts per image download, at least one is always made
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the random part of a delay, as a share of its exponential part
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Makes backoff jitter reproducible
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Declared width or height under which an image is considered an icon
    #[serde(default = "default_min_image_dimension")]
    pub min_image_dimension: u32,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

impl AcquireConfig {
    pub fn retries(&self) -> u32 {
        cmp::max(1, self.retries)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.jitter_ratio,
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            num_workers: default_num_workers(),
            retries: default_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
            seed: default_seed(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            min_image_dimension: default_min_image_dimension(),
            max_image_bytes: default_max_image_bytes(),
            image_dir: default_image_dir(),
        }
    }
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0 Safari/537.36 bestiary/0.1",
    )
}

fn default_num_workers() -> usize {
    cmp::max(1, num_cpus::get().saturating_sub(2))
}

fn default_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.25
}

fn default_seed() -> Option<u64> {
    None
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_min_image_dimension() -> u32 {
    100
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("data/images")
}
