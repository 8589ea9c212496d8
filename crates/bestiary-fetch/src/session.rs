use async_trait::async_trait;

use crate::config::AcquireConfig;
use crate::error::FetchError;

/// Network access of one worker.
///
/// Every worker opens its own session once and reuses it for all the entries it
/// handles, so an implementation may keep connections alive between requests.
#[async_trait]
pub trait Session: Send + Sync + Sized {
    type Config: Clone + Send + Sync + 'static;

    fn open(config: &Self::Config) -> anyhow::Result<Self>;

    /// Fetches an HTML page.
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches the raw bytes of an image.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// A [`Session`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: reqwest::Client,
    max_image_bytes: u64,
}

#[async_trait]
impl Session for HttpSession {
    type Config = AcquireConfig;

    fn open(config: &Self::Config) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            max_image_bytes: config.max_image_bytes,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut resp = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = resp.content_length() {
            if len > self.max_image_bytes {
                return Err(FetchError::TooLarge(len));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_image_bytes {
                return Err(FetchError::TooLarge(bytes.len() as u64));
            }
        }
        Ok(bytes)
    }
}
