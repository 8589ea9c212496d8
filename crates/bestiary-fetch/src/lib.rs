mod backoff;
mod config;
mod error;
mod locator;
mod manifest;
mod pool;
mod session;

pub use backoff::Backoff;
pub use config::AcquireConfig;
pub use error::FetchError;
pub use locator::{first_candidate, image_extension, is_decorative, ImageLocator};
pub use manifest::{apply, DownloadRecord, Manifest, Snapshot};
pub use pool::{acquire, Acquired, Target};
pub use session::{HttpSession, Session};

pub use bestiary_table::DownloadStatus;
