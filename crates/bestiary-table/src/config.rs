use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    /// Base against which relative animal links of the snapshot are resolved
    #[serde(default = "default_base_url")]
    pub base_url: Url,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://en.wikipedia.org").unwrap()
}
