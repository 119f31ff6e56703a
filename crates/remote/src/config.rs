use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Where the document service lives and what the export is called on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub export_path: String,
    pub convert_path: String,
    pub download_name: String,
    /// Request timeout. Requests wait for the service indefinitely when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            export_path: "/api/Export".to_string(),
            convert_path: "/api/export/convert".to_string(),
            download_name: "file.docx".to_string(),
            timeout_secs: None,
        }
    }
}

impl RemoteConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn export_url(&self) -> String {
        join(&self.base_url, &self.export_path)
    }

    pub fn convert_url(&self) -> String {
        join(&self.base_url, &self.convert_path)
    }
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
