use std::path::PathBuf;

use rich_editor_html::ImportError;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("converted document is not usable: {0}")]
    Import(#[from] ImportError),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
