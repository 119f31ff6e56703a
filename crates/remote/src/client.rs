use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response, multipart::Form};
use serde::Serialize;

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest<'a> {
    html_string: &'a str,
}

/// Blocking client for the document service. Call it off the UI thread.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    config: RemoteConfig,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        // The blocking client otherwise gives up after 30 seconds.
        let http = Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|source| RemoteError::Http {
                url: config.base_url.clone(),
                source,
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Posts `{"htmlString": html}` and returns the generated document.
    pub fn export_docx(&self, html: &str) -> Result<Vec<u8>> {
        let url = self.config.export_url();
        let response = self
            .http
            .post(&url)
            .json(&ExportRequest { html_string: html })
            .send()
            .map_err(|source| http_error(&url, source))?;
        let bytes = check_status(&url, response)?
            .bytes()
            .map_err(|source| http_error(&url, source))?;
        Ok(bytes.to_vec())
    }

    /// Uploads `path` as the `file` form field and returns the HTML the
    /// service converted it to.
    pub fn convert(&self, path: &Path) -> Result<String> {
        let url = self.config.convert_url();
        let form = Form::new()
            .file("file", path)
            .map_err(|source| RemoteError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|source| http_error(&url, source))?;
        check_status(&url, response)?
            .text()
            .map_err(|source| http_error(&url, source))
    }
}

fn http_error(url: &str, source: reqwest::Error) -> RemoteError {
    RemoteError::Http {
        url: url.to_string(),
        source,
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}
