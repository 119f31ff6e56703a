use std::path::{Path, PathBuf};

use rich_editor_core::{Document, Editor};
use rich_editor_html::{export_html, html_to_document};

use crate::client::RemoteClient;
use crate::error::{RemoteError, Result};

/// A generated document waiting to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl ExportedDocument {
    /// Writes the document into `dir` under its download name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.save_as(&path)?;
        Ok(path)
    }

    pub fn save_as(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes).map_err(|source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("saved {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

/// Editor content to a `.docx` produced by the document service. The editor
/// is only read.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    client: RemoteClient,
}

impl ExportPipeline {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    pub fn run(&self, editor: &Editor) -> Result<ExportedDocument> {
        self.submit(&export_html(editor))
    }

    /// Sends already rendered HTML. Useful when the HTML is produced on one
    /// thread and the request runs on another.
    pub fn submit(&self, html: &str) -> Result<ExportedDocument> {
        match self.client.export_docx(html) {
            Ok(bytes) => {
                log::info!("export returned {} bytes", bytes.len());
                Ok(ExportedDocument {
                    bytes,
                    file_name: self.client.config().download_name.clone(),
                })
            }
            Err(err) => {
                log::error!("export failed: {err}");
                Err(err)
            }
        }
    }
}

/// A file on disk to a fresh document, via the service's HTML conversion.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    client: RemoteClient,
}

impl ImportPipeline {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    pub fn run(&self, path: &Path) -> Result<Document> {
        let result = self
            .client
            .convert(path)
            .and_then(|html| Ok(html_to_document(&html)?));
        match &result {
            Ok(doc) => log::info!(
                "imported {} as {} blocks",
                path.display(),
                doc.blocks.len()
            ),
            Err(err) => log::error!("import of {} failed: {err}", path.display()),
        }
        result
    }
}
