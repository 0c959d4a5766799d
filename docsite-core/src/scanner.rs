use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::document::Document;
use crate::frontmatter::FrontMatterError;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("source directory does not exist: {}", .0.display())]
    MissingSourceDir(PathBuf),
    #[error("malformed metadata in {}: {source}", path.display())]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Everything found under the source directory.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub documents: Vec<Document>,
    /// Non-Markdown files, relative to the source directory.
    pub assets: Vec<PathBuf>,
}

pub struct SiteScanner {
    source_dir: PathBuf,
}

impl SiteScanner {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source_dir: path.as_ref().to_path_buf(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn scan(&self) -> Result<ScanOutput, ScanError> {
        if !self.source_dir.is_dir() {
            return Err(ScanError::MissingSourceDir(self.source_dir.clone()));
        }
        tracing::info!(source = %self.source_dir.display(), "Scanning content");

        let mut output = ScanOutput::default();

        for entry in WalkDir::new(&self.source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.source_dir.clone());
                ScanError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.source_dir)
                .map_err(|_| ScanError::InvalidPath(entry.path().to_path_buf()))?
                .to_path_buf();

            if is_markdown(entry.path()) {
                output.documents.push(self.scan_document(entry.path(), relative)?);
            } else {
                output.assets.push(relative);
            }
        }

        tracing::info!(
            documents = output.documents.len(),
            assets = output.assets.len(),
            "Scan complete"
        );
        Ok(output)
    }

    fn scan_document(&self, path: &Path, relative: PathBuf) -> Result<Document, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let document = Document::parse(&relative, &text).map_err(|source| ScanError::MalformedMetadata {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %document.path, category = document.meta.category(), "Parsed document");

        Ok(document)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}
