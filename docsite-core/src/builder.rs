use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::Config;
use crate::deploy::DeployError;
use crate::document::Document;
use crate::links::{LinkResolver, UnresolvedLink};
use crate::navigation::NavIndex;
use crate::renderer::Renderer;
use crate::scanner::{ScanError, SiteScanner};
use crate::store::ContentStore;
use crate::template::TemplateError;

const THEME_STATIC_DIR: &str = "static";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Source directory not specified")]
    MissingSourceDir,
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("invalid deployment descriptor: {0}")]
    Deploy(#[from] DeployError),
    #[error("{first} and {second} would both be written to {}", output.display())]
    OutputCollision {
        output: PathBuf,
        first: String,
        second: String,
    },
    #[error("output directory {} is missing after the build", .0.display())]
    MissingOutputDirectory(PathBuf),
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub pages: Vec<PathBuf>,
    pub assets: usize,
    pub navigation: NavIndex,
    pub unresolved_links: Vec<UnresolvedLink>,
    pub artifacts: Vec<PathBuf>,
}

impl BuildReport {
    pub fn category_count(&self) -> usize {
        self.navigation.groups.len()
    }
}

pub struct SiteBuilder {
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
    theme_dir: PathBuf,
    config: Config,
    documents: Vec<Document>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            source_dir: None,
            output_dir: PathBuf::from("./out"),
            theme_dir: PathBuf::from("./theme"),
            config: Config::default(),
            documents: Vec::new(),
        }
    }

    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn theme_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.theme_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    // Content that doesn't come from the source directory
    pub fn add_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn add_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents.extend(documents);
        self
    }

    /// Scan the source directory, snapshot the content and prepare the
    /// renderer. Nothing is written yet.
    pub fn build(self) -> Result<Site, BuildError> {
        if self.source_dir.is_none() && self.documents.is_empty() {
            return Err(BuildError::MissingSourceDir);
        }
        self.config.deploy.validate()?;

        let mut documents = Vec::new();
        let mut assets = Vec::new();
        if let Some(source_dir) = &self.source_dir {
            let scanned = SiteScanner::new(source_dir).scan()?;
            documents = scanned.documents;
            assets = scanned.assets;
        }
        documents.extend(self.documents);

        let store = ContentStore::new(documents);
        check_output_paths(&store)?;
        let navigation = NavIndex::build(&store, &self.config.navigation.categories);

        let mut renderer = Renderer::new(&self.theme_dir)?;
        renderer.set_global_context("site", &self.config.site);
        renderer.set_global_context("navigation", &navigation);
        renderer.set_global_context("live_reload", &self.config.live_reload.as_ref().map(|l| l.url()));

        Ok(Site {
            store,
            navigation,
            renderer,
            assets,
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            theme_dir: self.theme_dir,
            config: self.config,
        })
    }
}

pub struct Site {
    store: ContentStore,
    navigation: NavIndex,
    renderer: Renderer,
    assets: Vec<PathBuf>,
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
    theme_dir: PathBuf,
    config: Config,
}

impl Site {
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn navigation(&self) -> &NavIndex {
        &self.navigation
    }

    /// Check links, render every page, copy assets and write the hosting
    /// artifacts. Unresolved links are reported but don't stop the build.
    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| BuildError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let unresolved_links = LinkResolver::new(&self.config.content.prefix).check_all(&self.store);
        if !unresolved_links.is_empty() {
            tracing::warn!(count = unresolved_links.len(), "Build has unresolved links");
        }

        // Pages share nothing mutable, so they render in any order
        let pages = self
            .store
            .documents()
            .par_iter()
            .map(|document| self.render_document(document))
            .collect::<Result<Vec<_>, _>>()?;

        let assets = self.copy_assets()?;

        verify_output_dir(&self.output_dir)?;
        let artifacts = self.config.deploy.write_artifacts(&self.output_dir)?;

        tracing::info!(
            pages = pages.len(),
            categories = self.navigation.groups.len(),
            assets,
            unresolved = unresolved_links.len(),
            output = %self.output_dir.display(),
            "Site built"
        );

        Ok(BuildReport {
            output_dir: self.output_dir.clone(),
            pages,
            assets,
            navigation: self.navigation.clone(),
            unresolved_links,
            artifacts,
        })
    }

    fn render_document(&self, document: &Document) -> Result<PathBuf, BuildError> {
        let html = self.renderer.render_document(document, &self.navigation)?;
        let output_path = self.output_dir.join(document.out_path());
        write_file(&output_path, html.as_bytes())?;
        tracing::debug!(path = %document.path, out = %output_path.display(), "Rendered page");
        Ok(output_path)
    }

    fn copy_assets(&self) -> Result<usize, BuildError> {
        let mut copied = 0;

        if let Some(source_dir) = &self.source_dir {
            for relative in &self.assets {
                copy_file(&source_dir.join(relative), &self.output_dir.join(relative))?;
                copied += 1;
            }
        }

        let static_dir = self.theme_dir.join(THEME_STATIC_DIR);
        if static_dir.is_dir() {
            for entry in WalkDir::new(&static_dir).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| BuildError::Io {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| static_dir.clone()),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&static_dir) else {
                    continue;
                };
                copy_file(entry.path(), &self.output_dir.join(relative))?;
                copied += 1;
            }
        }

        Ok(copied)
    }
}

/// `content/foo.md` and `content/foo/index.md` both publish to
/// `content/foo/index.html`; one would silently overwrite the other.
fn check_output_paths(store: &ContentStore) -> Result<(), BuildError> {
    let mut seen: HashMap<PathBuf, &str> = HashMap::new();
    for document in store.documents() {
        if let Some(first) = seen.insert(document.out_path(), &document.path) {
            return Err(BuildError::OutputCollision {
                output: document.out_path(),
                first: first.to_string(),
                second: document.path.clone(),
            });
        }
    }
    Ok(())
}

/// Fail when the publish directory is absent, so a misconfigured build never
/// reaches deployment.
pub fn verify_output_dir(output_dir: &Path) -> Result<(), BuildError> {
    if output_dir.is_dir() {
        Ok(())
    } else {
        Err(BuildError::MissingOutputDirectory(output_dir.to_path_buf()))
    }
}

/// Scan, render and publish a site in one call.
pub fn build_site(
    config: &Config,
    source_dir: &Path,
    output_dir: &Path,
    theme_dir: &Path,
) -> Result<BuildReport, BuildError> {
    SiteBuilder::new()
        .source_dir(source_dir)
        .output_dir(output_dir)
        .theme_dir(theme_dir)
        .config(config.clone())
        .build()?
        .render_all()
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    let io_err = |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, contents).map_err(io_err)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    let io_err = |source| BuildError::Io {
        path: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::copy(from, to).map(|_| ()).map_err(io_err)
}
