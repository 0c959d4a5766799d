pub mod builder;
pub mod config;
pub mod deploy;
pub mod document;
pub mod frontmatter;
pub mod links;
pub mod markdown;
pub mod navigation;
pub mod renderer;
pub mod scanner;
pub mod store;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildReport, Site, SiteBuilder, build_site, verify_output_dir};
pub use document::Document;
pub use frontmatter::{FrontMatter, FrontMatterError};
pub use links::{LinkResolver, UnresolvedLink};
pub use navigation::{NavGroup, NavIndex, NavItem};
pub use scanner::{ScanError, SiteScanner};
pub use store::ContentStore;
pub use template::{TemplateError, TemplateRenderer};
