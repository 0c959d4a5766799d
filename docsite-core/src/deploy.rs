//! Hosting descriptor: build settings, redirect rules and response headers.
//!
//! The descriptor is only declared here. It is written out as the Netlify
//! `_redirects` / `_headers` files (and optionally a `netlify.toml`) for the
//! hosting provider to apply.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("{field} pattern must start with '/': {value}")]
    RelativePattern { field: &'static str, value: String },
    #[error("redirect {from} has invalid status code {status}")]
    InvalidStatus { from: String, status: u16 },
    #[error("header rule {pattern} has an empty header name")]
    EmptyHeaderName { pattern: String },
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize netlify.toml: {0}")]
    Manifest(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentDescriptor {
    pub build: BuildSettings,
    pub redirects: Vec<RedirectRule>,
    pub headers: Vec<HeaderRule>,
    /// Also write a `netlify.toml` into the output directory.
    pub emit_manifest: bool,
}

impl Default for DeploymentDescriptor {
    fn default() -> Self {
        Self {
            build: BuildSettings::default(),
            redirects: Vec::new(),
            headers: vec![HeaderRule::security_defaults()],
            emit_manifest: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    pub command: String,
    pub publish: String,
    pub node_version: Option<String>,
    /// Install devDependencies during the hosted build.
    pub install_dev_dependencies: bool,
    pub environment: BTreeMap<String, String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: "docsite build".to_string(),
            publish: "out".to_string(),
            node_version: Some("18".to_string()),
            install_dev_dependencies: true,
            environment: BTreeMap::new(),
        }
    }
}

impl BuildSettings {
    /// Environment handed to the hosted build, pins included.
    pub fn resolved_environment(&self) -> BTreeMap<String, String> {
        let mut env = self.environment.clone();
        if let Some(version) = &self.node_version {
            env.entry("NODE_VERSION".to_string()).or_insert_with(|| version.clone());
        }
        let npm_flags = if self.install_dev_dependencies { "--include=dev" } else { "--omit=dev" };
        env.entry("NPM_FLAGS".to_string()).or_insert_with(|| npm_flags.to_string());
        env
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
    #[serde(default = "default_redirect_status")]
    pub status: u16,
    #[serde(default)]
    pub force: bool,
}

fn default_redirect_status() -> u16 {
    301
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderRule {
    #[serde(rename = "for")]
    pub pattern: String,
    pub values: BTreeMap<String, String>,
}

impl HeaderRule {
    pub fn security_defaults() -> Self {
        let values = [
            ("X-Frame-Options", "DENY"),
            ("X-Content-Type-Options", "nosniff"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ("X-XSS-Protection", "1; mode=block"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            pattern: "/*".to_string(),
            values,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        pattern_matches(&self.pattern, path)
    }
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// Netlify-style path matching: a trailing `*` matches any suffix, anything
/// else must match exactly. Trailing slashes are not significant.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix) || path == prefix.trim_end_matches('/');
    }
    let trim = |p: &str| -> String {
        let t = p.trim_end_matches('/');
        if t.is_empty() { "/".to_string() } else { t.to_string() }
    };
    trim(pattern) == trim(path)
}

impl DeploymentDescriptor {
    pub fn validate(&self) -> Result<(), DeployError> {
        for rule in &self.redirects {
            if !rule.from.starts_with('/') {
                return Err(DeployError::RelativePattern {
                    field: "redirect",
                    value: rule.from.clone(),
                });
            }
            if !(200..=599).contains(&rule.status) {
                return Err(DeployError::InvalidStatus {
                    from: rule.from.clone(),
                    status: rule.status,
                });
            }
        }
        for rule in &self.headers {
            if !rule.pattern.starts_with('/') {
                return Err(DeployError::RelativePattern {
                    field: "header",
                    value: rule.pattern.clone(),
                });
            }
            if rule.values.keys().any(|k| k.trim().is_empty()) {
                return Err(DeployError::EmptyHeaderName {
                    pattern: rule.pattern.clone(),
                });
            }
        }
        Ok(())
    }

    /// Contents of the `_redirects` file.
    pub fn redirects_file(&self) -> String {
        let mut out = String::new();
        for rule in &self.redirects {
            let force = if rule.force { "!" } else { "" };
            let _ = writeln!(out, "{}  {}  {}{}", rule.from, rule.to, rule.status, force);
        }
        out
    }

    /// Contents of the `_headers` file.
    pub fn headers_file(&self) -> String {
        let mut out = String::new();
        for rule in &self.headers {
            let _ = writeln!(out, "{}", rule.pattern);
            for (name, value) in &rule.values {
                let _ = writeln!(out, "  {name}: {value}");
            }
        }
        out
    }

    /// A `netlify.toml` equivalent of the whole descriptor.
    pub fn netlify_toml(&self) -> Result<String, DeployError> {
        #[derive(Serialize)]
        struct Manifest<'a> {
            build: ManifestBuild<'a>,
            #[serde(skip_serializing_if = "is_empty_slice")]
            redirects: &'a [RedirectRule],
            #[serde(skip_serializing_if = "is_empty_slice")]
            headers: &'a [HeaderRule],
        }

        #[derive(Serialize)]
        struct ManifestBuild<'a> {
            command: &'a str,
            publish: &'a str,
            environment: BTreeMap<String, String>,
        }

        let manifest = Manifest {
            build: ManifestBuild {
                command: &self.build.command,
                publish: &self.build.publish,
                environment: self.build.resolved_environment(),
            },
            redirects: &self.redirects,
            headers: &self.headers,
        };
        Ok(toml::to_string(&manifest)?)
    }

    /// Write the hosting artifacts into the publish directory.
    pub fn write_artifacts(&self, output_dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
        self.validate()?;

        let mut files = vec![
            (output_dir.join("_redirects"), self.redirects_file()),
            (output_dir.join("_headers"), self.headers_file()),
        ];
        if self.emit_manifest {
            files.push((output_dir.join("netlify.toml"), self.netlify_toml()?));
        }

        let mut written = Vec::with_capacity(files.len());
        for (path, contents) in files {
            std::fs::write(&path, contents).map_err(|source| DeployError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "Wrote deployment artifact");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn redirect(from: &str, to: &str, status: u16) -> RedirectRule {
        RedirectRule {
            from: from.to_string(),
            to: to.to_string(),
            status,
            force: false,
        }
    }

    #[test]
    fn test_default_descriptor_carries_security_headers() {
        let descriptor = DeploymentDescriptor::default();
        descriptor.validate().unwrap();

        let headers = &descriptor.headers[0];
        assert_eq!(headers.pattern, "/*");
        assert_eq!(headers.values["X-Frame-Options"], "DENY");
        assert_eq!(headers.values["X-Content-Type-Options"], "nosniff");
    }

    #[test]
    fn test_headers_file_format() {
        let descriptor = DeploymentDescriptor::default();
        assert_eq!(
            descriptor.headers_file(),
            "/*\n  Referrer-Policy: strict-origin-when-cross-origin\n  X-Content-Type-Options: nosniff\n  X-Frame-Options: DENY\n  X-XSS-Protection: 1; mode=block\n"
        );
    }

    #[test]
    fn test_redirects_file_format() {
        let mut descriptor = DeploymentDescriptor::default();
        descriptor.redirects.push(redirect("/docs/*", "/content/:splat", 301));
        descriptor.redirects.push(RedirectRule {
            force: true,
            ..redirect("/old", "/content/components/index", 302)
        });

        assert_eq!(
            descriptor.redirects_file(),
            "/docs/*  /content/:splat  301\n/old  /content/components/index  302!\n"
        );
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let mut descriptor = DeploymentDescriptor::default();
        descriptor.redirects.push(redirect("docs/*", "/content", 301));
        assert!(matches!(descriptor.validate(), Err(DeployError::RelativePattern { .. })));

        let mut descriptor = DeploymentDescriptor::default();
        descriptor.redirects.push(redirect("/docs", "/content", 42));
        assert!(matches!(descriptor.validate(), Err(DeployError::InvalidStatus { status: 42, .. })));

        let mut descriptor = DeploymentDescriptor::default();
        descriptor.headers[0].values.insert(" ".to_string(), "x".to_string());
        assert!(matches!(descriptor.validate(), Err(DeployError::EmptyHeaderName { .. })));
    }

    #[test]
    fn test_resolved_environment() {
        let settings = BuildSettings {
            install_dev_dependencies: false,
            ..BuildSettings::default()
        };
        let env = settings.resolved_environment();
        assert_eq!(env["NODE_VERSION"], "18");
        assert_eq!(env["NPM_FLAGS"], "--omit=dev");
    }

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("/*", "/content/components/button/"));
        assert!(pattern_matches("/content/*", "/content/a"));
        assert!(pattern_matches("/content/*", "/content"));
        assert!(!pattern_matches("/content/*", "/contents"));
        assert!(pattern_matches("/about/", "/about"));
        assert!(!pattern_matches("/about", "/about/team"));
    }

    #[test]
    fn test_netlify_manifest() {
        let mut descriptor = DeploymentDescriptor::default();
        descriptor.redirects.push(redirect("/docs/*", "/content/:splat", 301));

        let manifest = descriptor.netlify_toml().unwrap();
        let parsed: toml::Value = toml::from_str(&manifest).unwrap();

        assert_eq!(parsed["build"]["command"].as_str(), Some("docsite build"));
        assert_eq!(parsed["build"]["environment"]["NODE_VERSION"].as_str(), Some("18"));
        assert_eq!(parsed["redirects"][0]["status"].as_integer(), Some(301));
        assert_eq!(parsed["headers"][0]["for"].as_str(), Some("/*"));
        assert_eq!(parsed["headers"][0]["values"]["X-Frame-Options"].as_str(), Some("DENY"));
    }

    #[test]
    fn test_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = DeploymentDescriptor {
            emit_manifest: true,
            ..DeploymentDescriptor::default()
        };

        let written = descriptor.write_artifacts(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("_headers").is_file());
        assert!(dir.path().join("netlify.toml").is_file());
    }
}
