// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project configuration.
//!
//! Configuration is loaded from `app.toml` at the project root. Every section
//! and field is optional.
//!
//! # Example Configuration
//!
//! ```toml
//! [app]
//! name = "my-site"
//! abort_on_before_error = false
//!
//! [paths]
//! routes_dir = "routes"
//! views_dir = "views/routes"
//! templates_dir = "views/templates"
//! data_dir = "data"
//! public_dir = "public"
//! assets_manifest = "assets.json"
//!
//! [template]
//! base_layout = "base.html"
//! assets_url = "/public"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [database]
//! path = "data/site.db"
//! table = "pages"
//! ```

use anyhow::Context;
use httpstack::AssetDescriptor;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the project configuration.
pub const CONFIG_FILE: &str = "app.toml";

/// Main configuration structure loaded from `app.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Application settings.
    #[serde(default)]
    pub app: AppConfig,
    /// Project directory layout.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Base template settings.
    #[serde(default)]
    pub template: TemplateConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Optional relational page store.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application name (default: "httpstack").
    #[serde(default = "default_name")]
    pub name: String,
    /// Stop a request when a before handler fails (default: false).
    #[serde(default)]
    pub abort_on_before_error: bool,
}

/// Project directory layout, relative to the project root.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Route definition files (default: "routes").
    #[serde(default = "default_routes_dir")]
    pub routes_dir: String,
    /// Page views (default: "views/routes").
    #[serde(default = "default_views_dir")]
    pub views_dir: String,
    /// Base layouts (default: "views/templates").
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    /// Datasource files (default: "data").
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Public assets served as-is (default: "public").
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// Asset manifest bound into every page (default: "assets.json").
    #[serde(default = "default_assets_manifest")]
    pub assets_manifest: String,
}

/// Base template settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Layout file name, looked up in the templates directory (default: "base.html").
    #[serde(default = "default_base_layout")]
    pub base_layout: String,
    /// URL prefix the public directory is served under (default: "/public").
    #[serde(default = "default_assets_url")]
    pub assets_url: String,
    /// XPath of the element views are merged into.
    #[serde(default = "default_view_slot")]
    pub view_slot: String,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Relational page store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, relative to the project root. Disabled when unset.
    #[serde(default)]
    pub path: Option<String>,
    /// Table holding one row per page, keyed by a `slug` column (default: "pages").
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_name() -> String {
    "httpstack".to_string()
}

fn default_routes_dir() -> String {
    "routes".to_string()
}

fn default_views_dir() -> String {
    "views/routes".to_string()
}

fn default_templates_dir() -> String {
    "views/templates".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_assets_manifest() -> String {
    "assets.json".to_string()
}

fn default_base_layout() -> String {
    "base.html".to_string()
}

fn default_assets_url() -> String {
    "/public".to_string()
}

fn default_view_slot() -> String {
    httpstack::template::DEFAULT_VIEW_SLOT.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_table() -> String {
    "pages".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            abort_on_before_error: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            routes_dir: default_routes_dir(),
            views_dir: default_views_dir(),
            templates_dir: default_templates_dir(),
            data_dir: default_data_dir(),
            public_dir: default_public_dir(),
            assets_manifest: default_assets_manifest(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            base_layout: default_base_layout(),
            assets_url: default_assets_url(),
            view_slot: default_view_slot(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: default_table(),
        }
    }
}

impl Config {
    /// Loads `app.toml` from `root`.
    ///
    /// If no configuration file exists, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid {}", config_path.display()))?;
        Ok(config)
    }
}

/// A project root plus its configuration.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project root directory.
    pub root: PathBuf,
    /// Parsed `app.toml`.
    pub config: Config,
}

impl Project {
    /// Loads the project at `root`.
    pub fn open(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = Config::load(&root)?;
        Ok(Self { root, config })
    }

    /// Resolves a configured path against the project root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Route definition directory.
    pub fn routes_dir(&self) -> PathBuf {
        self.path(&self.config.paths.routes_dir)
    }

    /// Page view directory.
    pub fn views_dir(&self) -> PathBuf {
        self.path(&self.config.paths.views_dir)
    }

    /// Base layout directory.
    pub fn templates_dir(&self) -> PathBuf {
        self.path(&self.config.paths.templates_dir)
    }

    /// Datasource directory.
    pub fn data_dir(&self) -> PathBuf {
        self.path(&self.config.paths.data_dir)
    }

    /// Public assets directory.
    pub fn public_dir(&self) -> PathBuf {
        self.path(&self.config.paths.public_dir)
    }

    /// Reads the asset manifest; a missing file yields no assets.
    pub fn load_assets(&self) -> anyhow::Result<Vec<AssetDescriptor>> {
        let manifest = self.path(&self.config.paths.assets_manifest);
        if !manifest.is_file() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&manifest)?;
        let assets: Vec<AssetDescriptor> = serde_json::from_str(&content)
            .with_context(|| format!("invalid asset manifest {}", manifest.display()))?;
        tracing::debug!("Loaded {} assets from {}", assets.len(), manifest.display());
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.config.paths.routes_dir, "routes");
        assert_eq!(project.config.server.port, 3000);
        assert!(project.config.database.path.is_none());
        assert!(project.load_assets().unwrap().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[app]\nname = \"site\"\n\n[server]\nport = 8080\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.app.name, "site");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.template.base_layout, "base.html");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[server]\nport = \"x\"\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_asset_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("assets.json"),
            r#"[{"type": "css", "filename": "site"}, {"type": "js", "cdn": "https://cdn/x.js"}]"#,
        )
        .unwrap();
        let assets = Project::open(dir.path()).unwrap().load_assets().unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[1].cdn.as_deref(), Some("https://cdn/x.js"));
    }
}
