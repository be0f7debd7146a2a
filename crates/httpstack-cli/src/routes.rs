// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Declarative route files.
//!
//! Every `*.toml` file in the routes directory holds `[[route]]` tables. Files
//! are loaded in file-name order and all of them register into one router, so
//! two files naming the same method and pattern add handlers to one entry.
//!
//! ```toml
//! [[route]]
//! phase = "before"
//! pattern = "*"
//! handlers = ["template@init"]
//!
//! [[route]]
//! method = "GET"
//! pattern = "/{page}"
//! handlers = ["page@show"]
//! ```

use anyhow::Context;
use httpstack::locator::path_to_string;
use httpstack::{Handler, Phase, Route, Router};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One `[[route]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDef {
    /// HTTP method or `ANY` (default: "GET").
    #[serde(default = "default_method")]
    pub method: String,
    /// Path pattern.
    pub pattern: String,
    /// `before` or `after` (default: "after").
    #[serde(default = "default_phase")]
    pub phase: Phase,
    /// Handlers as `target@method`, in call order.
    #[serde(default)]
    pub handlers: Vec<String>,
}

/// Contents of one route file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteFile {
    /// Route tables in file order.
    #[serde(default)]
    pub route: Vec<RouteDef>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_phase() -> Phase {
    Phase::After
}

impl RouteDef {
    /// Converts the definition into a registrable route.
    pub fn to_route(&self) -> anyhow::Result<Route> {
        let mut route = Route::new(&self.method, &self.pattern, self.phase);
        for name in &self.handlers {
            route = route.handler(Handler::parse(name)?);
        }
        Ok(route)
    }
}

/// Route files in `dir`, sorted by name.
pub fn route_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = path_to_string(dir.join("*.toml"));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?.flatten().filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// Parses one route file.
pub fn parse_route_file(path: &Path) -> anyhow::Result<RouteFile> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).with_context(|| format!("invalid route file {}", path.display()))
}

/// Registers every route file in `dir`; returns the number of routes read.
pub fn load_routes(dir: &Path, router: &mut Router) -> anyhow::Result<usize> {
    let mut count = 0;
    for file in route_files(dir)? {
        let parsed = parse_route_file(&file)?;
        tracing::debug!("{}: {} routes", file.display(), parsed.route.len());
        for def in &parsed.route {
            let route = def
                .to_route()
                .with_context(|| format!("{}: route '{}'", file.display(), def.pattern))?;
            router
                .register(route)
                .with_context(|| format!("{}: route '{}'", file.display(), def.pattern))?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_files_load_in_name_order_and_accumulate() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("20-pages.toml"),
            "[[route]]\npattern = \"/\"\nhandlers = [\"page@show\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("10-middleware.toml"),
            "[[route]]\nphase = \"before\"\npattern = \"*\"\nhandlers = [\"template@init\"]\n\n\
             [[route]]\npattern = \"/\"\nhandlers = [\"page@prepare\"]\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a route file").unwrap();

        let mut router = Router::new();
        assert_eq!(load_routes(dir.path(), &mut router).unwrap(), 3);

        let routes = router.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].phase, Phase::Before);
        assert_eq!(routes[1].pattern, "/");
        assert_eq!(routes[1].handlers, ["page@prepare", "page@show"]);
    }

    #[test]
    fn test_bad_handler_names_the_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bad.toml"),
            "[[route]]\npattern = \"/\"\nhandlers = [\"nomethod\"]\n",
        )
        .unwrap();
        let err = load_routes(dir.path(), &mut Router::new()).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.toml"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut router = Router::new();
        assert_eq!(load_routes(&dir.path().join("none"), &mut router).unwrap(), 0);
        assert!(router.is_empty());
    }
}
