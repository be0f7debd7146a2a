// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File location for views and assets.
//!
//! This module provides the [`FileLocator`] trait and two implementations:
//!
//! - [`FileSystemLocator`]: searches one or more directory trees (native builds)
//! - [`MemoryLocator`]: a fixed name-to-location table (tests, embedding)
//!
//! # Resolution Algorithm
//!
//! A name without an extension is tried with every extension of its family:
//! `"font"` expands to `woff2`, `woff`, `ttf`, `otf`; `"image"` expands to the
//! common raster and vector formats; anything else is used as-is. For each
//! candidate file name and each root, in order:
//!
//! 1. `root/hint_dir/candidate`, when a hint directory is given
//! 2. `root/candidate`
//! 3. the first match of `root/**/candidate`, in sorted path order
//!
//! A root registered with a public URL prefix yields URLs
//! (`/assets/css/site.css`); other roots yield file paths.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
#[cfg(feature = "filesystem")]
use std::path::PathBuf;

/// Converts a path to a string with forward slashes.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    #[cfg(windows)]
    {
        path.as_ref().to_string_lossy().replace('\\', "/")
    }
    #[cfg(not(windows))]
    {
        path.as_ref().to_string_lossy().to_string()
    }
}

const FONT_EXTENSIONS: &[&str] = &["woff2", "woff", "ttf", "otf"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico"];

/// Expands an extension family name into concrete extensions.
pub fn extension_family(extension: &str) -> Vec<&str> {
    match extension {
        "font" => FONT_EXTENSIONS.to_vec(),
        "image" => IMAGE_EXTENSIONS.to_vec(),
        "" => Vec::new(),
        other => vec![other],
    }
}

/// Candidate file names for `name` under `extension`.
pub fn candidates(name: &str, extension: &str) -> Vec<String> {
    let trimmed = name.trim_start_matches('/');
    if Path::new(trimmed).extension().is_some() || extension.is_empty() {
        return vec![trimmed.to_string()];
    }
    extension_family(extension)
        .into_iter()
        .map(|ext| format!("{}.{}", trimmed, ext))
        .collect()
}

/// Finds files by logical name.
///
/// Implementations must be thread-safe; a locator is typically shared by
/// every request through the service container.
pub trait FileLocator: Send + Sync {
    /// Resolves `name` to a path or URL.
    ///
    /// # Arguments
    ///
    /// * `name` - File name, with or without extension
    /// * `hint_dir` - Directory (relative to each root) to try first
    /// * `extension` - Extension or family (`"css"`, `"font"`, `"image"`) used
    ///   when `name` has none
    ///
    /// Fails with [`Error::NotFound`] when no candidate exists.
    fn find_file(&self, name: &str, hint_dir: Option<&str>, extension: &str) -> Result<String>;
}

fn not_found(name: &str, extension: &str) -> Error {
    Error::NotFound(format!("file '{}' (extension '{}')", name, extension))
}

/// One directory searched by a [`FileSystemLocator`].
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct SearchRoot {
    /// Directory to search.
    pub dir: PathBuf,
    /// URL prefix for files found here; `None` yields file paths.
    pub url_prefix: Option<String>,
}

/// Searches directory trees on disk.
///
/// # Examples
///
/// ```rust,ignore
/// use httpstack::FileSystemLocator;
///
/// let locator = FileSystemLocator::new()
///     .with_root("./views")
///     .with_public_root("./public", "/assets");
/// let view = locator.find_file("home", None, "html")?;        // ./views/home.html
/// let css = locator.find_file("site", Some("css"), "css")?;   // /assets/css/site.css
/// ```
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone, Default)]
pub struct FileSystemLocator {
    roots: Vec<SearchRoot>,
}

#[cfg(feature = "filesystem")]
impl FileSystemLocator {
    /// Creates a locator with no roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root whose matches are returned as file paths.
    pub fn with_root<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.roots.push(SearchRoot {
            dir: dir.as_ref().to_path_buf(),
            url_prefix: None,
        });
        self
    }

    /// Adds a root whose matches are returned as URLs under `prefix`.
    pub fn with_public_root<P: AsRef<Path>>(mut self, dir: P, prefix: &str) -> Self {
        self.roots.push(SearchRoot {
            dir: dir.as_ref().to_path_buf(),
            url_prefix: Some(prefix.trim_end_matches('/').to_string()),
        });
        self
    }

    /// The configured roots, in search order.
    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    fn present(root: &SearchRoot, found: &Path) -> String {
        match &root.url_prefix {
            Some(prefix) => {
                let relative = found.strip_prefix(&root.dir).unwrap_or(found);
                format!("{}/{}", prefix, path_to_string(relative))
            }
            None => path_to_string(found),
        }
    }

    fn search(root: &SearchRoot, candidate: &str, hint_dir: Option<&str>) -> Option<PathBuf> {
        if let Some(hint) = hint_dir {
            let hinted = root.dir.join(hint.trim_matches('/')).join(candidate);
            if hinted.is_file() {
                return Some(hinted);
            }
        }
        let direct = root.dir.join(candidate);
        if direct.is_file() {
            return Some(direct);
        }

        let pattern = format!("{}/**/{}", path_to_string(&root.dir), candidate);
        let mut matches: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.flatten().filter(|p| p.is_file()).collect(),
            Err(e) => {
                tracing::warn!("Invalid search pattern '{}': {}", pattern, e);
                return None;
            }
        };
        matches.sort();
        matches.into_iter().next()
    }
}

#[cfg(feature = "filesystem")]
impl FileLocator for FileSystemLocator {
    fn find_file(&self, name: &str, hint_dir: Option<&str>, extension: &str) -> Result<String> {
        if Path::new(name).is_absolute() && Path::new(name).is_file() {
            return Ok(name.to_string());
        }
        for candidate in candidates(name, extension) {
            for root in &self.roots {
                if let Some(found) = Self::search(root, &candidate, hint_dir) {
                    tracing::debug!("Located '{}' at {}", name, found.display());
                    return Ok(Self::present(root, &found));
                }
            }
        }
        Err(not_found(name, extension))
    }
}

/// A fixed table of logical paths to locations.
///
/// Keys are relative paths such as `css/site.css`; values are what
/// [`find_file`](FileLocator::find_file) returns for them.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocator {
    files: HashMap<String, String>,
}

impl MemoryLocator {
    /// Creates an empty locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` (e.g. `fonts/inter.woff2`) as resolving to `location`.
    pub fn with_file(mut self, path: &str, location: &str) -> Self {
        self.add_file(path, location);
        self
    }

    /// Registers `path` as resolving to `location`.
    pub fn add_file(&mut self, path: &str, location: &str) {
        self.files
            .insert(path.trim_start_matches('/').to_string(), location.to_string());
    }
}

impl FileLocator for MemoryLocator {
    fn find_file(&self, name: &str, hint_dir: Option<&str>, extension: &str) -> Result<String> {
        for candidate in candidates(name, extension) {
            if let Some(hint) = hint_dir {
                let key = format!("{}/{}", hint.trim_matches('/'), candidate);
                if let Some(found) = self.files.get(&key) {
                    return Ok(found.clone());
                }
            }
            if let Some(found) = self.files.get(&candidate) {
                return Ok(found.clone());
            }
            let mut nested: Vec<(&String, &String)> = self
                .files
                .iter()
                .filter(|(k, _)| k.rsplit('/').next() == Some(candidate.as_str()))
                .collect();
            nested.sort();
            if let Some((_, found)) = nested.first() {
                return Ok((*found).clone());
            }
        }
        Err(not_found(name, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_expand_families() {
        assert_eq!(candidates("site", "css"), ["site.css"]);
        assert_eq!(candidates("logo.svg", "image"), ["logo.svg"]);
        assert_eq!(candidates("inter", "font")[0], "inter.woff2");
        assert_eq!(candidates("/home", "html"), ["home.html"]);
    }

    #[test]
    fn test_memory_locator_prefers_hint_then_direct_then_nested() {
        let locator = MemoryLocator::new()
            .with_file("site.css", "/a/site.css")
            .with_file("css/site.css", "/b/site.css")
            .with_file("deep/fonts/inter.woff", "/f/inter.woff");
        assert_eq!(locator.find_file("site", Some("css"), "css").unwrap(), "/b/site.css");
        assert_eq!(locator.find_file("site", None, "css").unwrap(), "/a/site.css");
        assert_eq!(locator.find_file("inter", None, "font").unwrap(), "/f/inter.woff");
        assert!(locator.find_file("missing", None, "js").unwrap_err().is_not_found());
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn test_filesystem_locator_search_order() {
        let views = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();
        std::fs::write(views.path().join("home.html"), "<p>home</p>").unwrap();
        std::fs::create_dir_all(public.path().join("css/vendor")).unwrap();
        std::fs::write(public.path().join("css/vendor/site.css"), "").unwrap();
        std::fs::create_dir_all(public.path().join("img")).unwrap();
        std::fs::write(public.path().join("img/logo.png"), "").unwrap();

        let locator = FileSystemLocator::new()
            .with_root(views.path())
            .with_public_root(public.path(), "/assets/");

        let home = locator.find_file("home", None, "html").unwrap();
        assert!(home.ends_with("home.html"));
        assert!(Path::new(&home).is_file());

        assert_eq!(
            locator.find_file("site", Some("css"), "css").unwrap(),
            "/assets/css/vendor/site.css"
        );
        assert_eq!(
            locator.find_file("logo", Some("img"), "image").unwrap(),
            "/assets/img/logo.png"
        );
        assert!(locator.find_file("nope", None, "html").unwrap_err().is_not_found());
    }
}
