// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Asset tags for stylesheets, scripts, fonts and images.
//!
//! [`AssetBinder`] turns [`AssetDescriptor`]s into markup:
//!
//! | kind         | element                                                         | placed in |
//! |--------------|-----------------------------------------------------------------|-----------|
//! | `stylesheet` | `<link rel="stylesheet" href>`                                  | head      |
//! | `script`     | `<script src defer>`                                            | body      |
//! | `font`       | `<link rel="preload" as="font" crossorigin="anonymous" href>`, plus a stylesheet link when `stylesheet_cdn` is set | head |
//! | `image`      | one inline script preloading every unique image URL             | body      |
//!
//! Head content falls back to the body and vice versa. An asset whose
//! location cannot be resolved is logged and skipped; binding never fails.

use crate::dom::{DomTree, NodeId, NodeKind};
use crate::locator::FileLocator;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What an asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// A CSS file.
    #[serde(alias = "sheet", alias = "css")]
    Stylesheet,
    /// A JavaScript file.
    #[serde(alias = "js")]
    Script,
    /// A web font.
    Font,
    /// An image to preload.
    #[serde(alias = "img")]
    Image,
}

impl AssetKind {
    /// Extension (or family) used to locate files of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
            AssetKind::Font => "font",
            AssetKind::Image => "image",
        }
    }

    /// Conventional directory for files of this kind.
    pub fn directory(self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
            AssetKind::Font => "fonts",
            AssetKind::Image => "img",
        }
    }

    /// Classifies a file by extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "css" => Some(AssetKind::Stylesheet),
            "js" | "mjs" => Some(AssetKind::Script),
            "woff2" | "woff" | "ttf" | "otf" => Some(AssetKind::Font),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" => Some(AssetKind::Image),
            _ => None,
        }
    }
}

/// One asset to bind.
///
/// Deserializes from JSON or TOML such as
/// `{ "type": "font", "filename": "inter", "stylesheet_cdn": "https://..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// The asset kind.
    #[serde(rename = "type", alias = "kind")]
    pub kind: AssetKind,
    /// Absolute URL; wins over `filename` when set.
    #[serde(default, alias = "src", alias = "href", skip_serializing_if = "Option::is_none")]
    pub cdn: Option<String>,
    /// Name resolved through a [`FileLocator`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Extra stylesheet for fonts (e.g. a hosted `@font-face` sheet).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet_cdn: Option<String>,
}

impl AssetDescriptor {
    /// An asset at a fixed URL.
    pub fn url(kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            cdn: Some(url.into()),
            filename: None,
            stylesheet_cdn: None,
        }
    }

    /// An asset found through a locator.
    pub fn file(kind: AssetKind, filename: impl Into<String>) -> Self {
        Self {
            kind,
            cdn: None,
            filename: Some(filename.into()),
            stylesheet_cdn: None,
        }
    }

    /// Classifies `path` by extension and joins it onto `base_uri`.
    ///
    /// Returns `None` for unknown extensions.
    pub fn from_path(base_uri: &str, path: &str) -> Option<Self> {
        let extension = Path::new(path).extension()?.to_str()?;
        let kind = AssetKind::from_extension(extension)?;
        let url = if base_uri.is_empty() || path.starts_with("http") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                base_uri.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Some(Self::url(kind, url))
    }
}

/// What a call to [`AssetBinder::bind`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Elements appended (link, script, preload script).
    pub appended: usize,
    /// Descriptors skipped because their location could not be resolved.
    pub dropped: usize,
    /// Unique image URLs in the preload script, first-seen order.
    pub preloaded: Vec<String>,
}

/// Appends asset elements to a tree.
pub struct AssetBinder<'a> {
    locator: Option<&'a dyn FileLocator>,
}

impl<'a> AssetBinder<'a> {
    /// A binder that resolves `filename` descriptors through `locator`.
    pub fn new(locator: Option<&'a dyn FileLocator>) -> Self {
        Self { locator }
    }

    fn resolve(&self, asset: &AssetDescriptor) -> Option<String> {
        if let Some(cdn) = asset.cdn.as_deref().filter(|c| !c.is_empty()) {
            return Some(cdn.to_string());
        }
        let filename = asset.filename.as_deref().filter(|f| !f.is_empty())?;
        let Some(locator) = self.locator else {
            tracing::warn!("No locator configured to resolve asset '{}'", filename);
            return None;
        };
        match locator.find_file(filename, Some(asset.kind.directory()), asset.kind.extension()) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!("Asset '{}' could not be resolved: {}", filename, e);
                None
            }
        }
    }

    /// Binds every descriptor into `tree`.
    pub fn bind(&self, tree: &mut DomTree, assets: &[AssetDescriptor]) -> BindReport {
        let mut report = BindReport::default();
        for asset in assets {
            let Some(location) = self.resolve(asset) else {
                tracing::warn!("Dropping {:?} asset with no resolvable location", asset.kind);
                report.dropped += 1;
                continue;
            };
            match asset.kind {
                AssetKind::Stylesheet => {
                    let link = tree.create_element("link", &[("rel", "stylesheet"), ("href", location.as_str())]);
                    let head = tree.head_or_root();
                    report.appended += append(tree, head, link);
                }
                AssetKind::Script => {
                    let script = tree.create_element("script", &[("src", location.as_str()), ("defer", "defer")]);
                    let body = body_or_head(tree);
                    report.appended += append(tree, body, script);
                }
                AssetKind::Font => {
                    let preload = tree.create_element(
                        "link",
                        &[
                            ("rel", "preload"),
                            ("href", location.as_str()),
                            ("as", "font"),
                            ("crossorigin", "anonymous"),
                        ],
                    );
                    let head = tree.head_or_root();
                    report.appended += append(tree, head, preload);
                    if let Some(sheet) = asset.stylesheet_cdn.as_deref().filter(|s| !s.is_empty()) {
                        let link = tree.create_element("link", &[("rel", "stylesheet"), ("href", sheet)]);
                        report.appended += append(tree, head, link);
                    }
                }
                AssetKind::Image => {
                    if !report.preloaded.contains(&location) {
                        report.preloaded.push(location);
                    }
                }
            }
        }

        if !report.preloaded.is_empty() {
            let script = tree.create_element("script", &[]);
            let text = tree.create_text(&preload_script(&report.preloaded));
            if tree.append_child(script, text).is_ok() {
                let body = body_or_head(tree);
                report.appended += append(tree, body, script);
            }
        }
        report
    }
}

fn body_or_head(tree: &DomTree) -> NodeId {
    tree.body()
        .or_else(|| tree.head())
        .unwrap_or_else(|| tree.body_or_root())
}

fn append(tree: &mut DomTree, parent: NodeId, child: NodeId) -> usize {
    match tree.append_child(parent, child) {
        Ok(()) => 1,
        Err(e) => {
            tracing::warn!("Could not append asset element: {}", e);
            0
        }
    }
}

fn preload_script(urls: &[String]) -> String {
    let list = serde_json::to_string(urls)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");
    format!(
        "(function() {{\n    var imagesToPreload = {};\n    imagesToPreload.forEach(function(url) {{\n        var img = new Image();\n        img.src = url;\n    }});\n}})();",
        list
    )
}

/// Lists the assets a document already references.
///
/// Stylesheet and font links, `script[src]` and `img[src]`, in document order.
pub fn discover(tree: &DomTree) -> Vec<AssetDescriptor> {
    let mut found = Vec::new();
    tree.traverse(tree.root(), |tree, node| {
        let NodeKind::Element(element) = tree.kind(node) else {
            return;
        };
        let attr = |name: &str| element.attribute(name).map(str::to_string);
        let asset = match element.name.as_str() {
            "link" => {
                let rel = element.attribute("rel").unwrap_or_default();
                if rel.split_whitespace().any(|r| r == "stylesheet") {
                    attr("href").map(|href| AssetDescriptor::url(AssetKind::Stylesheet, href))
                } else if rel == "preload" && element.attribute("as") == Some("font") {
                    attr("href").map(|href| AssetDescriptor::url(AssetKind::Font, href))
                } else {
                    None
                }
            }
            "script" => attr("src").map(|src| AssetDescriptor::url(AssetKind::Script, src)),
            "img" => attr("src").map(|src| AssetDescriptor::url(AssetKind::Image, src)),
            _ => None,
        };
        found.extend(asset);
    });
    found
}
