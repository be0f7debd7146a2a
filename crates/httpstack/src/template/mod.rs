// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page templates built from a base document and an optional child view.
//!
//! A [`Template`] owns a [`DomTree`] plus the data and functions used to
//! fill its `{{ ... }}` placeholders (see [`render`] for the syntax). A page
//! is usually composed in three steps:
//!
//! 1. parse the base layout
//! 2. [`load_view`](Template::load_view) a page fragment and bind its data
//! 3. [`merge_view`](Template::merge_view) it into the element marked
//!    `data-key="view"`, then [`render`](Template::render)
//!
//! Merging copies the view's body content into the slot. The view's external
//! scripts are moved to the end of the base body and its stylesheets to the
//! base head. View data and functions are merged into the base; on a key
//! conflict the view wins.
//!
//! ```rust
//! use httpstack::Template;
//! use serde_json::json;
//!
//! let mut page = Template::parse(
//!     "<html><head><title>{{ title }}</title></head><body><main data-key=\"view\"></main></body></html>",
//! ).unwrap();
//! page.bind_data(json!({"title": "Home"})).unwrap();
//!
//! let view = page.load_view("<body><h1>Hello {{ name }}</h1></body>").unwrap();
//! view.set("name", "Ada");
//!
//! page.merge_view().unwrap();
//! let html = page.render().unwrap();
//! assert!(html.contains("<title>Home</title>"));
//! assert!(html.contains("<main data-key=\"view\"><h1>Hello Ada</h1></main>"));
//! ```

pub mod render;

use crate::assets::{AssetBinder, AssetDescriptor, BindReport};
use crate::dom::{DomTree, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::locator::FileLocator;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A template function: receives the call's arguments, returns markup.
pub type TemplateFn = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

/// Slot a view is merged into by default.
pub const DEFAULT_VIEW_SLOT: &str = "//*[@data-key='view']";

/// A document with bindings, functions and an optional child view.
pub struct Template {
    dom: DomTree,
    data: Map<String, Value>,
    functions: HashMap<String, TemplateFn>,
    assets_path: Option<String>,
    view: Option<Box<Template>>,
    pending_assets: Vec<AssetDescriptor>,
    locator: Option<Arc<dyn FileLocator>>,
    slot: String,
}

impl Template {
    /// Wraps an existing tree.
    pub fn from_tree(dom: DomTree) -> Self {
        Self {
            dom,
            data: Map::new(),
            functions: HashMap::new(),
            assets_path: None,
            view: None,
            pending_assets: Vec::new(),
            locator: None,
            slot: DEFAULT_VIEW_SLOT.to_string(),
        }
    }

    /// Parses markup or reads a file, as [`DomTree::parse`] does.
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self::from_tree(DomTree::parse(source)?))
    }

    /// Sets the locator used for views and `filename` assets.
    pub fn with_locator(mut self, locator: Arc<dyn FileLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Sets the locator used for views and `filename` assets.
    pub fn set_locator(&mut self, locator: Arc<dyn FileLocator>) {
        self.locator = Some(locator);
    }

    /// Changes the XPath of the element views are merged into.
    pub fn set_view_slot(&mut self, xpath: impl Into<String>) {
        self.slot = xpath.into();
    }

    /// The underlying tree.
    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    /// The underlying tree, mutably.
    pub fn dom_mut(&mut self) -> &mut DomTree {
        &mut self.dom
    }

    // ---- data ------------------------------------------------------------

    /// Merges a JSON object into the bindings; later keys replace earlier ones.
    pub fn bind_data(&mut self, data: Value) -> Result<()> {
        match data {
            Value::Object(map) => {
                self.data.extend(map);
                Ok(())
            }
            other => Err(Error::MalformedPayload(format!(
                "template data must be an object, got {}",
                other
            ))),
        }
    }

    /// Sets one binding.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Reads a binding; dotted paths reach into objects and arrays.
    pub fn get(&self, path: &str) -> Option<&Value> {
        render::lookup(&self.data, path)
    }

    /// Removes a top-level binding.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// All bindings.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Registers a function callable as `{{ name(args) }}`.
    pub fn add_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[String]) -> String + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    /// Calls a registered function directly.
    pub fn call_function(&self, name: &str, args: &[String]) -> Option<String> {
        self.functions.get(name).map(|f| f(args))
    }

    // ---- assets ----------------------------------------------------------

    /// Prefix applied to relative asset URLs moved in from a view.
    pub fn set_assets_path(&mut self, path: &str) {
        self.assets_path = Some(format!("{}/", path.trim_end_matches('/')));
    }

    /// Prefixes `src` with the assets path unless it is absolute.
    pub fn full_asset(&self, src: &str) -> String {
        full_asset(self.assets_path.as_deref(), src)
    }

    /// Queues assets to be bound at the next [`render`](Self::render).
    pub fn queue_assets<I>(&mut self, assets: I)
    where
        I: IntoIterator<Item = AssetDescriptor>,
    {
        self.pending_assets.extend(assets);
    }

    /// Assets queued and not yet bound.
    pub fn pending_assets(&self) -> &[AssetDescriptor] {
        &self.pending_assets
    }

    /// Binds assets into the document now.
    ///
    /// `filename` descriptors resolve through `locator`, or through the
    /// template's own locator when `None` is given.
    pub fn bind_assets(
        &mut self,
        assets: &[AssetDescriptor],
        locator: Option<&dyn FileLocator>,
    ) -> BindReport {
        let locator = locator.or(self.locator.as_deref());
        AssetBinder::new(locator).bind(&mut self.dom, assets)
    }

    /// Binds a list of paths relative to `base_uri`, classified by extension.
    ///
    /// Paths with unknown extensions are skipped.
    pub fn bind_asset_paths(&mut self, base_uri: &str, paths: &[String]) -> BindReport {
        let assets: Vec<AssetDescriptor> = paths
            .iter()
            .filter_map(|p| {
                let asset = AssetDescriptor::from_path(base_uri, p);
                if asset.is_none() {
                    tracing::debug!("Skipping asset '{}' with unknown extension", p);
                }
                asset
            })
            .collect();
        self.bind_assets(&assets, None)
    }

    /// Sets the document title, creating `<title>` in the head if needed.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let node = match self.dom.first_by_tag("title") {
            Some(node) => node,
            None => {
                let node = self.dom.create_element("title", &[]);
                let head = self.dom.head_or_root();
                self.dom.append_child(head, node)?;
                node
            }
        };
        self.dom.set_text(node, title)
    }

    // ---- views -----------------------------------------------------------

    /// Loads a child view from markup, a file path, or a name the locator
    /// resolves with extension `html`.
    ///
    /// The view inherits the locator and assets path. A previously loaded
    /// view is replaced. Fails with [`Error::NotFound`] if nothing resolves.
    pub fn load_view(&mut self, source: &str) -> Result<&mut Template> {
        let dom = if source.contains('<') || Path::new(source.trim()).is_file() {
            DomTree::parse(source)?
        } else if let Some(locator) = &self.locator {
            let path = locator.find_file(source, None, "html")?;
            DomTree::from_file(&path).map_err(|e| match e {
                Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    Error::NotFound(format!("view '{}' at {}", source, path))
                }
                other => other,
            })?
        } else {
            return Err(Error::NotFound(format!("view '{}'", source)));
        };

        let mut view = Template::from_tree(dom);
        view.locator = self.locator.clone();
        view.assets_path = self.assets_path.clone();
        tracing::debug!("Loaded view '{}'", truncate(source));
        Ok(&mut **self.view.insert(Box::new(view)))
    }

    /// The loaded view, if any.
    pub fn view(&self) -> Option<&Template> {
        self.view.as_deref()
    }

    /// The loaded view, mutably.
    pub fn view_mut(&mut self) -> Option<&mut Template> {
        self.view.as_deref_mut()
    }

    /// Copies view node `src` into base node `dest`.
    ///
    /// When `src` is the view's document, `<html>` or `<body>`, its children
    /// are copied (skipping `<head>`); otherwise `src` itself is. External
    /// scripts and stylesheets are not copied into `dest`: they are appended
    /// to the base body and head instead, with the assets path applied. View
    /// data and functions are then merged into this template.
    pub fn import_view(&mut self, src: NodeId, dest: NodeId) -> Result<()> {
        let view = self
            .view
            .as_deref()
            .ok_or_else(|| Error::NotFound("no view loaded".into()))?;
        if !self.dom.is_attached(dest) {
            return Err(Error::NotFound(format!("destination node {:?}", dest)));
        }

        let container = matches!(view.dom.kind(src), NodeKind::Document)
            || matches!(view.dom.tag_name(src), Some("html" | "body"));
        let sources: Vec<NodeId> = if container {
            view.dom
                .children(src)
                .iter()
                .copied()
                .filter(|&n| {
                    !matches!(view.dom.kind(n), NodeKind::Doctype(_))
                        && view.dom.tag_name(n) != Some("head")
                })
                .collect()
        } else {
            vec![src]
        };

        for node in sources {
            if let Some(copy) = self
                .dom
                .import_node_filtered(&view.dom, node, &|tree, n| !is_external_asset(tree, n))?
            {
                self.dom.append_child(dest, copy)?;
            }
        }

        transfer_assets(&mut self.dom, &view.dom, self.assets_path.as_deref())?;

        for (key, value) in &view.data {
            self.data.insert(key.clone(), value.clone());
        }
        for (name, function) in &view.functions {
            self.functions.insert(name.clone(), Arc::clone(function));
        }
        Ok(())
    }

    /// Imports the view's body into the base slot (`data-key="view"` by default).
    ///
    /// Fails with [`Error::NotFound`] when no view is loaded or the base has
    /// no slot.
    pub fn merge_view(&mut self) -> Result<()> {
        let view = self
            .view
            .as_deref()
            .ok_or_else(|| Error::NotFound("no view loaded".into()))?;
        let src = view.body_container();
        let dest = self
            .dom
            .query_one(&self.slot)?
            .ok_or_else(|| Error::NotFound(format!("view slot {}", self.slot)))?;
        self.import_view(src, dest)
    }

    fn body_container(&self) -> NodeId {
        self.dom
            .body()
            .or_else(|| {
                self.dom
                    .document_element()
                    .filter(|&e| self.dom.tag_name(e) == Some("html"))
            })
            .unwrap_or_else(|| self.dom.root())
    }

    // ---- output ----------------------------------------------------------

    /// Binds queued assets, substitutes placeholders, reparses and returns
    /// the final markup.
    ///
    /// Rendering an already rendered template yields the same output.
    pub fn render(&mut self) -> Result<String> {
        if !self.pending_assets.is_empty() {
            let pending = std::mem::take(&mut self.pending_assets);
            self.bind_assets(&pending, None);
        }

        let html = self.dom.to_html();
        let html = render::apply_functions(&html, &self.functions);
        let html = render::apply_values(&html, &self.data);
        let html = render::apply_conditionals(&html, &self.data);
        let html = render::apply_loops(&html, &self.data);

        self.dom.reload(&html)?;
        Ok(self.dom.to_html())
    }

    /// Serializes the document without substituting anything.
    pub fn to_html(&self) -> String {
        self.dom.to_html()
    }
}

fn truncate(source: &str) -> &str {
    match source.char_indices().nth(60) {
        Some((i, _)) => &source[..i],
        None => source,
    }
}

fn full_asset(assets_path: Option<&str>, src: &str) -> String {
    match assets_path {
        Some(prefix) if !src.starts_with("http") && !src.starts_with("//") => {
            format!("{}{}", prefix, src.trim_start_matches('/'))
        }
        _ => src.to_string(),
    }
}

fn is_external_asset(tree: &DomTree, node: NodeId) -> bool {
    match tree.tag_name(node) {
        Some("script") => tree.attribute(node, "src").is_some(),
        Some("link") => tree
            .attribute(node, "rel")
            .map(|r| r.split_whitespace().any(|r| r == "stylesheet"))
            .unwrap_or(false),
        _ => false,
    }
}

fn transfer_assets(base: &mut DomTree, view: &DomTree, assets_path: Option<&str>) -> Result<()> {
    for script in view.query("//script[@src]")? {
        let src = full_asset(assets_path, view.attribute(script, "src").unwrap_or_default());
        let element = base.create_element("script", &[("src", src.as_str())]);
        if let Some(defer) = view.attribute(script, "defer") {
            base.set_attribute(element, "defer", defer)?;
        }
        let body = base.body_or_root();
        base.append_child(body, element)?;
    }
    for link in view.query("//link[@href]")? {
        if !is_external_asset(view, link) {
            continue;
        }
        let href = full_asset(assets_path, view.attribute(link, "href").unwrap_or_default());
        let element = base.create_element("link", &[("rel", "stylesheet"), ("href", href.as_str())]);
        let head = base.head_or_root();
        base.append_child(head, element)?;
    }
    Ok(())
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Template")
            .field("data", &self.data)
            .field("functions", &functions)
            .field("assets_path", &self.assets_path)
            .field("has_view", &self.view.is_some())
            .field("pending_assets", &self.pending_assets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;
    use crate::locator::MemoryLocator;
    use serde_json::json;

    const BASE: &str = "<!DOCTYPE html><html><head><title>Base</title></head><body><nav></nav><div data-key=\"view\"></div><footer></footer></body></html>";

    #[test]
    fn test_render_pipeline_order() {
        let mut t = Template::parse(
            "<ul>{{ foreach items as i }}<li>{{ i }}</li>{{ endforeach }}</ul>{{ if show }}<p>{{ upper(x) }}</p>{{ endif }}",
        )
        .unwrap();
        t.bind_data(json!({"items": [1, 2], "show": "yes"})).unwrap();
        t.add_function("upper", |args| args.join("").to_uppercase());
        assert_eq!(t.render().unwrap(), "<ul><li>1</li><li>2</li></ul><p>X</p>");
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut t = Template::parse("<p title=\"{{ who }}\">{{ who }} &amp; {{ missing }}</p>").unwrap();
        t.set("who", "Tom & \"Jerry\"");
        let first = t.render().unwrap();
        let second = t.render().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("title=\"Tom &amp; &quot;Jerry&quot;\""));
        assert!(first.contains("{{ missing }}"));
    }

    #[test]
    fn test_zero_string_is_falsy() {
        let mut t = Template::parse("<p>{{ if count }}has{{ endif }}</p>").unwrap();
        t.set("count", "0");
        assert_eq!(t.render().unwrap(), "<p></p>");
    }

    #[test]
    fn test_merge_requires_view_and_slot() {
        let mut t = Template::parse("<body><p>no slot</p></body>").unwrap();
        assert!(t.merge_view().unwrap_err().is_not_found());
        t.load_view("<body><script src=\"a.js\"></script></body>").unwrap();
        assert!(t.merge_view().unwrap_err().is_not_found());
    }

    #[test]
    fn test_merge_moves_external_assets_out_of_slot() {
        let mut t = Template::parse(BASE).unwrap();
        t.set_assets_path("/static/");
        t.load_view(
            "<html><head><link rel=\"stylesheet\" href=\"css/v.css\"></head><body><h1>V</h1><script src=\"a.js\"></script><script>inline()</script></body></html>",
        )
        .unwrap();
        t.merge_view().unwrap();

        let dom = t.dom();
        let slot = dom.query_one("//div[@data-key='view']").unwrap().unwrap();
        assert_eq!(dom.inner_html(slot), "<h1>V</h1><script>inline()</script>");
        let script = dom.query_one("//script[@src]").unwrap().unwrap();
        assert_eq!(dom.parent(script), dom.body());
        assert_eq!(dom.attribute(script, "src"), Some("/static/a.js"));
        assert_eq!(
            dom.query("/html/head/link[@href='/static/css/v.css']").unwrap().len(),
            1
        );
        assert!(dom.query("//head/title").unwrap().len() == 1);
    }

    #[test]
    fn test_view_bindings_win_on_merge() {
        let mut t = Template::parse(BASE).unwrap();
        t.bind_data(json!({"title": "base", "site": "S"})).unwrap();
        let view = t.load_view("<p>{{ title }} {{ site }}</p>").unwrap();
        view.bind_data(json!({"title": "view"})).unwrap();
        view.add_function("hi", |_| "hello".to_string());
        t.merge_view().unwrap();

        assert_eq!(t.get("title"), Some(&json!("view")));
        assert_eq!(t.call_function("hi", &[]), Some("hello".to_string()));
        assert!(t.render().unwrap().contains("<p>view S</p>"));
    }

    #[test]
    fn test_import_view_into_explicit_node() {
        let mut t = Template::parse(BASE).unwrap();
        t.load_view("<section><b>x</b></section><aside>y</aside>").unwrap();
        let src = t.view().unwrap().dom().query_one("//aside").unwrap().unwrap();
        let nav = t.dom().query_one("//nav").unwrap().unwrap();
        t.import_view(src, nav).unwrap();
        assert_eq!(t.dom().inner_html(nav), "<aside>y</aside>");
    }

    #[test]
    fn test_load_view_through_locator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.html");
        std::fs::write(&path, "<p>home</p>").unwrap();
        let locator = MemoryLocator::new().with_file("home.html", path.to_str().unwrap());

        let mut t = Template::parse(BASE).unwrap().with_locator(Arc::new(locator));
        t.load_view("home").unwrap();
        t.merge_view().unwrap();
        assert!(t.to_html().contains("<div data-key=\"view\"><p>home</p></div>"));
        assert!(t.load_view("missing").unwrap_err().is_not_found());

        let mut bare = Template::parse(BASE).unwrap();
        assert!(bare.load_view("home").unwrap_err().is_not_found());
    }

    #[test]
    fn test_load_view_with_vanished_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.html");
        let locator = MemoryLocator::new().with_file("gone.html", gone.to_str().unwrap());

        let mut t = Template::parse(BASE).unwrap().with_locator(Arc::new(locator));
        let err = t.load_view("gone").unwrap_err();
        assert!(err.is_not_found(), "{}", err);
    }

    #[test]
    fn test_queued_assets_bind_once() {
        let mut t = Template::parse(BASE).unwrap();
        t.queue_assets([
            AssetDescriptor::url(AssetKind::Image, "/a.png"),
            AssetDescriptor::url(AssetKind::Image, "/b.png"),
        ]);
        t.render().unwrap();
        let html = t.render().unwrap();
        assert_eq!(html.matches("new Image()").count(), 1);
        assert!(t.pending_assets().is_empty());
    }

    #[test]
    fn test_set_title_and_asset_paths() {
        let mut t = Template::parse("<html><head></head><body></body></html>").unwrap();
        t.set_title("Hello").unwrap();
        t.set_title("Again").unwrap();
        let report = t.bind_asset_paths("/assets", &["app.css".into(), "app.js".into(), "notes.txt".into()]);
        assert_eq!(report.appended, 2);
        let html = t.to_html();
        assert!(html.contains("<title>Again</title>"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/assets/app.css\">"));
        assert!(html.contains("<script src=\"/assets/app.js\" defer=\"defer\"></script>"));
    }

    #[test]
    fn test_full_asset_prefix_rule() {
        let mut t = Template::parse("<p></p>").unwrap();
        assert_eq!(t.full_asset("a.js"), "a.js");
        t.set_assets_path("/static");
        assert_eq!(t.full_asset("a.js"), "/static/a.js");
        assert_eq!(t.full_asset("/a.js"), "/static/a.js");
        assert_eq!(t.full_asset("https://cdn/a.js"), "https://cdn/a.js");
    }
}
