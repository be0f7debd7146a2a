// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Mutable document trees with XPath and CSS queries.
//!
//! A [`DomTree`] owns every node in an arena addressed by [`NodeId`]. Nodes
//! created with [`DomTree::create_element`] or imported from another tree are
//! detached until they are appended somewhere.
//!
//! Every structural or attribute mutation rebuilds the query index before
//! returning, so a query issued right after a mutation always sees it.
//!
//! ```rust
//! use httpstack::dom::DomTree;
//!
//! let mut tree = DomTree::parse("<ul id=\"menu\"><li>Home</li></ul>").unwrap();
//! let menu = tree.select_one("#menu").unwrap().unwrap();
//! let item = tree.create_element("li", &[("class", "active")]);
//! tree.set_text(item, "Blog").unwrap();
//! tree.append_child(menu, item).unwrap();
//!
//! assert_eq!(tree.select("ul > li").unwrap().len(), 2);
//! assert_eq!(tree.select(".active").unwrap(), vec![item]);
//! ```

mod index;
pub mod parser;
pub mod selector;
mod serialize;

pub use selector::{css_to_xpath, XPath};

use crate::error::{Error, Result};
use index::QueryIndex;
use std::fmt;
use std::path::Path;

/// Handle to a node inside one [`DomTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Parsing and serialization rules of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentMode {
    /// Lenient HTML: void elements, raw-text elements, implied end tags,
    /// case-insensitive names.
    Html,
    /// Well-formed XML: case-sensitive names, `<x/>` for empty elements.
    Xml,
}

/// An element's name and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name (lower-cased in HTML mode).
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
}

impl Element {
    /// Returns an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// True if the whitespace-separated `class` list contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// `<!DOCTYPE ...>`; holds the text between `<!` and `>`.
    Doctype(String),
    /// `<?...?>`; holds the text between the markers.
    ProcessingInstruction(String),
    /// An element.
    Element(Element),
    /// Character data (entities already decoded).
    Text(String),
    /// A comment body.
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// How [`DomTree::get`] interprets its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Value of an `id` attribute.
    Id,
    /// One class name.
    Class,
    /// A tag name.
    Tag,
    /// An XPath expression.
    XPath,
    /// A CSS selector.
    Css,
}

/// Owned copy of a subtree, used to move nodes between (or within) trees.
struct Detached {
    kind: NodeKind,
    children: Vec<Detached>,
}

/// A mutable document.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    mode: DocumentMode,
    index: QueryIndex,
}

impl DomTree {
    pub(crate) fn empty(mode: DocumentMode) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            mode,
            index: QueryIndex::default(),
        }
    }

    /// Parses HTML text, or reads and parses the file at `input`.
    ///
    /// Input containing `<` is treated as markup. Anything else must name an
    /// existing file; otherwise this fails with [`Error::Parse`].
    pub fn parse(input: &str) -> Result<Self> {
        if input.contains('<') {
            return Self::parse_html(input);
        }
        let path = Path::new(input.trim());
        if path.is_file() {
            return Self::from_file(path);
        }
        Err(Error::Parse {
            message: format!("'{}' is neither markup nor an existing file", input),
            line: 0,
            column: 0,
            file: Some(input.to_string()),
            source_context: None,
        })
    }

    /// Parses HTML text.
    pub fn parse_html(source: &str) -> Result<Self> {
        parser::parse(source, DocumentMode::Html)
    }

    /// Parses XML text.
    pub fn parse_xml(source: &str) -> Result<Self> {
        parser::parse(source, DocumentMode::Xml)
    }

    /// Reads and parses an HTML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Self::parse_html(&source).map_err(|e| e.in_file(&path.display().to_string()))
    }

    /// Replaces the whole document with `source`, keeping the current mode.
    pub fn reload(&mut self, source: &str) -> Result<()> {
        *self = parser::parse(source, self.mode)?;
        Ok(())
    }

    /// The tree's parsing mode.
    pub fn mode(&self) -> DocumentMode {
        self.mode
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    /// The first `<head>` element.
    pub fn head(&self) -> Option<NodeId> {
        self.first_by_tag("head")
    }

    /// The first `<body>` element.
    pub fn body(&self) -> Option<NodeId> {
        self.first_by_tag("body")
    }

    /// Where appended content should go: `<body>`, else the document element,
    /// else the document node.
    pub fn body_or_root(&self) -> NodeId {
        self.body()
            .or_else(|| self.document_element())
            .unwrap_or(self.root)
    }

    /// Where head content should go: `<head>`, else [`body_or_root`](Self::body_or_root).
    pub fn head_or_root(&self) -> NodeId {
        self.head().unwrap_or_else(|| self.body_or_root())
    }

    /// The node's kind.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// The element data, if `id` is an element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// The tag name, if `id` is an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// An attribute value, if `id` is an element carrying it.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    /// Child nodes in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Child elements in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// The parent node, or `None` for the root and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.traverse(id, |tree, node| {
            if let NodeKind::Text(t) = tree.kind(node) {
                out.push_str(t);
            }
        });
        out
    }

    /// True if `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True if `id` is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.index.position(id).is_some()
    }

    /// The element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.index.by_id(id)
    }

    /// The first attached element named `tag`.
    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.index.by_tag(&self.normalize_name(tag)).first().copied()
    }

    /// Stylesheets, fonts, scripts and images the document references.
    pub fn doc_assets(&self) -> Vec<crate::assets::AssetDescriptor> {
        crate::assets::discover(self)
    }

    /// Counter bumped on every index rebuild.
    pub fn index_generation(&self) -> u64 {
        self.index.generation()
    }

    pub(crate) fn index(&self) -> &QueryIndex {
        &self.index
    }

    pub(crate) fn normalize_name(&self, name: &str) -> String {
        match self.mode {
            DocumentMode::Html => name.to_ascii_lowercase(),
            DocumentMode::Xml => name.to_string(),
        }
    }

    fn reindex(&mut self) {
        let generation = self.index.generation() + 1;
        let index = QueryIndex::build(self, generation);
        self.index = index;
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::Dom(format!("node {} does not belong to this tree", id.0)))
        }
    }

    // ---- queries ---------------------------------------------------------

    /// Evaluates an XPath expression against the document.
    pub fn query(&self, xpath: &str) -> Result<Vec<NodeId>> {
        self.query_from(xpath, self.root)
    }

    /// Evaluates an XPath expression relative to `context`.
    pub fn query_from(&self, xpath: &str, context: NodeId) -> Result<Vec<NodeId>> {
        self.check(context)?;
        Ok(XPath::parse(xpath)?.evaluate(self, context))
    }

    /// First XPath match in document order.
    pub fn query_one(&self, xpath: &str) -> Result<Option<NodeId>> {
        Ok(self.query(xpath)?.into_iter().next())
    }

    /// Evaluates a CSS selector against the document.
    pub fn select(&self, css: &str) -> Result<Vec<NodeId>> {
        self.query(&css_to_xpath(css)?)
    }

    /// First CSS match in document order.
    pub fn select_one(&self, css: &str) -> Result<Option<NodeId>> {
        Ok(self.select(css)?.into_iter().next())
    }

    /// Looks nodes up by id, class, tag, XPath or CSS.
    pub fn get(&self, expr: &str, kind: QueryKind) -> Result<Vec<NodeId>> {
        match kind {
            QueryKind::Id => Ok(self.query(&format!("//*[@id='{}']", expr))?),
            QueryKind::Class => Ok(self.query(&format!(
                "//*[contains(concat(' ', normalize-space(@class), ' '), ' {} ')]",
                expr
            ))?),
            QueryKind::Tag => self.query(&format!("//{}", expr)),
            QueryKind::XPath => self.query(expr),
            QueryKind::Css => self.select(expr),
        }
    }

    // ---- construction ----------------------------------------------------

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let name = self.normalize_name(tag);
        let attributes = attributes
            .iter()
            .map(|(k, v)| (self.normalize_name(k), v.to_string()))
            .collect();
        self.push_node(NodeKind::Element(Element { name, attributes }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    /// Creates a detached comment.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Comment(text.to_string()))
    }

    fn detach_copy(&self, id: NodeId, keep: &dyn Fn(&DomTree, NodeId) -> bool) -> Option<Detached> {
        if !keep(self, id) {
            return None;
        }
        Some(Detached {
            kind: self.nodes[id.0].kind.clone(),
            children: self.nodes[id.0]
                .children
                .iter()
                .filter_map(|&c| self.detach_copy(c, keep))
                .collect(),
        })
    }

    fn insert_detached(&mut self, detached: Detached) -> NodeId {
        let id = self.push_node(detached.kind);
        for child in detached.children {
            let child_id = self.insert_detached(child);
            self.nodes[child_id.0].parent = Some(id);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Deep-copies `node` into a new detached node.
    pub fn clone_node(&mut self, node: NodeId) -> Result<NodeId> {
        self.check(node)?;
        let copy = self
            .detach_copy(node, &|_, _| true)
            .ok_or_else(|| Error::Dom("nothing to clone".into()))?;
        Ok(self.insert_detached(copy))
    }

    /// Deep-copies a node from another tree into this one, detached.
    pub fn import_node(&mut self, source: &DomTree, node: NodeId) -> Result<NodeId> {
        self.import_node_filtered(source, node, &|_, _| true)?
            .ok_or_else(|| Error::Dom("nothing to import".into()))
    }

    /// Like [`import_node`](Self::import_node), skipping every source node
    /// (and its subtree) for which `keep` returns false.
    pub fn import_node_filtered(
        &mut self,
        source: &DomTree,
        node: NodeId,
        keep: &dyn Fn(&DomTree, NodeId) -> bool,
    ) -> Result<Option<NodeId>> {
        source.check(node)?;
        if matches!(source.kind(node), NodeKind::Document) {
            return Err(Error::Dom("a document node cannot be imported".into()));
        }
        let copied = source
            .detach_copy(node, keep)
            .map(|d| self.insert_detached(d));
        self.reindex();
        Ok(copied)
    }

    /// Parses `html` as a fragment and appends its top-level nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        let fragment = parser::parse(html, self.mode)?;
        let mut appended = Vec::new();
        for &child in fragment.children(fragment.root) {
            if let Some(copy) = fragment.detach_copy(child, &|_, _| true) {
                let id = self.insert_detached(copy);
                self.attach(parent, id)?;
                appended.push(id);
            }
        }
        self.reindex();
        Ok(appended)
    }

    // ---- structure -------------------------------------------------------

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn validate_insert(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        if !matches!(self.kind(parent), NodeKind::Document | NodeKind::Element(_)) {
            return Err(Error::Dom("only documents and elements can have children".into()));
        }
        if matches!(self.kind(child), NodeKind::Document) {
            return Err(Error::Dom("a document node cannot be inserted".into()));
        }
        if self.contains(child, parent) {
            return Err(Error::Dom("a node cannot be inserted into itself".into()));
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.validate_insert(parent, child)?;
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Appends `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.attach(parent, child)?;
        self.reindex();
        Ok(())
    }

    /// Inserts `node` immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        self.check(reference)?;
        if node == reference {
            return Ok(());
        }
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::Dom("reference node has no parent".into()))?;
        self.validate_insert(parent, node)?;
        self.detach(node);
        let at = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference)
            .ok_or_else(|| Error::Dom("reference node missing from its parent".into()))?;
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(at, node);
        self.reindex();
        Ok(())
    }

    /// Puts `new` where `old` is and detaches `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        self.insert_before(old, new)?;
        self.detach(old);
        self.reindex();
        Ok(())
    }

    /// Detaches `node` from its parent.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.check(node)?;
        if node == self.root {
            return Err(Error::Dom("the document node cannot be removed".into()));
        }
        self.detach(node);
        self.reindex();
        Ok(())
    }

    /// Sets (or replaces) an attribute.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.check(node)?;
        let name = self.normalize_name(name);
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(e) => {
                match e.attributes.iter_mut().find(|(k, _)| *k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => e.attributes.push((name, value.to_string())),
                }
            }
            _ => return Err(Error::Dom("attributes can only be set on elements".into())),
        }
        self.reindex();
        Ok(())
    }

    /// Removes an attribute; returns whether it was present.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<bool> {
        self.check(node)?;
        let name = self.normalize_name(name);
        let removed = match &mut self.nodes[node.0].kind {
            NodeKind::Element(e) => {
                let before = e.attributes.len();
                e.attributes.retain(|(k, _)| *k != name);
                before != e.attributes.len()
            }
            _ => false,
        };
        self.reindex();
        Ok(removed)
    }

    fn clear_children(&mut self, node: NodeId) {
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    /// Replaces all children of `node` with one text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.check(node)?;
        if let NodeKind::Text(t) = &mut self.nodes[node.0].kind {
            *t = text.to_string();
            self.reindex();
            return Ok(());
        }
        self.clear_children(node);
        let text = self.create_text(text);
        self.append_child(node, text)
    }

    /// Replaces all children of `node` with the parsed `html` fragment.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        self.check(node)?;
        self.clear_children(node);
        self.append_html(node, html)?;
        Ok(())
    }

    // ---- query-driven helpers -------------------------------------------

    /// Creates an element under the first match of `parent_query`.
    ///
    /// `content` is parsed as markup and becomes the element's children.
    /// Returns `None` when nothing matches.
    pub fn create(
        &mut self,
        parent_query: &str,
        tag: &str,
        attributes: &[(&str, &str)],
        content: Option<&str>,
    ) -> Result<Option<NodeId>> {
        let Some(parent) = self.query_one(parent_query)? else {
            return Ok(None);
        };
        let element = self.create_element(tag, attributes);
        if let Some(content) = content {
            self.append_html(element, content)?;
        }
        self.append_child(parent, element)?;
        Ok(Some(element))
    }

    /// Calls `f` on every match of `query`; returns the number of matches.
    pub fn update<F>(&mut self, query: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&mut DomTree, NodeId) -> Result<()>,
    {
        let matches = self.query(query)?;
        for &node in &matches {
            f(self, node)?;
        }
        self.reindex();
        Ok(matches.len())
    }

    /// Removes every match of `query`; returns how many were removed.
    pub fn delete(&mut self, query: &str) -> Result<usize> {
        let matches = self.query(query)?;
        for &node in &matches {
            self.detach(node);
        }
        self.reindex();
        Ok(matches.len())
    }

    /// Appends a copy of every node in `nodes` to every match of `query`.
    pub fn append_multiple(&mut self, query: &str, nodes: &[NodeId]) -> Result<usize> {
        let targets = self.query(query)?;
        for &target in &targets {
            for &node in nodes {
                let copy = self.clone_node(node)?;
                self.attach(target, copy)?;
            }
        }
        self.reindex();
        Ok(targets.len())
    }

    /// Replaces the first match of `query` with `node`.
    pub fn replace_first(&mut self, query: &str, node: NodeId) -> Result<bool> {
        match self.query_one(query)? {
            Some(old) => {
                self.replace(old, node)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Visits `from` and its descendants in document order.
    pub fn traverse<F>(&self, from: NodeId, mut f: F)
    where
        F: FnMut(&DomTree, NodeId),
    {
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            f(self, node);
            stack.extend(self.children(node).iter().rev().copied());
        }
    }

    // ---- serialization ---------------------------------------------------

    /// Serializes the whole document.
    pub fn to_html(&self) -> String {
        self.outer_html(self.root)
    }

    /// Serializes `node` including its own tags.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, node, &mut out);
        out
    }

    /// Serializes the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            serialize::write_node(self, child, &mut out);
        }
        out
    }
}

impl fmt::Display for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}
