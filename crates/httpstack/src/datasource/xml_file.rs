// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::{guard_writable, payload_object, payload_pair, CacheState, Datasource};
use crate::dom::{DomTree, NodeId};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const EMPTY_DOCUMENT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<data/>\n";

/// A single XML file addressed by XPath.
///
/// Payloads:
///
/// - `create`: `[parent_xpath, {"name": {fields}}]` or `{"parent": …, "data": …}`;
///   appends one element per key under the first match of the parent path
/// - `update`: `[xpath, value]` or `{"target": …, "value": …}`; a scalar
///   replaces the text of the first match, an object replaces its children
/// - `delete`: `xpath`, `[xpath]` or `{"target": …}`; removes every match
/// - `read`: `null` for the whole document as JSON, or an XPath string for a
///   list of matching elements
///
/// Elements convert to JSON the way a generic XML-to-map bridge would: leaf
/// elements become strings, repeated names become arrays, attributes are
/// collected under `"@attributes"`.
#[derive(Debug)]
pub struct XmlFile {
    path: PathBuf,
    read_only: bool,
    cache: CacheState,
}

impl XmlFile {
    /// Opens `path`, creating an empty `<data/>` document when the file is
    /// missing and the source is writable.
    pub fn new(path: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            if read_only {
                return Err(Error::NotFound(format!(
                    "XML file '{}' does not exist",
                    path.display()
                )));
            }
            tracing::debug!("Creating empty XML datasource at {}", path.display());
            fs::write(&path, EMPTY_DOCUMENT)?;
        }
        Ok(Self {
            path,
            read_only,
            cache: CacheState::Invalid,
        })
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cache, for inspection.
    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    fn load(&self) -> Result<DomTree> {
        let source = fs::read_to_string(&self.path)?;
        DomTree::parse_xml(&source).map_err(|e| e.in_file(&self.path.display().to_string()))
    }

    fn save(&mut self, tree: &DomTree) -> Result<()> {
        fs::write(&self.path, tree.to_html())?;
        self.cache.invalidate();
        Ok(())
    }
}

impl Datasource for XmlFile {
    fn create(&mut self, payload: Value) -> Result<Value> {
        guard_writable(self, "create elements")?;
        let (parent_path, data) = payload_pair(payload, "parent", "data")?;
        let data = payload_object(data, "create data")?;
        let mut tree = self.load()?;
        let parent = tree
            .query_one(&parent_path)?
            .ok_or_else(|| Error::NotFound(format!("no parent element matches '{}'", parent_path)))?;

        let mut created = Vec::new();
        for (name, value) in &data {
            append_value(&mut tree, parent, name, value)?;
            created.push(Value::String(name.clone()));
        }
        self.save(&tree)?;
        Ok(Value::Array(created))
    }

    fn read(&mut self, query: &Value) -> Result<Value> {
        match query {
            Value::Null => {
                if let Some(cached) = self.cache.get() {
                    return Ok(cached.clone());
                }
                let tree = self.load()?;
                let value = tree
                    .document_element()
                    .map(|root| element_to_json(&tree, root))
                    .unwrap_or_else(|| Value::Object(Map::new()));
                self.cache = CacheState::Valid(value.clone());
                Ok(value)
            }
            Value::String(xpath) => {
                let tree = self.load()?;
                let matches = tree.query(xpath)?;
                Ok(Value::Array(
                    matches
                        .into_iter()
                        .filter(|&n| tree.element(n).is_some())
                        .map(|n| element_to_json(&tree, n))
                        .collect(),
                ))
            }
            other => Err(Error::MalformedPayload(format!(
                "read query must be null or an XPath string, got {}",
                other
            ))),
        }
    }

    fn update(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "update elements")?;
        let (target, value) = payload_pair(payload, "target", "value")?;
        let mut tree = self.load()?;
        let Some(node) = tree.query_one(&target)? else {
            return Ok(false);
        };
        match &value {
            Value::Object(fields) => {
                tree.set_text(node, "")?;
                for (name, child) in fields {
                    append_value(&mut tree, node, name, child)?;
                }
            }
            Value::Array(_) => {
                return Err(Error::MalformedPayload(
                    "update value must be a scalar or an object".into(),
                ))
            }
            scalar => tree.set_text(node, &scalar_text(scalar))?,
        }
        self.save(&tree)?;
        Ok(true)
    }

    fn delete(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "delete elements")?;
        let (target, _) = payload_pair(payload, "target", "value")?;
        let mut tree = self.load()?;
        if tree.document_element().is_some_and(|root| tree.query(&target).is_ok_and(|m| m.contains(&root))) {
            return Err(Error::MalformedPayload("the document element cannot be deleted".into()));
        }
        let removed = tree.delete(&target)?;
        if removed == 0 {
            return Ok(false);
        }
        self.save(&tree)?;
        Ok(true)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Appends `<name>` built from `value` under `parent`; arrays repeat the name.
fn append_value(tree: &mut DomTree, parent: NodeId, name: &str, value: &Value) -> Result<()> {
    if !is_xml_name(name) {
        return Err(Error::MalformedPayload(format!("'{}' is not a valid element name", name)));
    }
    if let Value::Array(items) = value {
        for item in items {
            append_value(tree, parent, name, item)?;
        }
        return Ok(());
    }
    let element = tree.create_element(name, &[]);
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                if key == "@attributes" {
                    for (attr, v) in child.as_object().into_iter().flatten() {
                        tree.set_attribute(element, attr, &scalar_text(v))?;
                    }
                } else {
                    append_value(tree, element, key, child)?;
                }
            }
        }
        Value::Null => {}
        scalar => {
            let text = tree.create_text(&scalar_text(scalar));
            tree.append_child(element, text)?;
        }
    }
    tree.append_child(parent, element)
}

/// Converts an element into JSON.
fn element_to_json(tree: &DomTree, node: NodeId) -> Value {
    let attributes: Map<String, Value> = tree
        .element(node)
        .map(|e| {
            e.attributes
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect()
        })
        .unwrap_or_default();
    let children = tree.element_children(node);

    if children.is_empty() {
        let text = tree.text_content(node).trim().to_string();
        if attributes.is_empty() {
            return Value::String(text);
        }
        let mut map = Map::new();
        map.insert("@attributes".into(), Value::Object(attributes));
        if !text.is_empty() {
            map.insert("#text".into(), Value::String(text));
        }
        return Value::Object(map);
    }

    let mut map = Map::new();
    if !attributes.is_empty() {
        map.insert("@attributes".into(), Value::Object(attributes));
    }
    for child in children {
        let Some(name) = tree.tag_name(child).map(str::to_string) else {
            continue;
        };
        let value = element_to_json(tree, child);
        match map.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(name, value);
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const PAGES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<site>
  <pages>
    <page id="home"><title>Home</title><slug>/</slug></page>
    <page id="about"><title>About</title><slug>/about</slug></page>
  </pages>
  <contact><title>Contact us</title></contact>
</site>
"#;

    fn seeded() -> (TempDir, XmlFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.xml");
        fs::write(&path, PAGES).unwrap();
        let source = XmlFile::new(&path, false).unwrap();
        (dir, source)
    }

    #[test]
    fn test_read_whole_document_as_json() {
        let (_dir, mut source) = seeded();
        let data = source.read(&Value::Null).unwrap();
        assert_eq!(data["contact"]["title"], "Contact us");
        let pages = data["pages"]["page"].as_array().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1]["@attributes"]["id"], "about");
        assert_eq!(pages[0]["title"], "Home");
        assert!(source.cache().is_valid());
    }

    #[test]
    fn test_read_by_xpath() {
        let (_dir, mut source) = seeded();
        let found = source.read(&json!("//page[@id='about']/title")).unwrap();
        assert_eq!(found, json!(["About"]));
    }

    #[test]
    fn test_create_update_delete_persist() {
        let (dir, mut source) = seeded();
        source.read(&Value::Null).unwrap();

        source
            .create(json!(["//pages", {"page": {"@attributes": {"id": "blog"}, "title": "Blog", "cta": {"href": "/blog"}}}]))
            .unwrap();
        assert!(!source.cache().is_valid());

        assert!(source.update(json!(["//contact/title", "Write to us"])).unwrap());
        assert!(!source.update(json!({"target": "//missing", "value": "x"})).unwrap());

        assert!(source.delete(json!("//page[@id='home']")).unwrap());
        assert!(!source.delete(json!(["//nothing"])).unwrap());

        let mut reopened = XmlFile::new(dir.path().join("site.xml"), true).unwrap();
        let data = reopened.read(&Value::Null).unwrap();
        assert_eq!(data["contact"]["title"], "Write to us");
        let pages = data["pages"]["page"].as_array().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1]["title"], "Blog");
        assert_eq!(pages[1]["cta"]["href"], "/blog");
        assert_eq!(pages[1]["@attributes"]["id"], "blog");
    }

    #[test]
    fn test_create_requires_existing_parent() {
        let (_dir, mut source) = seeded();
        let err = source.create(json!(["//nowhere", {"x": "1"}])).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(source.create(json!(["//pages", {"bad name": "1"}])), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let (dir, mut source) = seeded();
        source.set_read_only(true);
        assert!(matches!(source.create(json!(["//pages", {"page": "x"}])), Err(Error::ReadOnlyViolation(_))));
        assert!(matches!(source.update(json!(["//contact/title", "x"])), Err(Error::ReadOnlyViolation(_))));
        assert!(matches!(source.delete(json!("//contact")), Err(Error::ReadOnlyViolation(_))));
        assert_eq!(fs::read_to_string(dir.path().join("site.xml")).unwrap(), PAGES);
    }

    #[test]
    fn test_missing_file_is_created_when_writable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.xml");
        assert!(XmlFile::new(&path, true).unwrap_err().is_not_found());

        let mut source = XmlFile::new(&path, false).unwrap();
        assert_eq!(source.read(&Value::Null).unwrap(), json!(""));
        source.create(json!(["/data", {"item": "one"}])).unwrap();
        assert_eq!(source.read(&Value::Null).unwrap(), json!({"item": "one"}));
    }
}
