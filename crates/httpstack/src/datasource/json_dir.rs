// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::{guard_writable, payload_pair, CacheState, Datasource};
use crate::error::{Error, Result};
use crate::locator::path_to_string;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// A directory of `*.json` files, one record per file, keyed by file name.
///
/// Payloads:
///
/// - `create`: `["name.json", data]` or `{"name": …, "data": …}`
/// - `update`: same shape; `false` when the file does not exist
/// - `delete`: `"name.json"`, `["name.json"]` or `{"name": …}`
/// - `read`: `null` for all records, a name, or a list of names
///
/// Names without a `.json` extension get one appended.
#[derive(Debug)]
pub struct JsonDirectory {
    dir: PathBuf,
    read_only: bool,
    cache: CacheState,
}

impl JsonDirectory {
    /// Opens an existing directory.
    pub fn new(dir: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "JSON directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            read_only,
            cache: CacheState::Invalid,
        })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cache, for inspection.
    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    fn record_path(&self, name: &str) -> Result<(String, PathBuf)> {
        let name = name.trim();
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(Error::MalformedPayload(format!("invalid record name '{}'", name)));
        }
        let file = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{}.json", name)
        };
        let path = self.dir.join(&file);
        Ok((file, path))
    }

    fn load_all(&mut self) -> Result<&Value> {
        if !self.cache.is_valid() {
            let pattern = path_to_string(self.dir.join("*.json"));
            let mut records = Map::new();
            let mut paths: Vec<PathBuf> = glob::glob(&pattern)
                .map_err(|e| Error::Datasource(e.to_string()))?
                .flatten()
                .filter(|p| p.is_file())
                .collect();
            paths.sort();
            for path in paths {
                let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                let text = fs::read_to_string(&path)?;
                match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        records.insert(name, value);
                    }
                    Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
                }
            }
            tracing::debug!("Loaded {} records from {}", records.len(), self.dir.display());
            self.cache = CacheState::Valid(Value::Object(records));
        }
        self.cache
            .get()
            .ok_or_else(|| Error::Datasource("cache was not populated".into()))
    }

    fn write(&mut self, path: &Path, data: &Value) -> Result<()> {
        let text = serde_json::to_string_pretty(data)?;
        fs::write(path, text)?;
        self.cache.invalidate();
        Ok(())
    }
}

impl Datasource for JsonDirectory {
    fn create(&mut self, payload: Value) -> Result<Value> {
        guard_writable(self, "create records")?;
        let (name, data) = payload_pair(payload, "name", "data")?;
        let (file, path) = self.record_path(&name)?;
        if path.exists() {
            return Err(Error::Datasource(format!("record '{}' already exists", file)));
        }
        self.write(&path, &data)?;
        Ok(Value::String(file))
    }

    fn read(&mut self, query: &Value) -> Result<Value> {
        let wanted: Vec<String> = match query {
            Value::Null => return self.load_all().cloned(),
            Value::String(name) => vec![self.record_path(name)?.0],
            Value::Array(names) => names
                .iter()
                .map(|n| match n {
                    Value::String(name) => Ok(self.record_path(name)?.0),
                    other => Err(Error::MalformedPayload(format!("record name {} is not a string", other))),
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(Error::MalformedPayload(format!(
                    "read query must be null, a name, or a list of names, got {}",
                    other
                )))
            }
        };
        let all = self.load_all()?;
        let filtered: Map<String, Value> = all
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(k, _)| wanted.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Value::Object(filtered))
    }

    fn update(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "update records")?;
        let (name, data) = payload_pair(payload, "name", "data")?;
        let (_, path) = self.record_path(&name)?;
        if !path.is_file() {
            return Ok(false);
        }
        self.write(&path, &data)?;
        Ok(true)
    }

    fn delete(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "delete records")?;
        let (name, _) = payload_pair(payload, "name", "data")?;
        let (_, path) = self.record_path(&name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        self.cache.invalidate();
        Ok(true)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, JsonDirectory) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("home.json"), r#"{"title": "Home"}"#).unwrap();
        fs::write(dir.path().join("about.json"), r#"{"title": "About"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let source = JsonDirectory::new(dir.path(), false).unwrap();
        (dir, source)
    }

    #[test]
    fn test_read_all_and_filtered() {
        let (_dir, mut source) = seeded();
        let all = source.read(&Value::Null).unwrap();
        assert_eq!(all, json!({"about.json": {"title": "About"}, "home.json": {"title": "Home"}}));
        assert!(source.cache().is_valid());

        assert_eq!(source.read(&json!("home")).unwrap(), json!({"home.json": {"title": "Home"}}));
        assert_eq!(
            source.read(&json!(["about.json", "missing"])).unwrap(),
            json!({"about.json": {"title": "About"}})
        );
        assert!(source.read(&json!(5)).is_err());
    }

    #[test]
    fn test_writes_invalidate_cache() {
        let (dir, mut source) = seeded();
        source.read(&Value::Null).unwrap();

        assert_eq!(source.create(json!(["blog", {"title": "Blog"}])).unwrap(), json!("blog.json"));
        assert!(!source.cache().is_valid());
        assert!(dir.path().join("blog.json").is_file());
        assert_eq!(source.read(&json!("blog")).unwrap()["blog.json"]["title"], "Blog");

        assert!(source.update(json!({"name": "home.json", "data": {"title": "Start"}})).unwrap());
        assert_eq!(source.read(&Value::Null).unwrap()["home.json"]["title"], "Start");

        assert!(source.delete(json!("about")).unwrap());
        assert!(source.read(&json!("about")).unwrap().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_missing_targets_and_duplicates() {
        let (_dir, mut source) = seeded();
        assert!(!source.update(json!(["nope", {}])).unwrap());
        assert!(!source.delete(json!(["nope"])).unwrap());
        assert!(matches!(source.create(json!(["home", {}])), Err(Error::Datasource(_))));
        assert!(matches!(source.create(json!(["../x", {}])), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_read_only_rejects_mutations_without_changes() {
        let (dir, mut source) = seeded();
        source.set_read_only(true);
        let before = source.read(&Value::Null).unwrap();

        assert!(matches!(source.create(json!(["new", {}])), Err(Error::ReadOnlyViolation(_))));
        assert!(matches!(source.update(json!(["home", {}])), Err(Error::ReadOnlyViolation(_))));
        assert!(matches!(source.delete(json!("home")), Err(Error::ReadOnlyViolation(_))));

        assert!(source.cache().is_valid());
        assert!(!dir.path().join("new.json").exists());
        assert_eq!(source.read(&Value::Null).unwrap(), before);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = JsonDirectory::new(dir.path().join("absent"), true).unwrap_err();
        assert!(err.is_not_found());
    }
}
