// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Flat key/value models over a datasource.
//!
//! A [`Model`] loads a JSON object from its [`Datasource`], lets callers edit
//! it as a flat map, and writes changed keys back with [`Model::save`]. Models
//! feed template bindings through [`Model::bind_to`].
//!
//! ```rust,no_run
//! use httpstack::datasource::JsonDirectory;
//! use httpstack::Model;
//!
//! let source = JsonDirectory::new("data/pages", false)?;
//! let mut pages = Model::new(Box::new(source));
//! pages.load(&serde_json::Value::Null)?;
//! pages.set("contact.json", serde_json::json!({"title": "Contact"}));
//! pages.save()?;
//! # Ok::<(), httpstack::Error>(())
//! ```

use crate::datasource::Datasource;
use crate::error::{Error, Result};
use crate::template::Template;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// An editable snapshot of datasource records.
pub struct Model {
    source: Box<dyn Datasource>,
    data: Map<String, Value>,
    stored: Map<String, Value>,
    changed: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl Model {
    /// Creates an empty model; call [`load`](Self::load) to fill it.
    pub fn new(source: Box<dyn Datasource>) -> Self {
        Self {
            source,
            data: Map::new(),
            stored: Map::new(),
            changed: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Replaces the model's contents with `source.read(query)`.
    ///
    /// The read result must be a JSON object. Returns the number of keys.
    pub fn load(&mut self, query: &Value) -> Result<usize> {
        match self.source.read(query)? {
            Value::Object(map) => {
                self.data = map;
                self.changed.clear();
                self.removed.clear();
                self.store();
                Ok(self.data.len())
            }
            other => Err(Error::MalformedPayload(format!(
                "model data must be an object, got {}",
                other
            ))),
        }
    }

    /// A value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// True if `key` is present.
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a value and marks it for saving.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.removed.remove(&key);
        self.changed.insert(key.clone());
        self.data.insert(key, value.into());
    }

    /// Removes a key and marks it for deletion on save.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let old = self.data.remove(key)?;
        self.changed.remove(key);
        self.removed.insert(key.to_string());
        Some(old)
    }

    /// All values.
    pub fn all(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Keys with unsaved changes or removals.
    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty() || !self.removed.is_empty()
    }

    /// Remembers the current contents for [`restore`](Self::restore).
    pub fn store(&mut self) {
        self.stored = self.data.clone();
    }

    /// Returns to the contents saved by the last [`store`](Self::store),
    /// [`load`](Self::load) or [`save`](Self::save).
    pub fn restore(&mut self) {
        self.data = self.stored.clone();
        self.changed.clear();
        self.removed.clear();
    }

    /// Writes changed keys back to the datasource.
    ///
    /// Each changed key is sent as `[key, value]` to `update`, falling back to
    /// `create` when the datasource has no such record. Removed keys are sent
    /// to `delete`. Returns how many keys were written.
    pub fn save(&mut self) -> Result<usize> {
        let mut written = 0;
        for key in std::mem::take(&mut self.removed) {
            self.source.delete(json!([key]))?;
            written += 1;
        }
        for key in std::mem::take(&mut self.changed) {
            let value = self.data.get(&key).cloned().unwrap_or(Value::Null);
            if !self.source.update(json!([key, value]))? {
                self.source.create(json!([key, value]))?;
            }
            written += 1;
        }
        self.store();
        tracing::debug!("Model saved {} keys", written);
        Ok(written)
    }

    /// Copies every key into `template` as a data binding.
    pub fn bind_to(&self, template: &mut Template) {
        for (key, value) in &self.data {
            template.set(key.clone(), value.clone());
        }
    }

    /// The backing datasource.
    pub fn datasource(&self) -> &dyn Datasource {
        self.source.as_ref()
    }

    /// The backing datasource, mutably.
    pub fn datasource_mut(&mut self) -> &mut dyn Datasource {
        self.source.as_mut()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("read_only", &self.source.is_read_only())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
