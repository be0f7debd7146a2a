// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Named service registry.
//!
//! The [`Container`] is threaded explicitly through every handler; there is no
//! process-wide application lookup. Services are registered under string names
//! and resolved with [`Container::make`]:
//!
//! - [`singleton`](Container::singleton): factory runs once, every `make` returns a clone
//!   of that one value (wrap shared state in `Arc` to share identity)
//! - [`bind`](Container::bind): factory runs on every `make`
//! - [`instance`](Container::instance): a ready-made singleton value
//!
//! A request-scoped child created with [`Container::scope`] sees all parent
//! registrations and may add or shadow its own without touching the parent.
//!
//! ```rust
//! use httpstack::Container;
//! use std::sync::Arc;
//!
//! let container = Container::new();
//! container.singleton("greeting", |_| Ok(Arc::new(String::from("hello"))));
//! container.bind("counter", |_| Ok(Vec::<u32>::new()));
//!
//! let a: Arc<String> = container.make("greeting").unwrap();
//! let b: Arc<String> = container.make("greeting").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

use crate::error::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

type AnyValue = Box<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Result<AnyValue> + Send + Sync>;

enum Entry {
    Binding(Factory),
    Singleton {
        factory: Option<Factory>,
        value: Mutex<Option<Arc<AnyValue>>>,
    },
}

/// Named service registry with singleton and per-call bindings.
pub struct Container {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    parent: Option<Arc<Container>>,
}

impl Container {
    /// Creates an empty root container.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            parent: None,
        }
    }

    /// Creates a child container that falls back to `self` for unknown names.
    pub fn scope(self: &Arc<Self>) -> Container {
        Self {
            entries: RwLock::new(HashMap::new()),
            parent: Some(Arc::clone(self)),
        }
    }

    fn insert(&self, name: &str, entry: Entry) {
        match self.entries.write() {
            Ok(mut entries) => {
                if entries.insert(name.to_string(), Arc::new(entry)).is_some() {
                    tracing::debug!("Service '{}' re-registered", name);
                }
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name.to_string(), Arc::new(entry));
            }
        }
    }

    /// Registers a factory whose result is created once and shared.
    pub fn singleton<T, F>(&self, name: &str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |c| factory(c).map(|v| Box::new(v) as AnyValue));
        self.insert(
            name,
            Entry::Singleton {
                factory: Some(factory),
                value: Mutex::new(None),
            },
        );
    }

    /// Registers a factory that produces a fresh value on every `make`.
    pub fn bind<T, F>(&self, name: &str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |c| factory(c).map(|v| Box::new(v) as AnyValue));
        self.insert(name, Entry::Binding(factory));
    }

    /// Registers an already-built singleton value.
    pub fn instance<T>(&self, name: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.insert(
            name,
            Entry::Singleton {
                factory: None,
                value: Mutex::new(Some(Arc::new(Box::new(value) as AnyValue))),
            },
        );
    }

    /// True if `name` is registered here or in a parent scope.
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<(Arc<Entry>, &Container)> {
        let local = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(name).cloned());
        match local {
            Some(entry) => Some((entry, self)),
            None => self.parent.as_deref().and_then(|p| p.lookup(name)),
        }
    }

    /// Resolves a service.
    ///
    /// Singletons are created on first use by the container that registered
    /// them and cloned out afterwards; bindings run their factory against
    /// `self`, so they can see request-scoped registrations.
    pub fn make<T>(&self, name: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (entry, owner) = self
            .lookup(name)
            .ok_or_else(|| Error::NotFound(format!("service '{}' is not registered", name)))?;

        match entry.as_ref() {
            Entry::Binding(factory) => {
                let value = factory(self)?;
                value
                    .downcast::<T>()
                    .map(|b| *b)
                    .map_err(|_| type_mismatch::<T>(name))
            }
            Entry::Singleton { factory, value } => {
                let cached = lock(value).clone();
                let shared = match cached {
                    Some(shared) => shared,
                    None => {
                        let factory = factory
                            .as_ref()
                            .ok_or_else(|| Error::Container(format!("service '{}' has no value", name)))?;
                        // Built outside the lock so the factory may resolve other services.
                        let built = Arc::new(factory(owner)?);
                        let mut slot = lock(value);
                        slot.get_or_insert(built).clone()
                    }
                };
                (**shared)
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or_else(|| type_mismatch::<T>(name))
            }
        }
    }

    /// Registered names in this scope (not including parents), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn type_mismatch<T>(name: &str) -> Error {
    Error::Container(format!(
        "service '{}' is not a {}",
        name,
        std::any::type_name::<T>()
    ))
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("names", &self.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
