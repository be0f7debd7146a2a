// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

// Parse errors carry a source snippet, which makes the error enum large.
#![allow(clippy::result_large_err)]

//! # HttpStack
//!
//! Before/after request dispatch and DOM-tree view composition for
//! server-rendered HTML.
//!
//! ## Features
//!
//! - Path patterns with `{param}` placeholders and `*` wildcards
//! - Two-phase routing: every matching before handler, then every matching after handler
//! - A named service [`Container`] threaded through every handler
//! - A lenient HTML/XML tree with XPath and CSS queries
//! - Templates with placeholders, conditionals, loops and functions
//! - View fragments merged into a base layout, with their scripts and stylesheets moved
//! - JSON-directory and XML-file datasources behind one CRUD trait
//!
//! ## Quick Start
//!
//! ```rust
//! use httpstack::{Container, Handler, Request, Response, Route, Router, Template};
//!
//! let mut router = Router::new();
//! router.register_after(Route::get("/").handler(Handler::function(|_req, res, _c, _caps| {
//!     let mut page = Template::parse(
//!         "<html><head></head><body><div data-key=\"view\"></div></body></html>",
//!     )?;
//!     page.load_view("<html><body><h1>{{ title }}</h1></body></html>")?;
//!     page.merge_view()?;
//!     page.set("title", "Hello");
//!     res.set_body(page.render()?);
//!     Ok(())
//! })))?;
//!
//! let mut res = Response::new();
//! router.dispatch(&Request::new("GET", "/"), &mut res, &Container::new())?;
//! assert!(res.body().contains("<h1>Hello</h1>"));
//! # Ok::<(), httpstack::Error>(())
//! ```

/// Asset descriptors and tag binding.
pub mod assets;
/// Named service registry.
pub mod container;
/// CRUD datasources.
pub mod datasource;
/// Document trees and queries.
pub mod dom;
/// Error types and reporting.
pub mod error;
/// File lookup for views and assets.
pub mod locator;
/// Key/value models over datasources.
pub mod model;
/// Route path patterns.
pub mod pattern;
/// HTTP request value.
pub mod request;
/// HTTP response value.
pub mod response;
/// Two-phase request dispatch.
pub mod router;
/// Templates and view composition.
pub mod template;

pub use assets::{AssetBinder, AssetDescriptor, AssetKind};
pub use container::Container;
pub use datasource::{CacheState, Datasource};
pub use dom::{DomTree, NodeId, QueryKind};
pub use error::*;
pub use locator::{FileLocator, MemoryLocator};
#[cfg(feature = "filesystem")]
pub use locator::FileSystemLocator;
pub use model::Model;
pub use pattern::{Captures, Matcher};
pub use request::Request;
pub use response::Response;
pub use router::{Controller, DispatchOutcome, DispatchPolicy, Handler, Phase, Route, Router};
pub use template::Template;
