// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! HttpStack CLI library.
//!
//! The front controller and tooling around the `httpstack` crate: project
//! configuration, declarative route files, the built-in template and page
//! controllers, a SQLite table datasource and a development server.
//!
//! # Usage
//!
//! This crate is primarily used through the `httpstack` binary:
//!
//! ```bash
//! httpstack routes               # List the route table
//! httpstack render /about        # Dispatch one request, print the body
//! httpstack serve --port 8080    # Serve the project over HTTP
//! ```
//!
//! # Project Layout
//!
//! ```text
//! app.toml            optional configuration
//! assets.json         asset manifest bound into every page
//! routes/*.toml       [[route]] tables, loaded in file-name order
//! views/templates/    base layouts
//! views/routes/       page views
//! data/template/      JSON records bound into every page
//! data/pages/         one XML file of bindings per page
//! public/             static files
//! ```

/// The front controller.
pub mod app;
/// CLI commands (render, routes, serve).
pub mod commands;
/// Project configuration from `app.toml`.
pub mod config;
/// Built-in template and page controllers.
pub mod controllers;
/// SQLite table datasource.
pub mod datasource;
/// Route definition files.
pub mod routes;

pub use app::App;
pub use config::{Config, Project};
