// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Datasources that need more than the core crate's file formats.
//!
//! The JSON-directory and XML-file datasources live in `httpstack` itself;
//! this module adds a relational table backed by SQLite.

mod sqlite;

pub use sqlite::SqliteTable;
