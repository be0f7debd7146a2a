// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `render`: Dispatch one request and print the response body
//! - `routes`: List the registered before and after routes
//! - `serve`: Serve the project over HTTP

/// Single-request render command.
pub mod render;
/// Route listing command.
pub mod routes;
/// HTTP server command.
pub mod serve;
