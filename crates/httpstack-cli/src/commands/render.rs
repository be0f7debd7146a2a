// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Dispatches one request without starting a server.

use crate::app::App;
use httpstack::{Request, Response};
use std::path::Path;

/// Renders `method path` for the project at `root`.
pub fn render(root: &Path, method: &str, path: &str) -> anyhow::Result<Response> {
    let app = App::bootstrap(root)?;
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path, ""),
    };
    let request = Request::new(method, path).with_query(
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
    );
    Ok(app.handle(&request))
}

/// Runs the render command, printing the body to stdout.
///
/// Fails when the response status is not a success.
pub fn run(root: &Path, method: &str, path: &str) -> anyhow::Result<()> {
    let response = render(root, method, path)?;
    println!("{}", response.body());
    if !response.is_success() {
        anyhow::bail!("{} {} answered {}", method, path, response.status());
    }
    Ok(())
}
