// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lists the route table.

use crate::app::App;
use console::style;
use httpstack::Phase;
use std::path::Path;

/// Prints every registered route, before phase first.
pub fn run(root: &Path) -> anyhow::Result<()> {
    let app = App::bootstrap(root)?;
    let routes = app.router().routes();
    if routes.is_empty() {
        println!(
            "{} in {}",
            style("No routes").yellow(),
            app.project().routes_dir().display()
        );
        return Ok(());
    }

    for route in routes {
        let phase = match route.phase {
            Phase::Before => style(format!("{:<6}", route.phase.to_string())).magenta(),
            Phase::After => style(format!("{:<6}", route.phase.to_string())).green(),
        };
        println!(
            "{} {:<6} {:<30} {}",
            phase,
            route.method,
            style(&route.pattern).cyan(),
            route.handlers.join(", ")
        );
    }
    Ok(())
}
