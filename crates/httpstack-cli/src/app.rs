// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The front controller.
//!
//! [`App::bootstrap`] loads a project, registers the shared services and
//! built-in controllers in a root [`Container`], and reads the route files.
//! [`App::handle`] then turns one [`Request`] into one sent [`Response`],
//! running the dispatch in a child scope so per-request services (the base
//! layout) never leak between requests.

use crate::config::Project;
use crate::controllers::{
    PageController, TemplateInit, ASSETS, LOCATOR, PAGE_CONTROLLER, PROJECT, TEMPLATE_CONTROLLER,
    VIEWS,
};
use crate::routes::load_routes;
use httpstack::{
    Container, Controller, DispatchPolicy, FileLocator, FileSystemLocator, Request, Response,
    Router,
};
use std::path::Path;
use std::sync::Arc;

/// A bootstrapped application.
pub struct App {
    project: Arc<Project>,
    container: Arc<Container>,
    router: Router,
}

impl App {
    /// Loads the project at `root` and prepares it for dispatch.
    pub fn bootstrap(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::from_project(Project::open(root)?)
    }

    /// Prepares an already loaded project.
    pub fn from_project(project: Project) -> anyhow::Result<Self> {
        let project = Arc::new(project);
        let container = Arc::new(Container::new());

        let locator: Arc<dyn FileLocator> = Arc::new(
            FileSystemLocator::new()
                .with_root(project.views_dir())
                .with_root(project.templates_dir())
                .with_public_root(project.public_dir(), &project.config.template.assets_url),
        );
        container.instance(PROJECT, Arc::clone(&project));
        container.instance(ASSETS, Arc::new(project.load_assets()?));
        let views: Arc<dyn FileLocator> =
            Arc::new(FileSystemLocator::new().with_root(project.views_dir()));
        container.instance(LOCATOR, locator);
        container.instance(VIEWS, views);
        container.instance(
            TEMPLATE_CONTROLLER,
            Arc::new(TemplateInit) as Arc<dyn Controller>,
        );
        container.instance(
            PAGE_CONTROLLER,
            Arc::new(PageController) as Arc<dyn Controller>,
        );

        let mut router = Router::with_policy(DispatchPolicy {
            abort_on_before_error: project.config.app.abort_on_before_error,
        });
        let count = load_routes(&project.routes_dir(), &mut router)?;
        tracing::info!(
            "Loaded {} routes from {}",
            count,
            project.routes_dir().display()
        );

        Ok(Self {
            project,
            container,
            router,
        })
    }

    /// The loaded project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The root service container.
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// The route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatches `request` and returns the sent response.
    ///
    /// Requests no after route matches get a 404 page; a failing handler gets
    /// a 404 page for [`httpstack::Error::NotFound`] and a 500 page otherwise.
    pub fn handle(&self, request: &Request) -> Response {
        let scope = self.container.scope();
        let mut response = Response::new();

        match self.router.dispatch(request, &mut response, &scope) {
            Ok(outcome) if outcome.is_unrouted() && !response.is_sent() => {
                let message = format!("No route for {} {}", request.method, request.path);
                response = error_response(404, &message);
            }
            Ok(outcome) => {
                tracing::debug!(
                    "{} {}: {} handlers ran",
                    request.method,
                    request.path,
                    outcome.handlers_run
                );
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {}: {}", request.method, request.path, e);
                response = error_response(404, &e.to_string());
            }
            Err(e) => {
                tracing::error!("{} {} failed: {}", request.method, request.path, e);
                response = error_response(500, &e.to_string());
            }
        }

        response.send();
        response
    }
}

fn error_response(status: u16, message: &str) -> Response {
    let mut response = Response::new();
    response
        .set_status(status)
        .set_content_type("text/html; charset=utf-8")
        .set_body(error_page(status, message));
    response
}

/// A minimal HTML error page.
pub fn error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{status}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; padding: 2rem; background: #f5f5f5; color: #333; }}
        .error {{ background: white; border-left: 4px solid #e53e3e; padding: 1rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{status}</h1>
    <div class="error">
        <pre>{message}</pre>
    </div>
</body>
</html>"#,
        status = status,
        message = html_escape(message)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("root", &self.project.root)
            .field("routes", &self.router.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page(500, "<script>alert('x')</script>");
        assert!(page.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(page.contains("<h1>500</h1>"));
    }
}
