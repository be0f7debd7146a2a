// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Built-in controllers.
//!
//! Controllers are registered in the application container under the names
//! route files use as handler targets:
//!
//! - `template@init`: before middleware that builds the base layout for the request
//! - `page@show`: renders the view named by the `{page}` capture or the request path
//!
//! Both depend on the shared services registered at bootstrap (see the
//! name constants below) and communicate through the request-scoped
//! [`LAYOUT`] service.

mod page;
mod template;

pub use page::PageController;
pub use template::TemplateInit;

use httpstack::{Container, Error, Result, Template};
use std::sync::{Arc, Mutex, MutexGuard};

/// `Arc<Project>`: project root and configuration.
pub const PROJECT: &str = "project";
/// `Arc<Vec<AssetDescriptor>>`: the asset manifest.
pub const ASSETS: &str = "assets";
/// `Arc<dyn FileLocator>`: lookup over views, layouts and public files.
pub const LOCATOR: &str = "locator";
/// `Arc<dyn FileLocator>`: lookup restricted to the page view directory.
pub const VIEWS: &str = "views";
/// `Arc<Mutex<Template>>`: the current request's base layout.
pub const LAYOUT: &str = "layout";
/// Container name of [`TemplateInit`].
pub const TEMPLATE_CONTROLLER: &str = "template";
/// Container name of [`PageController`].
pub const PAGE_CONTROLLER: &str = "page";

/// A shared, lockable template as stored in the request scope.
pub type SharedTemplate = Arc<Mutex<Template>>;

/// Resolves the request's base layout.
///
/// A missing layout means the template middleware did not run or failed, which
/// is a server fault rather than a missing page.
pub fn request_template(container: &Container) -> Result<SharedTemplate> {
    container.make::<SharedTemplate>(LAYOUT).map_err(|e| match e {
        Error::NotFound(_) => Error::Handler(format!(
            "no base layout for this request; is {}@init routed as a before handler?",
            TEMPLATE_CONTROLLER
        )),
        other => other,
    })
}

pub(crate) fn lock_template(template: &SharedTemplate) -> Result<MutexGuard<'_, Template>> {
    template
        .lock()
        .map_err(|_| Error::Handler("template lock poisoned by an earlier handler".into()))
}

pub(crate) fn unknown_method(target: &str, method: &str) -> Error {
    Error::NotFound(format!("handler {}@{}", target, method))
}
