// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::{lock_template, request_template, unknown_method, PROJECT, VIEWS};
use crate::config::Project;
use crate::datasource::SqliteTable;
use httpstack::datasource::XmlFile;
use httpstack::{
    Captures, Container, Controller, Datasource, Error, FileLocator, Model, Request, Response,
    Result, Template,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// View rendered for `/`.
pub const HOME_VIEW: &str = "home";

/// Sub-directory of the data directory holding one `<view>.xml` per page.
pub const PAGE_DATA_DIR: &str = "pages";

/// Renders page views into the request's base template.
#[derive(Debug, Default)]
pub struct PageController;

/// The view a request asks for: the `page` capture, else the path.
pub fn view_name(request: &Request, captures: &Captures) -> Result<String> {
    let raw = captures
        .name("page")
        .unwrap_or_else(|| request.path.trim_matches('/'));
    let name = if raw.is_empty() { HOME_VIEW } else { raw };

    let valid = name.split('/').all(|segment| {
        !segment.is_empty()
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
    });
    if !valid {
        return Err(Error::NotFound(format!("page '{}'", name)));
    }
    Ok(name.to_string())
}

impl PageController {
    fn bind_page_data(project: &Project, name: &str, view: &mut Template) -> Result<()> {
        let xml = project.data_dir().join(PAGE_DATA_DIR).join(format!("{}.xml", name));
        if xml.is_file() {
            let mut model = Model::new(Box::new(XmlFile::new(&xml, true)?));
            let keys = model.load(&Value::Null)?;
            tracing::debug!("Bound {} keys from {}", keys, xml.display());
            model.bind_to(view);
        }

        let database = &project.config.database;
        if let Some(path) = &database.path {
            let path = project.path(path);
            if path.is_file() {
                let mut table = SqliteTable::open(&path, &database.table, true)?;
                if let Some(row) = table
                    .read(&json!({ "slug": name }))?
                    .as_array_mut()
                    .and_then(|rows| rows.drain(..).next())
                {
                    view.bind_data(row)?;
                }
            }
        }
        Ok(())
    }

    fn show(
        &self,
        request: &Request,
        response: &mut Response,
        container: &Container,
        captures: &Captures,
    ) -> Result<()> {
        let project: Arc<Project> = container.make(PROJECT)?;
        let name = view_name(request, captures)?;
        // Only the view directory; layouts and public files are not pages.
        let views: Arc<dyn FileLocator> = container.make(VIEWS)?;
        let file = views.find_file(&name, None, "html")?;
        let shared = request_template(container)?;
        let mut page = lock_template(&shared)?;

        page.set("path", request.path.as_str());
        let view = page.load_view(&file)?;
        Self::bind_page_data(&project, &name, view)?;
        page.merge_view()?;
        let html = page.render()?;

        tracing::debug!("Rendered view '{}' for {}", name, request.path);
        response
            .set_status(200)
            .set_content_type("text/html; charset=utf-8")
            .set_body(html);
        response.send();
        Ok(())
    }
}

impl Controller for PageController {
    fn call(
        &self,
        method: &str,
        request: &Request,
        response: &mut Response,
        container: &Container,
        captures: &Captures,
    ) -> Result<()> {
        match method {
            "show" => self.show(request, response, container, captures),
            other => Err(unknown_method(super::PAGE_CONTROLLER, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpstack::Matcher;

    #[test]
    fn test_view_name_from_capture_path_or_home() {
        let caps = Matcher::compile("/{page}").unwrap().matches("/about").unwrap();
        assert_eq!(view_name(&Request::new("GET", "/x"), &caps).unwrap(), "about");

        let none = Captures::default();
        assert_eq!(view_name(&Request::new("GET", "/blog/post/"), &none).unwrap(), "blog/post");
        assert_eq!(view_name(&Request::new("GET", "/"), &none).unwrap(), HOME_VIEW);
    }

    #[test]
    fn test_view_name_rejects_traversal() {
        let none = Captures::default();
        let err = view_name(&Request::new("GET", "/../secret"), &none).unwrap_err();
        assert!(err.is_not_found());
    }
}
