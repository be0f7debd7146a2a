// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::{unknown_method, SharedTemplate, ASSETS, LAYOUT, LOCATOR, PROJECT};
use crate::config::Project;
use httpstack::datasource::JsonDirectory;
use httpstack::{
    AssetDescriptor, Captures, Container, Controller, Datasource, DomTree, FileLocator, Request,
    Response, Result, Template,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Sub-directory of the data directory whose JSON records become global bindings.
pub const TEMPLATE_DATA_DIR: &str = "template";

/// Builds the base layout for each request.
///
/// `init` loads the configured layout, queues the asset manifest, binds the
/// records of `data/template/*.json` and stores the result in the request
/// container as [`LAYOUT`](super::LAYOUT).
#[derive(Debug, Default)]
pub struct TemplateInit;

impl TemplateInit {
    /// Builds a fresh base template from the shared services.
    pub fn build(container: &Container) -> Result<Template> {
        let project: Arc<Project> = container.make(PROJECT)?;
        let locator: Arc<dyn FileLocator> = container.make(LOCATOR)?;
        let assets: Arc<Vec<AssetDescriptor>> = container.make(ASSETS)?;
        let settings = &project.config.template;

        let layout = locator.find_file(&settings.base_layout, None, "html")?;
        let mut template = Template::from_tree(DomTree::from_file(&layout)?).with_locator(locator);
        template.set_assets_path(&settings.assets_url);
        template.set_view_slot(settings.view_slot.as_str());
        template.queue_assets(assets.iter().cloned());
        template.set("app_name", project.config.app.name.as_str());

        let data_dir = project.data_dir().join(TEMPLATE_DATA_DIR);
        if data_dir.is_dir() {
            let mut records = JsonDirectory::new(&data_dir, true)?;
            if let Value::Object(records) = records.read(&Value::Null)? {
                for (name, record) in records {
                    if record.is_object() {
                        template.bind_data(record)?;
                    } else {
                        tracing::warn!("Ignoring template data {}: not an object", name);
                    }
                }
            }
        }

        tracing::debug!("Base layout {} ready", layout);
        Ok(template)
    }
}

impl Controller for TemplateInit {
    fn call(
        &self,
        method: &str,
        _request: &Request,
        _response: &mut Response,
        container: &Container,
        _captures: &Captures,
    ) -> Result<()> {
        match method {
            "init" => {
                let template: SharedTemplate = Arc::new(Mutex::new(Self::build(container)?));
                container.instance(LAYOUT, template);
                Ok(())
            }
            other => Err(unknown_method(super::TEMPLATE_CONTROLLER, other)),
        }
    }
}
