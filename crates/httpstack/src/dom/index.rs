// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Derived lookup tables over the attached part of a tree.

use super::{DomTree, NodeId, NodeKind};
use std::collections::HashMap;

/// Document order, tag and id lookups. Rebuilt wholesale after each mutation.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryIndex {
    position: HashMap<NodeId, usize>,
    by_tag: HashMap<String, Vec<NodeId>>,
    by_id: HashMap<String, NodeId>,
    generation: u64,
}

impl QueryIndex {
    pub(crate) fn build(tree: &DomTree, generation: u64) -> Self {
        let mut index = Self {
            generation,
            ..Self::default()
        };
        let mut order = 0;
        tree.traverse(tree.root(), |tree, node| {
            index.position.insert(node, order);
            order += 1;
            if let NodeKind::Element(element) = tree.kind(node) {
                index
                    .by_tag
                    .entry(element.name.clone())
                    .or_default()
                    .push(node);
                if let Some(id) = element.attribute("id") {
                    index.by_id.entry(id.to_string()).or_insert(node);
                }
            }
        });
        index
    }

    pub(crate) fn position(&self, node: NodeId) -> Option<usize> {
        self.position.get(&node).copied()
    }

    pub(crate) fn by_tag(&self, tag: &str) -> &[NodeId] {
        self.by_tag.get(tag).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
