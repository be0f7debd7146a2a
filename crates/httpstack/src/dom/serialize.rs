// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Markup output.

use super::parser::{is_raw_text, is_void};
use super::{DocumentMode, DomTree, NodeId, NodeKind};

pub(crate) fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    match tree.kind(id) {
        NodeKind::Document => {
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
        }
        NodeKind::Doctype(text) => {
            out.push_str("<!");
            out.push_str(text);
            out.push('>');
        }
        NodeKind::ProcessingInstruction(text) => {
            out.push_str("<?");
            out.push_str(text);
            out.push_str("?>");
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Text(text) => {
            let raw = tree.mode() == DocumentMode::Html
                && tree
                    .parent(id)
                    .and_then(|p| tree.tag_name(p))
                    .map(is_raw_text)
                    .unwrap_or(false);
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            let children = tree.children(id);
            match tree.mode() {
                DocumentMode::Html if is_void(&element.name) => {
                    out.push('>');
                    return;
                }
                DocumentMode::Xml if children.is_empty() => {
                    out.push_str("/>");
                    return;
                }
                _ => out.push('>'),
            }
            for &child in children {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}
