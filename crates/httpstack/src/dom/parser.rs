// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lenient markup parser.
//!
//! The HTML mode accepts what browsers accept in practice: unclosed elements
//! are closed at end of input, stray end tags are ignored, `<li>`, `<p>`,
//! `<option>` and table cells close their open sibling implicitly, and the
//! contents of `<script>` and `<style>` are kept verbatim.
//!
//! Only markup that cannot be recovered is rejected: an unterminated comment,
//! declaration, tag or quoted attribute value. The error carries the line and
//! column of the construct that was left open.

use super::{DocumentMode, DomTree, Element, NodeId, NodeKind};
use crate::error::{Error, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is kept verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose content is text with entities but no markup.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// True for elements serialized without an end tag in HTML mode.
pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// True for elements whose text children are serialized unescaped in HTML mode.
pub fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

pub(crate) fn parse(source: &str, mode: DocumentMode) -> Result<DomTree> {
    let mut builder = TreeBuilder {
        src: source,
        pos: 0,
        mode,
        tree: DomTree::empty(mode),
        stack: Vec::new(),
    };
    builder.run()?;
    let mut tree = builder.tree;
    tree.reindex();
    Ok(tree)
}

struct TreeBuilder<'a> {
    src: &'a str,
    pos: usize,
    mode: DocumentMode,
    tree: DomTree,
    stack: Vec<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.tree.root)
    }

    fn html(&self) -> bool {
        self.mode == DocumentMode::Html
    }

    fn error(&self, message: impl Into<String>, at: usize) -> Error {
        let (line, column) = line_col(self.src, at);
        Error::parse_at(message, self.src, line, column)
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("<![CDATA[") {
                self.cdata()?;
            } else if rest.starts_with("<!") {
                self.declaration()?;
            } else if rest.starts_with("<?") {
                self.processing_instruction()?;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag()?;
            } else {
                self.text();
            }
        }
        Ok(())
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let id = self.tree.push_node(kind);
        self.tree.nodes[id.0].parent = Some(parent);
        self.tree.nodes[parent.0].children.push(id);
        id
    }

    fn append_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(&last) = self.tree.nodes[parent.0].children.last() {
            if let NodeKind::Text(existing) = &mut self.tree.nodes[last.0].kind {
                existing.push_str(&text);
                return;
            }
        }
        self.append(NodeKind::Text(text));
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A '<' that starts no construct is literal text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..]
            .find('<')
            .map(|i| i + skip)
            .unwrap_or(rest.len());
        self.pos += end;
        self.append_text(decode_entities(&rest[..end]));
    }

    fn comment(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest[4..]
            .find("-->")
            .ok_or_else(|| self.error("unterminated comment", start))?;
        self.append(NodeKind::Comment(rest[4..4 + end].to_string()));
        self.pos += 4 + end + 3;
        Ok(())
    }

    fn cdata(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest[9..]
            .find("]]>")
            .ok_or_else(|| self.error("unterminated CDATA section", start))?;
        self.append_text(rest[9..9 + end].to_string());
        self.pos += 9 + end + 3;
        Ok(())
    }

    fn declaration(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest
            .find('>')
            .ok_or_else(|| self.error("unterminated declaration", start))?;
        self.append(NodeKind::Doctype(rest[2..end].to_string()));
        self.pos += end + 1;
        Ok(())
    }

    fn processing_instruction(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest
            .find("?>")
            .ok_or_else(|| self.error("unterminated processing instruction", start))?;
        self.append(NodeKind::ProcessingInstruction(rest[2..end].to_string()));
        self.pos += end + 2;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<()> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest
            .find('>')
            .ok_or_else(|| self.error("unterminated end tag", start))?;
        let name = self.tree.normalize_name(rest[2..end].trim());
        self.pos += end + 1;

        let open = self
            .stack
            .iter()
            .rposition(|&id| self.tree.tag_name(id) == Some(name.as_str()));
        match open {
            Some(depth) => self.stack.truncate(depth),
            None => tracing::debug!("Ignoring stray </{}>", name),
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn start_tag(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        let raw_name = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
        let name = self.tree.normalize_name(raw_name);

        let mut attributes: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unterminated start tag <{}>", name), start));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }

            let attr_name = self.take_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/'));
            if attr_name.is_empty() {
                // Stray '/' or '=' between attributes.
                self.pos += 1;
                continue;
            }
            let attr_name = self.tree.normalize_name(attr_name);

            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value(start)?
            } else {
                String::new()
            };

            if attributes.iter().all(|(k, _)| *k != attr_name) {
                attributes.push((attr_name, value));
            }
        };

        if self.html() {
            self.close_implied(&name);
        }
        let id = self.append(NodeKind::Element(Element {
            name: name.clone(),
            attributes,
        }));

        if self_closing || (self.html() && is_void(&name)) {
            return Ok(());
        }
        if self.html()
            && (RAW_TEXT_ELEMENTS.contains(&name.as_str())
                || ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name.as_str()))
        {
            self.raw_text(id, &name);
            return Ok(());
        }
        self.stack.push(id);
        Ok(())
    }

    fn attribute_value(&mut self, tag_start: usize) -> Result<String> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated attribute value", tag_start))?;
                self.pos += end + 2;
                Ok(decode_entities(&rest[1..1 + end]))
            }
            _ => {
                let value = self.take_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(value))
            }
        }
    }

    fn raw_text(&mut self, element: NodeId, name: &str) {
        let rest = self.rest();
        let closing = format!("</{}", name);
        // ASCII lower-casing keeps byte offsets intact.
        let content_end = match rest.to_ascii_lowercase().find(&closing) {
            Some(i) => i,
            None => {
                tracing::warn!("<{}> is never closed; taking the rest of the input", name);
                rest.len()
            }
        };
        let content = &rest[..content_end];
        let after = &rest[content_end..];
        let consumed = match after.find('>') {
            Some(i) => content_end + i + 1,
            None => rest.len(),
        };
        self.pos += consumed;

        if !content.is_empty() {
            let text = if is_raw_text(name) {
                content.to_string()
            } else {
                decode_entities(content)
            };
            let id = self.tree.push_node(NodeKind::Text(text));
            self.tree.nodes[id.0].parent = Some(element);
            self.tree.nodes[element.0].children.push(id);
        }
    }

    fn close_implied(&mut self, name: &str) {
        let Some(&top) = self.stack.last() else {
            return;
        };
        let Some(open) = self.tree.tag_name(top) else {
            return;
        };
        let closes = match open {
            "li" => name == "li",
            "option" => name == "option" || name == "optgroup",
            "p" => BLOCK_ELEMENTS.contains(&name),
            "dt" | "dd" => name == "dt" || name == "dd",
            "tr" => name == "tr",
            "td" | "th" => matches!(name, "td" | "th" | "tr"),
            _ => false,
        };
        if closes {
            self.stack.pop();
        }
    }
}

fn line_col(source: &str, at: usize) -> (usize, usize) {
    let before = &source[..at.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|nl| before[nl + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    (line, column)
}

/// Decodes character references (`&amp;`, `&#39;`, `&#x27;`, ...).
///
/// Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(src: &str) -> DomTree {
        parse(src, DocumentMode::Html).unwrap()
    }

    #[test]
    fn test_round_trips_simple_markup() {
        let src = "<!DOCTYPE html><html><head><title>A</title></head><body><p class=\"x\">Hi</p></body></html>";
        assert_eq!(html(src).to_html(), src);
    }

    #[test]
    fn test_void_and_self_closing() {
        let tree = html("<p>a<br>b<img src=\"x.png\"/>c</p>");
        assert_eq!(tree.to_html(), "<p>a<br>b<img src=\"x.png\">c</p>");
    }

    #[test]
    fn test_implied_end_tags() {
        let tree = html("<ul><li>one<li>two</ul><p>a<div>b</div>");
        assert_eq!(tree.query("//ul/li").unwrap().len(), 2);
        assert_eq!(tree.query("//p/div").unwrap().len(), 0);
    }

    #[test]
    fn test_stray_end_tags_are_ignored() {
        let tree = html("<div>a</span>b</div>");
        assert_eq!(tree.to_html(), "<div>ab</div>");
    }

    #[test]
    fn test_unclosed_elements_close_at_end() {
        let tree = html("<div><span>text");
        assert_eq!(tree.to_html(), "<div><span>text</span></div>");
    }

    #[test]
    fn test_script_content_is_verbatim() {
        let src = "<script>if (a < b && c) { x(\"</p>\"); }</script>";
        let tree = html(src);
        assert_eq!(tree.to_html(), src);
        assert_eq!(tree.query("//p").unwrap().len(), 0);
    }

    #[test]
    fn test_entities_are_decoded_and_reescaped() {
        let tree = html("<p title=\"a &amp; b\">x &lt; y &#39;z&#x27; &bogus;</p>");
        let p = tree.query_one("//p").unwrap().unwrap();
        assert_eq!(tree.attribute(p, "title"), Some("a & b"));
        assert_eq!(tree.text_content(p), "x < y 'z' &bogus;");
        assert_eq!(tree.to_html(), "<p title=\"a &amp; b\">x &lt; y 'z' &amp;bogus;</p>");
    }

    #[test]
    fn test_attribute_forms() {
        let tree = html("<input type=text disabled value='a \"b\"' TYPE=\"dup\">");
        let input = tree.query_one("//input").unwrap().unwrap();
        assert_eq!(tree.attribute(input, "type"), Some("text"));
        assert_eq!(tree.attribute(input, "disabled"), Some(""));
        assert_eq!(tree.attribute(input, "value"), Some("a \"b\""));
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let tree = html("<p>1 < 2</p>");
        assert_eq!(tree.to_html(), "<p>1 &lt; 2</p>");
    }

    #[test]
    fn test_unrecoverable_markup_reports_location() {
        let err = parse("<div>\n  <!-- open\n</div>", DocumentMode::Html).unwrap_err();
        match err {
            Error::Parse { line, column, message, .. } => {
                assert_eq!((line, column), (2, 3));
                assert!(message.contains("comment"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("<a href=\"x>", DocumentMode::Html).is_err());
        assert!(parse("<div class", DocumentMode::Html).is_err());
    }

    #[test]
    fn test_xml_mode_is_case_sensitive() {
        let tree = parse("<?xml version=\"1.0\"?><Data><Item/><item>x</item></Data>", DocumentMode::Xml).unwrap();
        assert_eq!(tree.query("//Item").unwrap().len(), 1);
        assert_eq!(tree.query("//item").unwrap().len(), 1);
        assert_eq!(
            tree.to_html(),
            "<?xml version=\"1.0\"?><Data><Item/><item>x</item></Data>"
        );
    }
}
