// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! XPath subset and CSS-to-XPath translation.
//!
//! Supported XPath:
//!
//! - absolute (`/a`, `//a`) and relative (`a`, `./a`, `.//a`) paths
//! - node tests: a name, `*`, `text()`
//! - predicates: `[@a]`, `[@a='v']`, `[n]`, `[last()]`, `[contains(@a,'v')]`,
//!   `[starts-with(@a,'v')]`, `[text()='v']`, the class idiom
//!   `[contains(concat(' ', normalize-space(@class), ' '), ' c ')]`,
//!   and conjunctions of those with `and`
//!
//! Supported CSS: type, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! compound selectors, and the descendant and child (`>`) combinators.
//! Everything else is rejected with [`Error::Selector`] rather than
//! silently matching nothing.

use super::{DocumentMode, DomTree, NodeId, NodeKind};
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref CLASS_IDIOM: Regex = Regex::new(
        r#"^contains\(\s*concat\(\s*' '\s*,\s*normalize-space\(\s*@class\s*\)\s*,\s*' '\s*\)\s*,\s*['"] ?([^'"\s]+) ?['"]\s*\)$"#
    )
    .unwrap();
    static ref HAS_ATTR: Regex = Regex::new(r"^@([\w:.-]+)$").unwrap();
    static ref ATTR_EQUALS: Regex =
        Regex::new(r#"^@([\w:.-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")$"#).unwrap();
    static ref ATTR_CONTAINS: Regex =
        Regex::new(r#"^contains\(\s*@([\w:.-]+)\s*,\s*(?:'([^']*)'|"([^"]*)")\s*\)$"#).unwrap();
    static ref ATTR_STARTS_WITH: Regex =
        Regex::new(r#"^starts-with\(\s*@([\w:.-]+)\s*,\s*(?:'([^']*)'|"([^"]*)")\s*\)$"#).unwrap();
    static ref TEXT_EQUALS: Regex =
        Regex::new(r#"^text\(\)\s*=\s*(?:'([^']*)'|"([^"]*)")$"#).unwrap();
    static ref POSITION: Regex = Regex::new(r"^(\d+)$").unwrap();
    static ref LAST: Regex = Regex::new(r"^last\(\)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
    AttrStartsWith(String, String),
    HasClass(String),
    TextEquals(String),
    Position(usize),
    Last,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A parsed XPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    expr: String,
    absolute: bool,
    steps: Vec<Step>,
}

fn unsupported(selector: &str, message: impl Into<String>) -> Error {
    Error::Selector {
        selector: selector.to_string(),
        message: message.into(),
    }
}

fn quoted(caps: &regex::Captures<'_>, first: usize) -> String {
    caps.get(first)
        .or_else(|| caps.get(first + 1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

impl XPath {
    /// Parses an expression, rejecting anything outside the supported subset.
    pub fn parse(expr: &str) -> Result<Self> {
        let src = expr.trim();
        if src.is_empty() {
            return Err(unsupported(expr, "empty expression"));
        }

        let (absolute, mut axis, mut rest) = if let Some(r) = src.strip_prefix("//") {
            (true, Axis::Descendant, r)
        } else if let Some(r) = src.strip_prefix('/') {
            (true, Axis::Child, r)
        } else if let Some(r) = src.strip_prefix(".//") {
            (false, Axis::Descendant, r)
        } else if let Some(r) = src.strip_prefix("./") {
            (false, Axis::Child, r)
        } else {
            (false, Axis::Child, src)
        };

        let mut steps = Vec::new();
        if absolute && rest.is_empty() && axis == Axis::Child {
            return Ok(Self {
                expr: src.to_string(),
                absolute,
                steps,
            });
        }

        loop {
            let (test, after) = parse_node_test(expr, rest)?;
            rest = after;

            let mut predicates = Vec::new();
            while rest.starts_with('[') {
                let close = matching_bracket(rest)
                    .ok_or_else(|| unsupported(expr, "unbalanced '['"))?;
                predicates.extend(parse_predicate(expr, &rest[1..close])?);
                rest = &rest[close + 1..];
            }
            steps.push(Step {
                axis,
                test,
                predicates,
            });

            if rest.is_empty() {
                break;
            }
            if let Some(r) = rest.strip_prefix("//") {
                axis = Axis::Descendant;
                rest = r;
            } else if let Some(r) = rest.strip_prefix('/') {
                axis = Axis::Child;
                rest = r;
            } else {
                return Err(unsupported(expr, format!("unexpected '{}'", rest)));
            }
        }

        Ok(Self {
            expr: src.to_string(),
            absolute,
            steps,
        })
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Runs the expression; results are unique and in document order.
    pub fn evaluate(&self, tree: &DomTree, context: NodeId) -> Vec<NodeId> {
        let start = if self.absolute { tree.root() } else { context };
        let mut current = vec![start];

        for (i, step) in self.steps.iter().enumerate() {
            let mut next = Vec::new();
            let mut seen = HashSet::new();

            if i == 0 && start == tree.root() && step.can_use_tag_index() {
                if let NodeTest::Name(name) = &step.test {
                    for &node in tree.index().by_tag(&tree.normalize_name(name)) {
                        if step.predicates.iter().all(|p| p.eval(tree, node, 1, 1)) {
                            next.push(node);
                        }
                    }
                }
                current = next;
                continue;
            }

            for &ctx in &current {
                match step.axis {
                    Axis::Child => step.collect(tree, tree.children(ctx), &mut next, &mut seen),
                    Axis::Descendant => {
                        tree.traverse(ctx, |tree, node| {
                            if matches!(tree.kind(node), NodeKind::Document | NodeKind::Element(_)) {
                                step.collect(tree, tree.children(node), &mut next, &mut seen);
                            }
                        });
                    }
                }
            }
            next.sort_by_key(|&n| tree.index().position(n).unwrap_or(usize::MAX));
            current = next;
        }
        current
    }
}

impl Step {
    fn can_use_tag_index(&self) -> bool {
        self.axis == Axis::Descendant
            && matches!(self.test, NodeTest::Name(_))
            && !self
                .predicates
                .iter()
                .any(|p| matches!(p, Predicate::Position(_) | Predicate::Last))
    }

    fn collect(
        &self,
        tree: &DomTree,
        children: &[NodeId],
        out: &mut Vec<NodeId>,
        seen: &mut HashSet<NodeId>,
    ) {
        let mut group: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|&c| self.test.matches(tree, c))
            .collect();
        for predicate in &self.predicates {
            let size = group.len();
            group = group
                .into_iter()
                .enumerate()
                .filter(|&(i, n)| predicate.eval(tree, n, i + 1, size))
                .map(|(_, n)| n)
                .collect();
        }
        for node in group {
            if seen.insert(node) {
                out.push(node);
            }
        }
    }
}

impl NodeTest {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        match (self, tree.kind(node)) {
            (NodeTest::AnyElement, NodeKind::Element(_)) => true,
            (NodeTest::Text, NodeKind::Text(_)) => true,
            (NodeTest::Name(name), NodeKind::Element(e)) => match tree.mode() {
                DocumentMode::Html => e.name.eq_ignore_ascii_case(name),
                DocumentMode::Xml => e.name == *name,
            },
            _ => false,
        }
    }
}

impl Predicate {
    fn eval(&self, tree: &DomTree, node: NodeId, position: usize, size: usize) -> bool {
        let attr = |name: &str| tree.attribute(node, name);
        match self {
            Predicate::HasAttr(a) => attr(a).is_some(),
            Predicate::AttrEquals(a, v) => attr(a) == Some(v.as_str()),
            Predicate::AttrContains(a, v) => attr(a).map(|x| x.contains(v.as_str())).unwrap_or(false),
            Predicate::AttrStartsWith(a, v) => {
                attr(a).map(|x| x.starts_with(v.as_str())).unwrap_or(false)
            }
            Predicate::HasClass(c) => tree.element(node).map(|e| e.has_class(c)).unwrap_or(false),
            Predicate::TextEquals(v) => tree.text_content(node) == *v,
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
        }
    }
}

fn parse_node_test<'a>(expr: &str, rest: &'a str) -> Result<(NodeTest, &'a str)> {
    if let Some(r) = rest.strip_prefix('*') {
        return Ok((NodeTest::AnyElement, r));
    }
    if let Some(r) = rest.strip_prefix("text()") {
        return Ok((NodeTest::Text, r));
    }
    let starts_ok = rest
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        return Err(unsupported(expr, format!("expected a node test at '{}'", rest)));
    }
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        .unwrap_or(rest.len());
    if rest[end..].starts_with('(') {
        return Err(unsupported(expr, format!("function '{}()' is not supported here", &rest[..end])));
    }
    Ok((NodeTest::Name(rest[..end].to_string()), &rest[end..]))
}

/// Byte index of the `]` closing the `[` at the start of `s`.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on ` and ` outside quotes and parentheses.
fn split_and(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0 && bytes[i..].starts_with(b" and ") => {
                    parts.push(&s[start..i]);
                    i += 5;
                    start = i;
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn parse_predicate(expr: &str, body: &str) -> Result<Vec<Predicate>> {
    split_and(body)
        .into_iter()
        .map(|atom| parse_atom(expr, atom.trim()))
        .collect()
}

fn parse_atom(expr: &str, atom: &str) -> Result<Predicate> {
    if let Some(c) = CLASS_IDIOM.captures(atom) {
        return Ok(Predicate::HasClass(c[1].to_string()));
    }
    if let Some(c) = HAS_ATTR.captures(atom) {
        return Ok(Predicate::HasAttr(c[1].to_string()));
    }
    if let Some(c) = ATTR_EQUALS.captures(atom) {
        return Ok(Predicate::AttrEquals(c[1].to_string(), quoted(&c, 2)));
    }
    if let Some(c) = ATTR_CONTAINS.captures(atom) {
        return Ok(Predicate::AttrContains(c[1].to_string(), quoted(&c, 2)));
    }
    if let Some(c) = ATTR_STARTS_WITH.captures(atom) {
        return Ok(Predicate::AttrStartsWith(c[1].to_string(), quoted(&c, 2)));
    }
    if let Some(c) = TEXT_EQUALS.captures(atom) {
        return Ok(Predicate::TextEquals(quoted(&c, 1)));
    }
    if let Some(c) = POSITION.captures(atom) {
        let n: usize = c[1]
            .parse()
            .map_err(|_| unsupported(expr, format!("bad position '{}'", atom)))?;
        if n == 0 {
            return Err(unsupported(expr, "positions start at 1"));
        }
        return Ok(Predicate::Position(n));
    }
    if LAST.is_match(atom) {
        return Ok(Predicate::Last);
    }
    Err(unsupported(expr, format!("unsupported predicate '[{}]'", atom)))
}

/// Translates a CSS selector into an equivalent XPath expression.
///
/// ```rust
/// use httpstack::dom::css_to_xpath;
///
/// assert_eq!(css_to_xpath("ul#nav > li").unwrap(), "//ul[@id='nav']/li");
/// assert!(css_to_xpath("a:hover").is_err());
/// ```
pub fn css_to_xpath(css: &str) -> Result<String> {
    let spaced = css.replace('>', " > ");
    let mut tokens = spaced.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Err(unsupported(css, "empty selector"));
    }

    let mut xpath = String::new();
    let mut child_next = false;
    let mut first = true;
    for token in tokens {
        if token == ">" {
            if first || child_next {
                return Err(unsupported(css, "misplaced '>'"));
            }
            child_next = true;
            continue;
        }
        xpath.push_str(if child_next { "/" } else { "//" });
        xpath.push_str(&compound_to_xpath(css, token)?);
        child_next = false;
        first = false;
    }
    if child_next {
        return Err(unsupported(css, "selector ends with '>'"));
    }
    Ok(xpath)
}

fn css_ident(s: &str) -> usize {
    s.find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len())
}

fn compound_to_xpath(css: &str, compound: &str) -> Result<String> {
    let mut rest = compound;
    let tag = if let Some(r) = rest.strip_prefix('*') {
        rest = r;
        "*".to_string()
    } else {
        let end = css_ident(rest);
        let tag = rest[..end].to_string();
        rest = &rest[end..];
        if tag.is_empty() {
            "*".to_string()
        } else {
            tag
        }
    };

    let mut predicates = String::new();
    while let Some(c) = rest.chars().next() {
        match c {
            '#' | '.' => {
                let end = css_ident(&rest[1..]) + 1;
                let name = &rest[1..end];
                if name.is_empty() {
                    return Err(unsupported(css, format!("empty name after '{}'", c)));
                }
                if c == '#' {
                    predicates.push_str(&format!("[@id='{}']", name));
                } else {
                    predicates.push_str(&format!(
                        "[contains(concat(' ', normalize-space(@class), ' '), ' {} ')]",
                        name
                    ));
                }
                rest = &rest[end..];
            }
            '[' => {
                let close = rest
                    .find(']')
                    .ok_or_else(|| unsupported(css, "unclosed '['"))?;
                let inner = &rest[1..close];
                match inner.split_once('=') {
                    None => {
                        if css_ident(inner) != inner.len() || inner.is_empty() {
                            return Err(unsupported(css, format!("bad attribute '{}'", inner)));
                        }
                        predicates.push_str(&format!("[@{}]", inner));
                    }
                    Some((name, value)) => {
                        if name.is_empty() || css_ident(name) != name.len() {
                            return Err(unsupported(
                                css,
                                format!("attribute operator in '[{}]' is not supported", inner),
                            ));
                        }
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        if value.contains('\'') {
                            return Err(unsupported(css, "attribute values may not contain quotes"));
                        }
                        predicates.push_str(&format!("[@{}='{}']", name, value));
                    }
                }
                rest = &rest[close + 1..];
            }
            _ => {
                return Err(unsupported(
                    css,
                    format!("'{}' is not supported", rest),
                ))
            }
        }
    }
    Ok(format!("{}{}", tag, predicates))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<html><body>
<ul id="nav"><li class="item first">A</li><li class="item">B</li><li class="itemized">C</li></ul>
<div class="box"><p>one</p><section><p>two</p></section></div>
<a href="https://x.test/a" rel="ext">x</a><a href="/local">y</a>
</body></html>"#;

    fn tree() -> DomTree {
        DomTree::parse(DOC).unwrap()
    }

    fn texts(tree: &DomTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&n| tree.text_content(n)).collect()
    }

    #[test]
    fn test_descendant_and_child_steps() {
        let t = tree();
        assert_eq!(texts(&t, &t.query("//div/p").unwrap()), ["one"]);
        assert_eq!(texts(&t, &t.query("//div//p").unwrap()), ["one", "two"]);
        assert_eq!(t.query("/html/body/ul/li").unwrap().len(), 3);
        assert_eq!(t.query("/").unwrap(), vec![t.root()]);
    }

    #[test]
    fn test_relative_paths_use_context() {
        let t = tree();
        let div = t.query_one("//div").unwrap().unwrap();
        assert_eq!(texts(&t, &t.query_from("p", div).unwrap()), ["one"]);
        assert_eq!(texts(&t, &t.query_from(".//p", div).unwrap()), ["one", "two"]);
    }

    #[test]
    fn test_class_idiom_is_exact_token_match() {
        let t = tree();
        let hits = t
            .query("//li[contains(concat(' ', normalize-space(@class), ' '), ' item ')]")
            .unwrap();
        assert_eq!(texts(&t, &hits), ["A", "B"]);
    }

    #[test]
    fn test_attribute_predicates() {
        let t = tree();
        assert_eq!(t.query("//a[@rel]").unwrap().len(), 1);
        assert_eq!(t.query("//a[@href='/local']").unwrap().len(), 1);
        assert_eq!(t.query("//a[starts-with(@href, 'https')]").unwrap().len(), 1);
        assert_eq!(t.query("//li[contains(@class, 'item')]").unwrap().len(), 3);
        assert_eq!(
            t.query("//li[@class and contains(@class,'first')]").unwrap().len(),
            1
        );
        assert_eq!(texts(&t, &t.query("//li[text()='B']").unwrap()), ["B"]);
    }

    #[test]
    fn test_positional_predicates_are_per_parent() {
        let t = tree();
        assert_eq!(texts(&t, &t.query("//li[1]").unwrap()), ["A"]);
        assert_eq!(texts(&t, &t.query("//li[last()]").unwrap()), ["C"]);
        assert_eq!(texts(&t, &t.query("//p[1]").unwrap()), ["one", "two"]);
        assert_eq!(
            texts(&t, &t.query("//li[contains(@class,'item')][2]").unwrap()),
            ["B"]
        );
    }

    #[test]
    fn test_unsupported_xpath_is_loud() {
        let t = tree();
        for bad in ["", "//li[position() < 2]", "//li | //p", "count(//li)", "//li[@a!='b']"] {
            assert!(
                matches!(t.query(bad), Err(Error::Selector { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_css_translation() {
        assert_eq!(css_to_xpath("p").unwrap(), "//p");
        assert_eq!(css_to_xpath("#nav").unwrap(), "//*[@id='nav']");
        assert_eq!(
            css_to_xpath("div.box p").unwrap(),
            "//div[contains(concat(' ', normalize-space(@class), ' '), ' box ')]//p"
        );
        assert_eq!(css_to_xpath("a[href=\"/local\"]").unwrap(), "//a[@href='/local']");
        assert_eq!(css_to_xpath("ul>li[class]").unwrap(), "//ul/li[@class]");
    }

    #[test]
    fn test_css_selects_same_nodes_as_xpath() {
        let t = tree();
        assert_eq!(texts(&t, &t.select("ul#nav > li.item").unwrap()), ["A", "B"]);
        assert_eq!(texts(&t, &t.select("div > p").unwrap()), ["one"]);
        assert_eq!(texts(&t, &t.select(".box p").unwrap()), ["one", "two"]);
    }

    #[test]
    fn test_unsupported_css_is_loud() {
        for bad in ["a:hover", "li + li", "li ~ li", "a, b", "> a", "a >", "[href^=x]", "p::before"] {
            assert!(
                matches!(css_to_xpath(bad), Err(Error::Selector { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
