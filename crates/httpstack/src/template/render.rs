// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Placeholder substitution over serialized markup.
//!
//! Rendering runs four passes over the document text, in this order:
//!
//! 1. `{{ name(arg, 'arg') }}` calls a registered function; output is inserted raw
//! 2. `{{ key }}` / `{{ a.b.c }}` inserts the HTML-escaped value
//! 3. `{{ if key }} ... {{ else }} ... {{ endif }}` keeps the first branch when
//!    the value is truthy and the optional second one otherwise
//! 4. `{{ foreach list as item }} ... {{ endforeach }}` repeats its content
//!
//! Placeholders that do not resolve stay in the output verbatim.

use super::TemplateFn;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;

lazy_static! {
    static ref FUNCTION_CALL: Regex = Regex::new(r"\{\{\s*(\w+)\s*\(([^}]*)\)\s*\}\}").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z_][\w.-]*)\s*\}\}").unwrap();
    static ref CONDITIONAL: Regex =
        Regex::new(r"(?s)\{\{\s*if\s+(!?)\s*([A-Za-z_][\w.-]*)\s*\}\}(.*?)\{\{\s*endif\s*\}\}").unwrap();
    static ref ELSE: Regex = Regex::new(r"\{\{\s*else\s*\}\}").unwrap();
    static ref LOOP: Regex = Regex::new(
        r"(?s)\{\{\s*foreach\s+([A-Za-z_][\w.-]*)\s+as\s+([A-Za-z_]\w*)\s*\}\}(.*?)\{\{\s*endforeach\s*\}\}"
    )
    .unwrap();
}

/// Block keywords that are never treated as value placeholders.
const RESERVED: &[&str] = &["endif", "endforeach", "else"];

/// Looks up a dotted path (`user.name`, `items.0`) in `data`.
pub fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Emptiness test used by conditionals.
///
/// Missing, `null`, `false`, `0`, `""`, `"0"`, `[]` and `{}` are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Text form of a value: strings as-is, `null` empty, composites as JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Escapes `& < > " '` for safe insertion into markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits `a, 'b, c', "d"` into `["a", "b, c", "d"]`.
pub fn split_arguments(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in args.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => out.push(std::mem::take(&mut current).trim().to_string()),
            (None, c) => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() || !out.is_empty() {
        out.push(last.to_string());
    }
    out
}

pub(crate) fn apply_functions(html: &str, functions: &HashMap<String, TemplateFn>) -> String {
    FUNCTION_CALL
        .replace_all(html, |caps: &Captures<'_>| match functions.get(&caps[1]) {
            Some(f) => f(&split_arguments(&caps[2])),
            None => {
                tracing::debug!("Unbound template function '{}'", &caps[1]);
                caps[0].to_string()
            }
        })
        .into_owned()
}

pub(crate) fn apply_values(html: &str, data: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(html, |caps: &Captures<'_>| {
            let key = &caps[1];
            if RESERVED.contains(&key) {
                return caps[0].to_string();
            }
            match lookup(data, key) {
                Some(value) => escape_html(&display(value)),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub(crate) fn apply_conditionals(html: &str, data: &Map<String, Value>) -> String {
    CONDITIONAL
        .replace_all(html, |caps: &Captures<'_>| {
            let negate = !caps[1].is_empty();
            let mut branches = ELSE.splitn(&caps[3], 2);
            let then = branches.next().unwrap_or_default();
            if is_truthy(lookup(data, &caps[2])) != negate {
                then.to_string()
            } else {
                branches.next().unwrap_or_default().to_string()
            }
        })
        .into_owned()
}

pub(crate) fn apply_loops(html: &str, data: &Map<String, Value>) -> String {
    LOOP.replace_all(html, |caps: &Captures<'_>| {
        let items = match lookup(data, &caps[1]) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(map)) => map.values().cloned().collect(),
            Some(_) | None => return String::new(),
        };
        let alias = &caps[2];
        let body = &caps[3];
        items
            .iter()
            .map(|item| render_item(body, alias, item))
            .collect::<String>()
    })
    .into_owned()
}

fn render_item(body: &str, alias: &str, item: &Value) -> String {
    let mut scope = Map::new();
    scope.insert(alias.to_string(), item.clone());
    PLACEHOLDER
        .replace_all(body, |caps: &Captures<'_>| {
            let key = &caps[1];
            let own = key == alias || key.starts_with(&format!("{}.", alias));
            match lookup(&scope, key).filter(|_| own) {
                Some(value) => escape_html(&display(value)),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn test_values_are_escaped_and_unknown_kept() {
        let d = data(json!({"name": "<Bob & Co>", "user": {"age": 30}}));
        assert_eq!(
            apply_values("{{ name }}|{{user.age}}|{{ missing }}|{{ endif }}", &d),
            "&lt;Bob &amp; Co&gt;|30|{{ missing }}|{{ endif }}"
        );
    }

    #[test]
    fn test_composite_values_render_as_json() {
        let d = data(json!({"list": [1, 2], "flag": true, "none": null}));
        assert_eq!(apply_values("{{ flag }}{{ none }}", &d), "true");
        assert_eq!(apply_values("{{ list }}", &d), "[1,2]");
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!("0"), json!([]), json!({})] {
            assert!(!is_truthy(Some(&falsy)), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("no"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(Some(&truthy)), "{truthy} should be truthy");
        }
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_conditionals() {
        let d = data(json!({"admin": true, "guest": false}));
        let html = "{{ if admin }}A{{ endif }}{{ if guest }}G{{ endif }}{{ if !guest }}N{{ endif }}{{ if nope }}X{{ endif }}";
        assert_eq!(apply_conditionals(html, &d), "AN");
    }

    #[test]
    fn test_conditional_else_branch() {
        let d = data(json!({"admin": true, "guest": false}));
        let html = "{{ if admin }}A{{ else }}B{{ endif }}|{{ if guest }}G{{else}}H{{ endif }}|{{ if !admin }}X{{ else }}Y{{ endif }}";
        assert_eq!(apply_conditionals(html, &d), "A|H|Y");
    }

    #[test]
    fn test_loops_bind_item_and_fields() {
        let d = data(json!({
            "nums": [1, 2, 3],
            "users": [{"name": "a"}, {"name": "<b>"}],
            "title": "t"
        }));
        assert_eq!(apply_loops("{{ foreach nums as n }}[{{ n }}]{{ endforeach }}", &d), "[1][2][3]");
        assert_eq!(
            apply_loops("{{ foreach users as u }}{{ u.name }}{{ title }};{{ endforeach }}", &d),
            "a{{ title }};&lt;b&gt;{{ title }};"
        );
        assert_eq!(apply_loops("{{ foreach missing as m }}x{{ endforeach }}", &d), "");
    }

    #[test]
    fn test_functions_receive_split_arguments() {
        let mut functions: HashMap<String, TemplateFn> = HashMap::new();
        functions.insert("join".into(), Arc::new(|args: &[String]| args.join("+")));
        assert_eq!(
            apply_functions("{{ join(a, 'b, c', \"d\") }} {{ other(x) }}", &functions),
            "a+b, c+d {{ other(x) }}"
        );
        assert_eq!(split_arguments(""), Vec::<String>::new());
    }
}
