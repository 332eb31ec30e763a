//! Output-tag subset of EJS
//!
//! Supported: `<%= path %>` (escaped), `<%- path %>` (raw), `<%# ... %>`,
//! the `<%%` literal and `-%>` newline trimming. A path starts at `data`
//! and continues with `.field`, `[0]` or `['field']` steps.

use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

/// Fill `data` into `template`.
pub fn render(template: &str, data: &Map<String, Value>) -> ApiResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        if let Some(literal) = after_open.strip_prefix('%') {
            out.push_str(OPEN);
            rest = literal;
            continue;
        }

        let end = after_open
            .find(CLOSE)
            .ok_or_else(|| ApiError::improper_payload("The template has an unclosed '<%' tag"))?;
        let tag = &after_open[..end];
        rest = &after_open[end + CLOSE.len()..];

        let (tag, trim_newline) = match tag.strip_suffix('-') {
            Some(t) => (t, true),
            None => (tag, false),
        };

        if let Some(expr) = tag.strip_prefix('=') {
            out.push_str(&escape(&lookup(expr, data)?));
        } else if let Some(expr) = tag.strip_prefix('-') {
            out.push_str(&lookup(expr, data)?);
        } else if tag.starts_with('#') {
            // comment
        } else {
            return Err(ApiError::improper_payload(format!(
                "Unsupported template tag '<%{tag}%>': only output tags are supported"
            )));
        }

        if trim_newline {
            rest = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, PartialEq)]
enum Step<'a> {
    Field(&'a str),
    Index(usize),
}

fn parse_path(expr: &str) -> Option<Vec<Step<'_>>> {
    let expr = expr.trim();
    let mut rest = expr.strip_prefix("data")?;
    let mut steps = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let len = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(after.len());
            if len == 0 {
                return None;
            }
            steps.push(Step::Field(&after[..len]));
            rest = &after[len..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            let inner = after[..close].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            match quoted {
                Some(field) => steps.push(Step::Field(field)),
                None => steps.push(Step::Index(inner.parse().ok()?)),
            }
            rest = &after[close + 1..];
        } else {
            return None;
        }
    }

    Some(steps)
}

fn lookup(expr: &str, data: &Map<String, Value>) -> ApiResult<String> {
    let steps = parse_path(expr).ok_or_else(|| {
        ApiError::improper_payload(format!(
            "Unsupported template expression '{}': only paths into 'data' are supported",
            expr.trim()
        ))
    })?;

    let mut steps = steps.into_iter();
    let mut current = match steps.next() {
        None => return Ok(stringify(&Value::Object(data.clone()))),
        Some(Step::Field(name)) => data.get(name),
        Some(Step::Index(_)) => None,
    };

    for step in steps {
        current = match (current, step) {
            (Some(Value::Object(map)), Step::Field(name)) => map.get(name),
            (Some(Value::Array(items)), Step::Index(i)) => items.get(i),
            _ => None,
        };
    }

    Ok(current.map(stringify).unwrap_or_default())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
