//! Expression classification.
//!
//! Decides whether one template expression gets its own isolation
//! boundary. Only the expression's outer shape is inspected.

use crate::config::OptOptions;

use super::lexer::{find_close, is_ident_byte};

/// What a template expression is, as far as rewriting cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// An ordinary expression; it gets wrapped.
    Isolate,
    /// Already a call to the isolation primitive.
    AlreadyIsolated,
    /// A call to a pass-through marker.
    PassThrough,
    /// A function literal, i.e. an event handler or callback.
    FunctionLiteral,
    /// A reference to pre-rendered child or slot content.
    ChildContent,
    /// Nothing but whitespace.
    Empty,
}

impl Classification {
    pub fn should_wrap(self) -> bool {
        self == Classification::Isolate
    }
}

pub fn classify(expr: &str, options: &OptOptions) -> Classification {
    let expr = expr.trim();
    if expr.is_empty() {
        Classification::Empty
    } else if is_whole_call(expr, &options.isolate) {
        Classification::AlreadyIsolated
    } else if options.passthrough.iter().any(|name| is_whole_call(expr, name)) {
        Classification::PassThrough
    } else if is_function_literal(expr) {
        Classification::FunctionLiteral
    } else if options
        .child_refs
        .iter()
        .any(|prefix| is_child_ref(expr, prefix))
    {
        Classification::ChildContent
    } else {
        Classification::Isolate
    }
}

/// `name( ... )` with the closing paren ending the expression.
fn is_whole_call(expr: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let Some(rest) = expr.strip_prefix(name) else {
        return false;
    };
    let args = rest.trim_start();
    if !args.starts_with('(') {
        return false;
    }
    let open = expr.len() - args.len();
    find_close(expr, open + 1, b'(', b')') == Some(expr.len() - 1)
}

fn is_function_literal(expr: &str) -> bool {
    let expr = match strip_keyword(expr, "async") {
        Some(rest) => rest,
        None => expr,
    };
    if strip_keyword(expr, "function").is_some() || expr.starts_with("function*") {
        return true;
    }
    split_arrow(expr).is_some()
}

/// Split an arrow function into its parameter list (without parens) and
/// the text after `=>`.
pub(crate) fn split_arrow(src: &str) -> Option<(&str, &str)> {
    let (params, rest) = if src.starts_with('(') {
        let close = find_close(src, 1, b'(', b')')?;
        (&src[1..close], &src[close + 1..])
    } else {
        let ident = ident_len(src);
        if ident == 0 {
            return None;
        }
        src.split_at(ident)
    };
    let body = rest.trim_start().strip_prefix("=>")?;
    Some((params, body))
}

/// Strip a leading keyword followed by a non-identifier character.
pub(crate) fn strip_keyword<'a>(src: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = src.strip_prefix(keyword)?;
    match rest.bytes().next() {
        Some(b) if is_ident_byte(b) => None,
        _ => Some(rest.trim_start()),
    }
}

pub(crate) fn ident_len(src: &str) -> usize {
    let bytes = src.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_digit() => 0,
        _ => bytes.iter().take_while(|&&b| is_ident_byte(b)).count(),
    }
}

/// `prefix` followed only by property accesses: `.x`, `?.x` or `[...]`.
fn is_child_ref(expr: &str, prefix: &str) -> bool {
    let Some(mut rest) = expr.strip_prefix(prefix) else {
        return false;
    };
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("?.").or_else(|| rest.strip_prefix('.')) {
            let after = after.trim_start();
            let len = ident_len(after);
            if len == 0 {
                return false;
            }
            rest = &after[len..];
        } else if rest.starts_with('[') {
            let Some(close) = find_close(rest, 1, b'[', b']') else {
                return false;
            };
            rest = &rest[close + 1..];
        } else {
            return false;
        }
    }
}
