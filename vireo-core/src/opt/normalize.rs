//! Normalization of template function source.
//!
//! Shorthand forms become a block-bodied `function`, so the rewritten
//! source binds `this` the same way whether the original was an arrow or
//! a method:
//!
//! | input                 | output                                  |
//! |-----------------------|-----------------------------------------|
//! | `(p) => expr`         | `function(p) { return (expr); }`        |
//! | `p => expr`           | `function(p) { return (expr); }`        |
//! | `(p) => { body }`     | `function(p) { body }`                  |
//! | `name(p) { body }`    | `function(p) { body }`                  |
//! | `get name() { body }` | `function() { body }`                   |
//! | `function ...`        | unchanged                               |
//!
//! A leading `async` is kept. `static`, `get` and `set` on a method are
//! dropped. An expression body ending in a line comment gets its closing
//! paren on the next line.

use crate::error::OptError;

use super::classify::{ident_len, split_arrow, strip_keyword};
use super::lexer::find_close;

pub fn normalize(src: &str) -> Result<String, OptError> {
    let src = src.trim();
    let (prefix, rest) = match strip_keyword(src, "async") {
        Some(rest) => ("async ", rest),
        None => ("", src),
    };

    if strip_keyword(rest, "function").is_some() || rest.starts_with("function*") {
        return Ok(src.to_owned());
    }

    if let Some((params, body)) = split_arrow(rest) {
        let body = body.trim();
        if let Some(block) = whole_block(body) {
            return Ok(format!("{prefix}function({params}) {block}"));
        }
        let expr = body.trim_end_matches(';').trim_end();
        if expr.is_empty() {
            return Err(OptError::UnrecognizedFunction);
        }
        let close = if closes_on_same_line(expr) { ")" } else { "\n)" };
        return Ok(format!(
            "{prefix}function({params}) {{ return ({expr}{close}; }}"
        ));
    }

    let (params, body) = split_method(rest)
        .or_else(|| split_method(strip_modifiers(rest)))
        .ok_or(OptError::UnrecognizedFunction)?;
    let block = whole_block(body).ok_or(OptError::UnrecognizedFunction)?;
    Ok(format!("{prefix}function({params}) {block}"))
}

/// Whether a `)` written right after `expr` closes the paren opened
/// before it. Not so when `expr` ends in a line comment.
fn closes_on_same_line(expr: &str) -> bool {
    let wrapped = format!("{expr})");
    find_close(&wrapped, 0, b'(', b')') == Some(wrapped.len() - 1)
}

/// Drop `static` and accessor keywords from a class member.
fn strip_modifiers(src: &str) -> &str {
    let src = strip_keyword(src, "static").unwrap_or(src);
    strip_keyword(src, "get")
        .or_else(|| strip_keyword(src, "set"))
        .unwrap_or(src)
}

/// `name(params) body` into `(params, body)`.
fn split_method(src: &str) -> Option<(&str, &str)> {
    let name = ident_len(src);
    if name == 0 {
        return None;
    }
    let after = src[name..].trim_start();
    if !after.starts_with('(') {
        return None;
    }
    let close = find_close(after, 1, b'(', b')')?;
    Some((&after[1..close], after[close + 1..].trim()))
}

/// `src` itself if it is exactly one `{ ... }` block, ignoring a trailing
/// semicolon.
fn whole_block(src: &str) -> Option<&str> {
    if !src.starts_with('{') {
        return None;
    }
    let close = find_close(src, 1, b'{', b'}')?;
    let trailing = src[close + 1..].trim();
    (trailing.is_empty() || trailing == ";").then(|| &src[..=close])
}
