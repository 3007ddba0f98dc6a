//! Template Expression Isolation
//!
//! Rewrites the source of a template-producing function so each
//! interpolated expression gets its own reactive scope:
//!
//! ```text
//! html`<p>${a + b}</p>`   ->   html`<p>${contain(() => (a + b))}</p>`
//! ```
//!
//! # Pipeline
//!
//! 1. **Normalize** the function to block-bodied `function` form.
//! 2. **Scan** for tagged templates and record their `${...}` expressions.
//! 3. **Classify** each expression. Callbacks, existing isolation calls,
//!    pass-through markers and child content are left alone.
//! 4. **Rewrite** the rest back to front, so earlier offsets stay valid.
//!    A wrapped expression has its own nested templates rewritten first.
//!
//! The isolation primitive and the tag are only names here; both come from
//! [`OptOptions`]. The output is meant to be evaluated in the scope the
//! original function was defined in.
//!
//! # Malformed input
//!
//! An expression or template that never closes is emitted verbatim to the
//! end of the source and logged. With [`OptOptions::strict`] it is an error
//! instead.

mod classify;
mod lexer;
mod normalize;

pub use classify::{classify, Classification};
pub use lexer::ExpressionRecord;
pub use normalize::normalize;

use tracing::{debug, warn};

use crate::config::OptOptions;
use crate::error::OptError;

/// Rewrite `source` with the default options.
pub fn opt(source: &str) -> Result<String, OptError> {
    opt_with(source, &OptOptions::default())
}

/// Rewrite `source`.
pub fn opt_with(source: &str, options: &OptOptions) -> Result<String, OptError> {
    let normalized = match normalize(source) {
        Ok(normalized) => normalized,
        Err(err) if options.strict => return Err(err),
        Err(err) => {
            warn!(%err, "rewriting source as given");
            source.to_owned()
        }
    };
    rewrite(&normalized, options)
}

/// The direct expressions of every tagged template in `source`, in source
/// order. The source is not normalized first.
pub fn extract_expressions(source: &str, options: &OptOptions) -> Vec<ExpressionRecord> {
    lexer::scan(source, &options.tag).records
}

/// Wrap the eligible expressions of `src` without normalizing it.
fn rewrite(src: &str, options: &OptOptions) -> Result<String, OptError> {
    let scan = lexer::scan(src, &options.tag);
    if let Some(err) = scan.error {
        if options.strict {
            return Err(err);
        }
        warn!(%err, "unterminated input emitted verbatim");
    }

    let mut out = src.to_owned();
    for record in scan.records.iter().rev() {
        if !record.terminated {
            continue;
        }
        let class = classify(&record.text, options);
        debug!(start = record.start, ?class, "template expression");
        if !class.should_wrap() {
            continue;
        }

        let inner = rewrite(&record.text, options)?;
        let wrapped = format!("${{{}(() => ({}))}}", options.isolate, inner);
        out.replace_range(record.start..record.end, &wrapped);
    }
    Ok(out)
}
