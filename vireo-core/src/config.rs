//! Configuration
//!
//! Both the runtime and the rewriter take plain option structs. They
//! deserialize from JSON with every field optional, so an embedder can ship
//! a partial config file and get defaults for the rest.

use serde::{Deserialize, Serialize};

/// Default cap on flush rounds before a pass is treated as a cycle.
pub const DEFAULT_MAX_FLUSH_ITERATIONS: usize = 100;

/// Runtime tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of drain rounds in one flush.
    ///
    /// Each round runs every effect queued at its start. Effects that
    /// write state enqueue more effects for the next round.
    pub max_flush_iterations: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_iterations: DEFAULT_MAX_FLUSH_ITERATIONS,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Options for the template rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptOptions {
    /// Identifier of the template tag, e.g. `html` in `` html`<p>${x}</p>` ``.
    pub tag: String,

    /// Identifier of the isolation primitive inserted around expressions.
    pub isolate: String,

    /// Call names whose results must reach the template untouched.
    pub passthrough: Vec<String>,

    /// Expression prefixes that refer to pre-rendered child or slot content.
    pub child_refs: Vec<String>,

    /// Fail on unterminated input instead of emitting it verbatim.
    pub strict: bool,
}

impl Default for OptOptions {
    fn default() -> Self {
        Self {
            tag: "html".to_string(),
            isolate: "contain".to_string(),
            passthrough: vec!["raw".to_string()],
            child_refs: vec![
                "this.props.children".to_string(),
                "this.props.slots".to_string(),
                "children".to_string(),
                "slots".to_string(),
            ],
            strict: false,
        }
    }
}

impl OptOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
