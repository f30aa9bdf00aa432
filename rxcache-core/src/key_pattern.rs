//! Key pattern substitution.
//!
//! Request keys are written as patterns with positional placeholders and
//! resolved once, when the request is built:
//!
//! - `{}` takes the next positional argument
//! - `{N}` takes argument `N` (zero-based)
//! - `{{` and `}}` are literal braces
//!
//! Every argument must be used at least once and every placeholder must have
//! an argument.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

use crate::error::ConfigError;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|\{|\}").expect("Invalid key pattern regex")
});

/// Resolve `pattern` against `args`.
pub fn resolve_key(pattern: &str, args: &[&dyn Display]) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(pattern.len());
    let mut used = vec![false; args.len()];
    let mut next_implicit = 0usize;
    let mut highest_requested = 0usize;
    let mut last = 0usize;

    for caps in TOKEN.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&pattern[last..whole.start()]);
        last = whole.end();

        match whole.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            "{" | "}" => {
                return Err(ConfigError::MalformedKeyPattern {
                    pattern: pattern.to_string(),
                    reason: format!("unmatched '{}' at offset {}", whole.as_str(), whole.start()),
                });
            }
            _ => {
                let spec = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let index = if spec.is_empty() {
                    let index = next_implicit;
                    next_implicit += 1;
                    index
                } else {
                    spec.parse::<usize>()
                        .map_err(|_| ConfigError::MalformedKeyPattern {
                            pattern: pattern.to_string(),
                            reason: format!("'{{{spec}}}' is not a positional index"),
                        })?
                };
                let Some(arg) = args.get(index) else {
                    return Err(ConfigError::ArgumentCountMismatch {
                        pattern: pattern.to_string(),
                        expected: highest_requested.max(index.saturating_add(1)),
                        got: args.len(),
                    });
                };
                highest_requested = highest_requested.max(index + 1);
                out.push_str(&arg.to_string());
                used[index] = true;
            }
        }
    }
    out.push_str(&pattern[last..]);

    if used.iter().any(|u| !u) {
        return Err(ConfigError::ArgumentCountMismatch {
            pattern: pattern.to_string(),
            expected: highest_requested,
            got: args.len(),
        });
    }

    Ok(out)
}
