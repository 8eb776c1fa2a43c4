//! `$(name)` marker substitution for coarse host-side text generation.
//!
//! Kept apart from the typed pipeline: it only rewrites text and never sees
//! an AST. Numeric markers such as `$(0)` are call-argument slots and pass
//! through untouched, as do markers with nested or unbalanced parentheses.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\$\(([A-Za-z_]\w*)\)").expect("marker pattern is valid"))
}

/// Replace every `$(identifier)` in `template` with `lookup(identifier)`.
///
/// Lookup failures propagate; text without markers is returned unchanged.
pub fn print_subs<F>(template: &str, mut lookup: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let regex = marker_regex();
    let mut output = String::with_capacity(template.len());
    let mut last = 0;
    for captures in regex.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        output.push_str(&template[last..whole.start()]);
        output.push_str(&lookup(name.as_str())?);
        last = whole.end();
    }
    output.push_str(&template[last..]);
    Ok(output)
}

/// Names referenced by `$(identifier)` markers, in order of appearance.
pub fn marker_names(template: &str) -> Vec<&str> {
    marker_regex()
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace `$(0)`, `$(1)`, ... with the given call arguments.
pub fn substitute_args(template: &str, args: &[String]) -> String {
    let mut output = template.to_string();
    // Highest index first so `$(1)` never clobbers part of `$(10)`.
    for (i, arg) in args.iter().enumerate().rev() {
        output = output.replace(&format!("$({})", i), arg);
    }
    output
}
