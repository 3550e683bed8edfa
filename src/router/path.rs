//! Segment-wise route template matching.
//!
//! Templates and paths are split on `/` and compared position by position.
//! A template segment starting with `:` binds any single literal segment.
//! There are no catch-all or optional segments, no regex, and no
//! normalization: comparison is case-sensitive and percent-encoding is left
//! untouched.

use std::collections::HashMap;

/// Route parameters bound from the request path, keyed by name without the sigil
pub type Params = HashMap<String, String>;

const PARAM_SIGIL: char = ':';

/// Test whether `path` matches `template`.
///
/// Segment counts must be equal; every non-parameter segment must be
/// identical to the path segment at the same position.
pub fn matches(template: &str, path: &str) -> bool {
    let template_parts: Vec<&str> = template.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if template_parts.len() != path_parts.len() {
        return false;
    }

    template_parts
        .iter()
        .zip(&path_parts)
        .all(|(part, actual)| part.starts_with(PARAM_SIGIL) || part == actual)
}

/// Bind the parameter segments of `template` to the literal segments of `path`.
///
/// Assumes [`matches`] already succeeded. A name that appears twice keeps the
/// value of its last occurrence.
pub fn extract_params(template: &str, path: &str) -> Params {
    let mut params = Params::new();

    for (part, actual) in template.split('/').zip(path.split('/')) {
        if let Some(name) = part.strip_prefix(PARAM_SIGIL) {
            params.insert(name.to_string(), actual.to_string());
        }
    }

    params
}
