//! Binding path grammar.
//!
//! ```text
//! indexed  = absolute "[" digits "]" ";list=" digits "/" relative
//! absolute = "/" 1*char
//! relative = 1*char
//! ```
//!
//! Anything else is a direct path. When several `[n];list=m/` groups occur,
//! the right-most one that completes the grammar wins.

use crate::utils::constants::{LIST_MARKER, META_PATH_SEPARATOR};

/// Outcome of classifying an absolute data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Network addressable, carried unchanged.
    Direct(String),
    /// A row inside a registered listing.
    Indexed {
        absolute_path: String,
        row: usize,
        listing_id: usize,
        sub_path: String,
    },
}

/// A path that addresses the data model on one side and the meta model on the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaPathSplit {
    pub data_path: String,
    pub meta_path: String,
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

pub fn parse(path: &str) -> ParsedPath {
    if is_absolute(path) {
        for (marker, _) in path.rmatch_indices(LIST_MARKER) {
            if let Some(indexed) = indexed_at(path, marker) {
                return indexed;
            }
        }
    }
    ParsedPath::Direct(path.to_owned())
}

fn indexed_at(path: &str, marker: usize) -> Option<ParsedPath> {
    let head = path[..marker].strip_suffix(']')?;
    let open = head.rfind('[')?;
    let row = parse_digits(&head[open + 1..])?;

    let absolute_path = &head[..open];
    if absolute_path.len() < 2 {
        return None;
    }

    let tail = &path[marker + LIST_MARKER.len()..];
    let slash = tail.find('/')?;
    let listing_id = parse_digits(&tail[..slash])?;

    let sub_path = &tail[slash + 1..];
    if sub_path.is_empty() {
        return None;
    }

    Some(ParsedPath::Indexed {
        absolute_path: absolute_path.to_owned(),
        row,
        listing_id,
        sub_path: sub_path.to_owned(),
    })
}

fn parse_digits(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Splits at the first `/#`.
///
/// Property segments in front of the first annotation segment (`@...`) of the
/// meta part still navigate the data model, so
/// `/Employees('1')/#Name/@sap:label` becomes data `/Employees('1')/Name` and
/// meta `@sap:label`. Without an annotation segment the meta part is kept whole.
pub fn split_meta_path(path: &str) -> Option<MetaPathSplit> {
    let at = path.find(META_PATH_SEPARATOR)?;
    let data_path = &path[..at];
    let meta_part = &path[at + META_PATH_SEPARATOR.len()..];

    let segments: Vec<&str> = meta_part.split('/').collect();
    match segments.iter().position(|s| s.starts_with('@')) {
        Some(annotation) if annotation > 0 => {
            let navigation = segments[..annotation].join("/");
            Some(MetaPathSplit {
                data_path: join(data_path, &navigation),
                meta_path: segments[annotation..].join("/"),
            })
        }
        _ => Some(MetaPathSplit {
            data_path: data_path.to_owned(),
            meta_path: meta_part.to_owned(),
        }),
    }
}

/// Resolves `path` against the path of a binding context.
///
/// Absolute paths are returned unchanged; a relative path without a base cannot be resolved.
pub fn resolve(path: &str, base: Option<&str>) -> Option<String> {
    if is_absolute(path) {
        return Some(path.to_owned());
    }
    let base = base?;
    if path.is_empty() {
        return Some(base.to_owned());
    }
    Some(join(base, path))
}

fn join(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_owned();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}
