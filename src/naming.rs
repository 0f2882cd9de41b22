//! Ordering prefixes and slugs for vault entry names.
//!
//! Vault authors order folders and notes with a numeric prefix
//! (`010-tech/001-intro.md`). The prefix orders the listing; it is not part of
//! the published path. This module splits the prefix off and turns what
//! remains into a URL-safe slug:
//!
//! - `010-tech` → order 10, name `tech`
//! - `001-Hello-World.md` → order 1, name `Hello-World.md`, slug `hello-world`
//! - `drafts` → no order, name `drafts`
//! - `2024` → order 2024, name `2024` (a bare number stays a name)

/// An entry name split into its ordering prefix and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedName {
    pub order: Option<u32>,
    pub name: String,
}

/// Split `NNN-name` into `(NNN, name)`.
///
/// A bare number or a prefix with nothing after the dash keeps the full
/// input as its name, so `2024/` and `01-/` never publish to an empty
/// segment.
pub fn split_order_prefix(entry: &str) -> OrderedName {
    if let Some((prefix, rest)) = entry.split_once('-')
        && !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_digit())
        && let Ok(order) = prefix.parse::<u32>()
        && !rest.is_empty()
    {
        return OrderedName {
            order: Some(order),
            name: rest.to_string(),
        };
    }
    OrderedName {
        order: entry.parse::<u32>().ok(),
        name: entry.to_string(),
    }
}

const MAX_SLUG_LEN: usize = 80;

/// Lowercase URL slug.
///
/// - ASCII alphanumerics kept (lowercased), everything else becomes a dash
/// - Consecutive dashes collapse, leading/trailing dashes are stripped
/// - Truncated to 80 characters at the last dash before the limit
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Published form of one path component: ordering prefix dropped, stem
/// slugged, extension kept. Falls back to the raw name when slugging would
/// leave nothing (`日本語.md`).
pub fn publish_component(entry: &str, is_folder: bool) -> String {
    let OrderedName { name, .. } = split_order_prefix(entry);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !is_folder && !stem.is_empty() => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };
    let slug = slugify(stem);
    let stem = if slug.is_empty() { stem.to_string() } else { slug };
    match ext {
        Some(ext) => format!("{stem}.{}", ext.to_lowercase()),
        None => stem,
    }
}
