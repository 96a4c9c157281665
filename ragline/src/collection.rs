//! Collection naming.

use std::path::Path;

/// Turn an arbitrary label into an identifier-safe collection name.
///
/// Whitespace, dots and hyphens become underscores, every other character
/// outside `[A-Za-z0-9_]` is dropped and the result is lowercased. The
/// function is idempotent.
pub fn sanitize_collection_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || c == '.' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Collection name for a source under the per-source policy: the sanitized
/// file name without its extension.
///
/// Returns `None` when nothing identifier-safe is left.
pub fn collection_name_for_source(source: &Path) -> Option<String> {
    let stem = source.file_stem()?.to_string_lossy();
    let name = sanitize_collection_name(&stem);
    if name.is_empty() { None } else { Some(name) }
}
