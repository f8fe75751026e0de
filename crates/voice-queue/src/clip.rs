//! Clip references and locator resolution.
//!
//! A clip is addressed by an opaque locator (file path or `file://` URI) plus an
//! extension tag that doubles as the decoder hint.

use serde::{Deserialize, Serialize};

/// Locator for one audio clip. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipReference {
    locator: String,
    extension: String,
}

impl ClipReference {
    pub fn new(locator: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            extension: extension.into(),
        }
    }

    /// Build a reference for `identifier` under `base_path` (see [`make_clip_locator`]).
    pub fn resolve(base_path: &str, identifier: &str, extension: &str) -> Self {
        Self::new(make_clip_locator(base_path, identifier, extension), extension)
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl std::fmt::Display for ClipReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.locator)
    }
}

/// Concatenate `base_path`, `identifier_path` and `.extension`.
///
/// No separator is inserted, so `base_path` carries its own trailing slash
/// (`"mp3/"` + `"piece/knight"` + `"mp3"` gives `"mp3/piece/knight.mp3"`).
pub fn make_clip_locator(base_path: &str, identifier_path: &str, extension: &str) -> String {
    format!("{base_path}{identifier_path}.{extension}")
}

/// Resolve an ordered list of clip identifiers into references.
pub fn resolve_clips<I, S>(identifiers: I, base_path: &str, extension: &str) -> Vec<ClipReference>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    identifiers
        .into_iter()
        .map(|id| ClipReference::resolve(base_path, id.as_ref(), extension))
        .collect()
}
