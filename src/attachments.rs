//! Photo attachment references and the storage naming scheme.
//!
//! A photo is stored under
//! `{patient}/{consultation}/{stem}_v{version}.{ext}`, every segment slugged
//! through [`slugify`]. Uploading a file whose slugged name already exists
//! for the same consultation bumps the version instead of overwriting.

use crate::normalize::slugify;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

lazy_static! {
    static ref VERSION_SUFFIX: Regex = Regex::new(r"_v([0-9]+)(?:\.[^./]*)?$").unwrap();
}

/// Pointer to a stored photo. Owned by exactly one record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Storage path inside the bucket.
    pub key: String,
    /// Time-limited retrieval URL issued by the storage side.
    pub url: String,
}

/// Storage key for version `version` of `filename`.
///
/// # Examples
/// ```
/// use ophtatrack::attachments::storage_key;
///
/// assert_eq!(
///     storage_key("Dupont Jean", "C-0042", "Fond d'oeil OD.JPG", 2),
///     "dupont-jean/c-0042/fond-d-oeil-od_v2.jpg"
/// );
/// ```
pub fn storage_key(owner: &str, consultation_id: &str, filename: &str, version: u32) -> String {
    format!("{}_v{}.{}", key_stem(owner, consultation_id, filename), version, extension(filename))
}

/// Version number encoded in a storage key, if any.
pub fn parse_version(key: &str) -> Option<u32> {
    VERSION_SUFFIX
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Version to use for a new upload of `filename`: one past the highest
/// version already stored for the same slugged name, starting at 1.
pub fn next_version(
    existing: &[AttachmentRef],
    owner: &str,
    consultation_id: &str,
    filename: &str,
) -> u32 {
    let stem = key_stem(owner, consultation_id, filename);
    let prefix = format!("{stem}_v");

    existing
        .iter()
        .filter(|a| a.key.starts_with(&prefix))
        .filter_map(|a| parse_version(&a.key))
        .max()
        .map_or(1, |v| v.saturating_add(1))
}

fn key_stem(owner: &str, consultation_id: &str, filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    format!(
        "{}/{}/{}",
        non_empty(slugify(owner), "patient"),
        non_empty(slugify(consultation_id), "consultation"),
        non_empty(slugify(stem), "photo")
    )
}

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

fn non_empty(slug: String, fallback: &str) -> String {
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}
