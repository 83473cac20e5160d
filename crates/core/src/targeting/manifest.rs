//! Generated APK manifest returned by the store for an (app, version) pair.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The split and universal artifacts the store generated from one bundle.
///
/// Standalone APKs, the certificate hash and per-split variant metadata are
/// present in the store's response but never forwarded, so they are ignored.
///
/// Entry lists are deserialized leniently: an entry that does not have the
/// expected shape is dropped instead of failing the whole manifest. The
/// targeting tree is kept as raw JSON and walked by
/// [`extract_artifact_descriptions`](super::extract_artifact_descriptions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifactSet {
    #[serde(
        rename = "generatedSplitApks",
        default,
        deserialize_with = "lenient_vec"
    )]
    pub split_artifacts: Vec<SplitArtifact>,
    #[serde(
        rename = "generatedUniversalApk",
        default,
        deserialize_with = "lenient_option"
    )]
    pub universal_artifact: Option<UniversalArtifact>,
    #[serde(default)]
    pub targeting_info: Value,
}

/// A split APK; the base split of a module carries no `split_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitArtifact {
    pub download_id: String,
    #[serde(default)]
    pub split_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalArtifact {
    pub download_id: String,
}

/// Targeting metadata for one split, flattened out of the targeting tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescription {
    pub split_id: String,
    /// Alias of the first listed screen density, e.g. `XHDPI`.
    pub density: Option<String>,
    /// First listed language code, e.g. `ru`.
    pub language: Option<String>,
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let entries = match value {
        Value::Array(entries) => entries,
        _ => return Ok(Vec::new()),
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
