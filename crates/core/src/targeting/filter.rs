//! Split selection by density and language targeting.
//!
//! All functions here are pure. Manifest anomalies never surface as errors:
//! a node with an unexpected shape contributes nothing and the walk moves on.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use super::manifest::{ArtifactDescription, GeneratedArtifactSet, SplitArtifact};
use super::TargetingSelection;

/// Flatten `targetingInfo.variant[].apkSet[].apkDescription[]` into
/// descriptions that carry a split identifier.
pub fn extract_artifact_descriptions(manifest: &GeneratedArtifactSet) -> Vec<ArtifactDescription> {
    let variants = match manifest.targeting_info.get("variant").and_then(Value::as_array) {
        Some(variants) => variants,
        None => {
            debug!("Manifest has no targeting variants");
            return Vec::new();
        }
    };

    variants
        .iter()
        .flat_map(|variant| array_field(variant, "apkSet"))
        .flat_map(|apk_set| array_field(apk_set, "apkDescription"))
        .filter_map(parse_description)
        .collect()
}

/// Split identifiers whose first listed density alias is desired.
pub fn select_by_density(
    descriptions: &[ArtifactDescription],
    desired_densities: &HashSet<String>,
) -> Vec<String> {
    descriptions
        .iter()
        .filter(|d| {
            d.density
                .as_ref()
                .is_some_and(|density| desired_densities.contains(density))
        })
        .map(|d| d.split_id.clone())
        .collect()
}

/// Split identifiers whose first listed language code is desired.
pub fn select_by_language(
    descriptions: &[ArtifactDescription],
    desired_languages: &HashSet<String>,
) -> Vec<String> {
    descriptions
        .iter()
        .filter(|d| {
            d.language
                .as_ref()
                .is_some_and(|language| desired_languages.contains(language))
        })
        .map(|d| d.split_id.clone())
        .collect()
}

/// Map split identifiers back to download identifiers, in manifest order.
///
/// Identifiers with no matching split artifact are dropped.
pub fn resolve_download_ids(manifest: &GeneratedArtifactSet, split_ids: &[String]) -> Vec<String> {
    resolve_split_artifacts(manifest, split_ids)
        .into_iter()
        .map(|artifact| artifact.download_id.clone())
        .collect()
}

/// The split artifacts matching `split_ids`, in manifest order, each at most once.
pub fn resolve_split_artifacts<'a>(
    manifest: &'a GeneratedArtifactSet,
    split_ids: &[String],
) -> Vec<&'a SplitArtifact> {
    let wanted: HashSet<&str> = split_ids.iter().map(String::as_str).collect();
    manifest
        .split_artifacts
        .iter()
        .filter(|artifact| {
            artifact
                .split_id
                .as_deref()
                .is_some_and(|id| wanted.contains(id))
        })
        .collect()
}

/// Everything a job forwards besides the universal artifact: the union of
/// language- and density-selected splits, resolved against the manifest.
pub fn select_split_artifacts<'a>(
    manifest: &'a GeneratedArtifactSet,
    selection: &TargetingSelection,
) -> Vec<&'a SplitArtifact> {
    let descriptions = extract_artifact_descriptions(manifest);
    let mut split_ids = select_by_language(&descriptions, selection.languages());
    split_ids.extend(select_by_density(&descriptions, selection.densities()));

    debug!(
        descriptions = descriptions.len(),
        selected = split_ids.len(),
        "Filtered split descriptions"
    );

    resolve_split_artifacts(manifest, &split_ids)
}

fn array_field<'a>(node: &'a Value, key: &str) -> &'a [Value] {
    node.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn parse_description(node: &Value) -> Option<ArtifactDescription> {
    let split_id = node
        .get("splitApkMetadata")?
        .get("splitId")?
        .as_str()?
        .to_string();
    let targeting = node.get("targeting");

    let density = targeting
        .and_then(|t| t.get("screenDensityTargeting"))
        .and_then(first_value)
        .and_then(|v| v.get("densityAlias"))
        .and_then(Value::as_str)
        .map(String::from);

    let language = targeting
        .and_then(|t| t.get("languageTargeting"))
        .and_then(first_value)
        .and_then(Value::as_str)
        .map(String::from);

    Some(ArtifactDescription {
        split_id,
        density,
        language,
    })
}

fn first_value(targeting: &Value) -> Option<&Value> {
    targeting.get("value")?.as_array()?.first()
}
