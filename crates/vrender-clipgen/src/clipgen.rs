//! Per-scene clip generation algorithm (§4.5): cache probe, model selection
//! with fallback, submit/poll, and clip blob publication.

use std::time::Duration;

use tracing::{info, warn};
use vrender_models::plan::UserTier;
use vrender_models::scene::Scene;
use vrender_storage::BlobStore;

use crate::error::{ClipGenError, ClipGenResult};
use crate::provider::{ModelEndpoint, ProviderClient, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};

/// Model endpoints configured for clip generation, ordered most- to
/// least-capable within each tier.
#[derive(Debug, Clone)]
pub struct ClipGenConfig {
    pub premium_endpoint: ModelEndpoint,
    pub standard_endpoint: ModelEndpoint,
    pub last_resort_endpoint: ModelEndpoint,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl ClipGenConfig {
    pub fn from_env() -> Self {
        let endpoint = |prefix: &str, default_name: &str, default_url: &str| ModelEndpoint {
            name: std::env::var(format!("{prefix}_MODEL_NAME")).unwrap_or_else(|_| default_name.to_string()),
            base_url: std::env::var(format!("{prefix}_BASE_URL")).unwrap_or_else(|_| default_url.to_string()),
            api_key: std::env::var(format!("{prefix}_API_KEY")).unwrap_or_default(),
        };
        Self {
            premium_endpoint: endpoint("CLIPGEN_PREMIUM", "veo3-premium", "https://provider.example/premium"),
            standard_endpoint: endpoint("CLIPGEN_STANDARD", "veo3-standard", "https://provider.example/standard"),
            last_resort_endpoint: endpoint("CLIPGEN_LAST_RESORT", "veo3-economy", "https://provider.example/economy"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Fallback chain for a scene: primary depends on tier/quality, followed
    /// by the cost-efficient and last-resort candidates (§4.5 step 2). A
    /// caller-supplied `model_override` that names one of the configured
    /// endpoints is promoted to the front of the chain; an override naming
    /// something else is left for the caller to have rejected already.
    fn candidates<'a>(&'a self, tier: UserTier, scene: &Scene, model_override: Option<&str>) -> Vec<&'a ModelEndpoint> {
        let primary = if tier == UserTier::Premium && scene.wants_premium_model() {
            &self.premium_endpoint
        } else {
            &self.standard_endpoint
        };

        let mut chain = vec![primary];
        if !std::ptr::eq(primary, &self.standard_endpoint) {
            chain.push(&self.standard_endpoint);
        }
        chain.push(&self.last_resort_endpoint);

        if let Some(name) = model_override {
            let known = [&self.premium_endpoint, &self.standard_endpoint, &self.last_resort_endpoint];
            if let Some(&matched) = known.iter().find(|m| m.name == name) {
                chain.retain(|m| !std::ptr::eq(*m, matched));
                chain.insert(0, matched);
            }
        }
        chain
    }

    /// Whether `name` refers to one of this config's configured endpoints.
    pub fn is_known_model(&self, name: &str) -> bool {
        [&self.premium_endpoint, &self.standard_endpoint, &self.last_resort_endpoint]
            .iter()
            .any(|m| m.name == name)
    }
}

pub struct ClipGenerator {
    storage: BlobStore,
    provider: ProviderClient,
    config: ClipGenConfig,
}

/// Outcome of generating (or reusing) a scene's clip.
pub struct SceneClip {
    pub scene_index: u32,
    pub clip_path: String,
    pub signed_url: String,
    pub cached: bool,
    pub model: Option<String>,
}

impl ClipGenerator {
    pub fn new(storage: BlobStore, config: ClipGenConfig) -> Self {
        Self {
            storage,
            provider: ProviderClient::new(),
            config,
        }
    }

    fn clip_path(project_id: &str, scene_index: u32) -> String {
        format!("{project_id}/clips/scene-{scene_index}.mp4")
    }

    pub fn config(&self) -> &ClipGenConfig {
        &self.config
    }

    /// Generate (or reuse) the clip for one scene. `image_path` is the blob
    /// path of the scene's source image. `model_override`, when it names a
    /// configured endpoint, is tried before the tier's usual fallback chain.
    pub async fn generate_scene_clip(
        &self,
        project_id: &str,
        tier: UserTier,
        scene: &Scene,
        image_path: &str,
        force: bool,
        model_override: Option<&str>,
    ) -> ClipGenResult<SceneClip> {
        let clip_path = Self::clip_path(project_id, scene.index);

        if !force && self.storage.exists(&clip_path).await? {
            let signed_url = self.storage.signed_url(&clip_path, vrender_storage::INTERNAL_URL_TTL).await?;
            return Ok(SceneClip {
                scene_index: scene.index,
                clip_path,
                signed_url,
                cached: true,
                model: None,
            });
        }

        let image_url = self.storage.signed_url(image_path, vrender_storage::INTERNAL_URL_TTL).await?;
        let duration = scene.clip_duration_seconds();

        let mut last_err = None;
        for model in self.config.candidates(tier, scene, model_override) {
            match self.try_model(model, &scene.prompt, &image_url, duration).await {
                Ok(result_bytes) => {
                    self.storage.upload_bytes(result_bytes, &clip_path, "video/mp4").await?;
                    self.storage.publish(&clip_path).await?;
                    let signed_url = self.storage.signed_url(&clip_path, vrender_storage::INTERNAL_URL_TTL).await?;
                    info!(project_id, scene_index = scene.index, model = %model.name, "clip generated");
                    return Ok(SceneClip {
                        scene_index: scene.index,
                        clip_path,
                        signed_url,
                        cached: false,
                        model: Some(model.name.clone()),
                    });
                }
                Err(e) => {
                    warn!(project_id, scene_index = scene.index, model = %model.name, error = %e, "model candidate failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ClipGenError::NoModelSucceeded { scene_index: scene.index }))
    }

    async fn try_model(
        &self,
        model: &ModelEndpoint,
        prompt: &str,
        image_url: &str,
        duration: u32,
    ) -> ClipGenResult<Vec<u8>> {
        let request_id = self.provider.submit(model, prompt, image_url, duration).await?;
        let result_url = self
            .provider
            .poll_until_complete(model, &request_id, self.config.poll_interval, self.config.poll_timeout)
            .await?;
        self.provider.download_result(&result_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrender_models::scene::{Camera, Transition};

    fn scene(index: u32, quality: Option<vrender_models::scene::SceneQuality>) -> Scene {
        Scene {
            index,
            prompt: "p".into(),
            narration: "n".into(),
            duration_seconds: 5,
            camera: Camera::Static,
            transition: Transition::None,
            quality,
            aspect_ratio: None,
        }
    }

    #[test]
    fn clip_path_is_namespaced_per_project_and_scene() {
        assert_eq!(ClipGenerator::clip_path("proj-1", 3), "proj-1/clips/scene-3.mp4");
    }

    #[test]
    fn premium_tier_with_premium_quality_uses_premium_primary() {
        let config = ClipGenConfig::from_env();
        let s = scene(0, Some(vrender_models::scene::SceneQuality::Premium));
        let chain = config.candidates(UserTier::Premium, &s, None);
        assert_eq!(chain[0].name, config.premium_endpoint.name);
        assert_eq!(chain.last().unwrap().name, config.last_resort_endpoint.name);
    }

    #[test]
    fn free_tier_always_uses_standard_primary() {
        let config = ClipGenConfig::from_env();
        let s = scene(0, None);
        let chain = config.candidates(UserTier::Free, &s, None);
        assert_eq!(chain[0].name, config.standard_endpoint.name);
    }

    #[test]
    fn model_override_is_promoted_to_front_when_known() {
        let config = ClipGenConfig::from_env();
        let s = scene(0, None);
        let chain = config.candidates(UserTier::Free, &s, Some(&config.last_resort_endpoint.name));
        assert_eq!(chain[0].name, config.last_resort_endpoint.name);
        assert_eq!(chain.len(), 2, "overridden candidate must not appear twice");
    }

    #[test]
    fn unknown_model_override_leaves_chain_unchanged() {
        let config = ClipGenConfig::from_env();
        let s = scene(0, None);
        let chain = config.candidates(UserTier::Free, &s, Some("not-a-real-model"));
        assert_eq!(chain[0].name, config.standard_endpoint.name);
    }

    #[test]
    fn is_known_model_reports_configured_endpoints_only() {
        let config = ClipGenConfig::from_env();
        assert!(config.is_known_model(&config.standard_endpoint.name));
        assert!(!config.is_known_model("not-a-real-model"));
    }
}
