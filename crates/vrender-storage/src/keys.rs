//! Blob layout naming conventions (§6): the one place both the worker and the
//! API agree on how a project's objects are named inside the shared bucket.

/// Scene image input, `variant` is typically `"final"` — the frame this
/// subsystem reads when generating a clip for the scene.
pub fn scene_image_key(project_id: &str, scene_index: usize, variant: &str) -> String {
    format!("{project_id}/scene-{scene_index}-{variant}.jpeg")
}

/// Per-scene motion clip produced by the clip generator (C5).
pub fn scene_clip_key(project_id: &str, scene_index: usize) -> String {
    format!("{project_id}/clips/scene-{scene_index}.mp4")
}

pub fn narration_key(project_id: &str) -> String {
    format!("{project_id}/narration.mp3")
}

pub fn music_key(project_id: &str, extension: &str) -> String {
    format!("{project_id}/music.{extension}")
}

pub fn captions_key(project_id: &str) -> String {
    format!("{project_id}/captions.srt")
}

/// Final composed output for a project.
pub fn movie_key(project_id: &str) -> String {
    format!("{project_id}/movie.mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_blob_layout() {
        assert_eq!(scene_image_key("p1", 2, "final"), "p1/scene-2-final.jpeg");
        assert_eq!(scene_clip_key("p1", 2), "p1/clips/scene-2.mp4");
        assert_eq!(movie_key("p1"), "p1/movie.mp4");
        assert_eq!(narration_key("p1"), "p1/narration.mp3");
        assert_eq!(captions_key("p1"), "p1/captions.srt");
    }
}
