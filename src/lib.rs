//! Placeholder root package whose sole purpose is to host the workspace-level
//! integration tests under `tests/`.
