//! Artifact files
//!
//! The daemon runs next to the media server and shares its filesystem, so
//! `.strm` artifacts are read straight from disk.

use async_trait::async_trait;
use tracing::debug;

use watchparty_core::artifact::parse_target;
use watchparty_core::ArtifactReader;

/// Reads artifacts from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactFiles;

#[async_trait]
impl ArtifactReader for ArtifactFiles {
    async fn read_target(&self, path: &str) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => parse_target(&body),
            Err(e) => {
                debug!("Could not read artifact {}: {}", path, e);
                None
            }
        }
    }
}
