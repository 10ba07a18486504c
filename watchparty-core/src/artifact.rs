//! Artifact Access
//!
//! Indirection artifacts are small text files whose first meaningful line
//! is the path of the content they stand for. Reading them is the only way
//! to match an artifact that was not generated for a party. The host owns
//! the files; the core reads them through [`ArtifactReader`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

/// Read access to indirection artifacts
#[async_trait]
pub trait ArtifactReader: Send + Sync {
    /// Target path stored in the artifact at `path`, if it can be read
    async fn read_target(&self, path: &str) -> Option<String>;
}

/// First non-empty line of an artifact body
pub fn parse_target(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Artifacts held in memory
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    targets: RwLock<HashMap<String, String>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, target: impl Into<String>) {
        self.targets.write().insert(path.into(), target.into());
    }
}

#[async_trait]
impl ArtifactReader for MemoryArtifacts {
    async fn read_target(&self, path: &str) -> Option<String> {
        self.targets.read().get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_skips_blank_lines() {
        assert_eq!(parse_target("\n  /movies/Film.mkv  \n/other").as_deref(), Some("/movies/Film.mkv"));
        assert_eq!(parse_target(" \n\n"), None);
    }

    #[tokio::test]
    async fn test_memory_artifacts() {
        let artifacts = MemoryArtifacts::new();
        artifacts.insert("/lib/Film.strm", "/movies/Film.mkv");

        assert_eq!(artifacts.read_target("/lib/Film.strm").await.as_deref(), Some("/movies/Film.mkv"));
        assert_eq!(artifacts.read_target("/lib/Other.strm").await, None);
    }
}
