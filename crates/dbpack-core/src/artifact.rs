use serde::Serialize;

use crate::job::{DiagramJob, ExportJob};

/// Which job produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Export(ExportJob),
    Diagram(DiagramJob),
}

/// A named byte payload destined for packaging.
///
/// Artifacts are never mutated once created; packaging only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    bytes: Vec<u8>,
    origin: ArtifactOrigin,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, origin: ArtifactOrigin) -> Self {
        Self {
            name: name.into(),
            bytes,
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn origin(&self) -> &ArtifactOrigin {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
