use crate::orchestration::error::OrchestratorError;
use crate::orchestration::provenance::CallTree;
use crate::shared::atomic_write_file;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactArgument {
    pub argument_name: String,
    pub argument_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub tool_name: String,
    pub arguments: Vec<ArtifactArgument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalArtifact {
    pub entries: Vec<ArtifactEntry>,
}

impl FinalArtifact {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_pretty_json(&self) -> Result<String, OrchestratorError> {
        serde_json::to_string_pretty(self).map_err(OrchestratorError::ArtifactEncode)
    }
}

/// One entry per recorded call, in call order. Arguments bound to an earlier call render as
/// their back-reference token; the rest keep their literal value.
pub fn assemble(tree: &CallTree) -> FinalArtifact {
    let entries = tree
        .records()
        .iter()
        .map(|record| ArtifactEntry {
            tool_name: record.api_name.clone(),
            arguments: record
                .arguments
                .iter()
                .map(|argument| ArtifactArgument {
                    argument_name: argument.name.clone(),
                    argument_value: match &argument.reference {
                        Some(reference) => Value::String(reference.to_string()),
                        None => argument.value.clone(),
                    },
                })
                .collect(),
        })
        .collect();
    FinalArtifact { entries }
}

pub fn persist_artifact(artifact: &FinalArtifact, path: &Path) -> Result<(), OrchestratorError> {
    let body = serde_json::to_vec_pretty(artifact).map_err(OrchestratorError::ArtifactEncode)?;
    atomic_write_file(path, &body).map_err(|source| OrchestratorError::ArtifactWrite {
        path: path.display().to_string(),
        source,
    })
}
