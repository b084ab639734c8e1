//! Submission collaborator boundary for the text and modeling domains.
//!
//! The engine receives one candidate per eligible participant; where those
//! candidates come from is behind [`SubmissionSource`]. The bundled
//! [`FsSubmissionSource`] reads a manifest plus content files from the local
//! storage root (`exercise-<id>/submissions/manifest.json`).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::CandidateSubmission;
use crate::error::DetectionError;

#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Latest submission per eligible participant, with elements attached.
    async fn latest_submissions(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<CandidateSubmission>, DetectionError>;
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    submission_ref: i64,
    participant: String,
    #[serde(default)]
    student_login: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    /// Content file, relative to the submissions directory.
    file: String,
}

pub struct FsSubmissionSource {
    storage_root: PathBuf,
}

impl FsSubmissionSource {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }
}

#[async_trait]
impl SubmissionSource for FsSubmissionSource {
    async fn latest_submissions(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<CandidateSubmission>, DetectionError> {
        let dir = self
            .storage_root
            .join(format!("exercise-{exercise_id}"))
            .join("submissions");
        let manifest = dir.join("manifest.json");
        let raw = tokio::fs::read_to_string(&manifest).await?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&raw).map_err(|e| {
            DetectionError::ExternalTool(format!(
                "invalid submission manifest {}: {e}",
                manifest.display()
            ))
        })?;

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let content = tokio::fs::read_to_string(dir.join(&entry.file)).await?;
            let elements: Vec<String> = content
                .split_whitespace()
                .map(str::to_string)
                .collect();
            out.push(CandidateSubmission {
                submission_ref: entry.submission_ref,
                participant: entry.participant,
                student_login: entry.student_login,
                score: entry.score,
                size: elements.len() as i64,
                elements,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_manifest_and_tokenizes_content() {
        let storage = tempfile::tempdir().expect("storage");
        let dir = storage.path().join("exercise-3/submissions");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("alice.txt"), "one two three").expect("write");
        std::fs::write(
            dir.join("manifest.json"),
            r#"[{"submission_ref": 9, "participant": "alice", "student_login": "alice", "score": 95.0, "file": "alice.txt"}]"#,
        )
        .expect("manifest");

        let source = FsSubmissionSource::new(storage.path());
        let candidates = source.latest_submissions(3).await.expect("load");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].elements, vec!["one", "two", "three"]);
        assert_eq!(candidates[0].size, 3);
    }
}
