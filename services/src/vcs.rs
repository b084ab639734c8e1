//! Version-control / file-fetch collaborator boundary.
//!
//! The engine never talks to a VCS directly; it goes through these traits so
//! the real fetch layer (and test fakes) can be injected. The bundled
//! [`FsWorkingCopyProvider`] serves working copies from a local storage root
//! laid out as `exercise-<id>/{participations.json,repos/<participant>,template}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Reference to one participant's latest graded participation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipationRef {
    pub participation_id: i64,
    /// Identity used for pair distinctness (login or team name).
    pub participant: String,
    /// Singular student behind the participation, when resolvable.
    pub student_login: Option<String>,
    pub submission_ref: i64,
    pub score: Option<f64>,
    pub repository_uri: Option<String>,
    #[serde(default)]
    pub practice_mode: bool,
}

/// A checked-out copy on local disk.
#[derive(Clone, Debug)]
pub struct WorkingCopy {
    pub participant: String,
    pub path: PathBuf,
}

#[async_trait]
pub trait ParticipationSource: Send + Sync {
    async fn participations_for_exercise(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<ParticipationRef>, DetectionError>;
}

#[async_trait]
pub trait WorkingCopyProvider: Send + Sync {
    async fn fetch_working_copy(
        &self,
        exercise_id: i64,
        participation: &ParticipationRef,
        target: &Path,
    ) -> Result<WorkingCopy, DetectionError>;

    /// The exercise's template/reference copy, if it has one.
    async fn fetch_template_copy(
        &self,
        exercise_id: i64,
        target: &Path,
    ) -> Result<Option<WorkingCopy>, DetectionError>;

    async fn reset_to_clean_state(&self, copy: &WorkingCopy) -> Result<(), DetectionError>;

    async fn delete_working_copy(&self, copy: &WorkingCopy) -> Result<(), DetectionError>;
}

/// Filesystem-backed provider. "Fetching" copies the stored participation
/// material into the analysis target directory, which also makes reset
/// trivial: a fresh copy is always clean.
pub struct FsWorkingCopyProvider {
    storage_root: PathBuf,
}

impl FsWorkingCopyProvider {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    fn exercise_dir(&self, exercise_id: i64) -> PathBuf {
        self.storage_root.join(format!("exercise-{exercise_id}"))
    }
}

#[async_trait]
impl ParticipationSource for FsWorkingCopyProvider {
    async fn participations_for_exercise(
        &self,
        exercise_id: i64,
    ) -> Result<Vec<ParticipationRef>, DetectionError> {
        let manifest = self.exercise_dir(exercise_id).join("participations.json");
        let raw = tokio::fs::read_to_string(&manifest).await?;
        serde_json::from_str(&raw).map_err(|e| {
            DetectionError::ExternalTool(format!(
                "invalid participation manifest {}: {e}",
                manifest.display()
            ))
        })
    }
}

#[async_trait]
impl WorkingCopyProvider for FsWorkingCopyProvider {
    async fn fetch_working_copy(
        &self,
        exercise_id: i64,
        participation: &ParticipationRef,
        target: &Path,
    ) -> Result<WorkingCopy, DetectionError> {
        let source = self
            .exercise_dir(exercise_id)
            .join("repos")
            .join(&participation.participant);
        let dest = target.join(&participation.participant);
        copy_dir(&source, &dest).await?;
        Ok(WorkingCopy {
            participant: participation.participant.clone(),
            path: dest,
        })
    }

    async fn fetch_template_copy(
        &self,
        exercise_id: i64,
        target: &Path,
    ) -> Result<Option<WorkingCopy>, DetectionError> {
        let source = self.exercise_dir(exercise_id).join("template");
        if !source.is_dir() {
            return Ok(None);
        }
        let dest = target.join("template");
        copy_dir(&source, &dest).await?;
        Ok(Some(WorkingCopy {
            participant: "template".to_string(),
            path: dest,
        }))
    }

    async fn reset_to_clean_state(&self, _copy: &WorkingCopy) -> Result<(), DetectionError> {
        // A fetched copy is always pristine; nothing to reset.
        Ok(())
    }

    async fn delete_working_copy(&self, copy: &WorkingCopy) -> Result<(), DetectionError> {
        tokio::fs::remove_dir_all(&copy.path).await?;
        Ok(())
    }
}

/// Recursive copy, run on the blocking pool.
async fn copy_dir(source: &Path, dest: &Path) -> Result<(), DetectionError> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_dir_sync(&source, &dest))
        .await
        .map_err(|e| DetectionError::ExternalTool(format!("copy task panicked: {e}")))?
}

fn copy_dir_sync(source: &Path, dest: &Path) -> Result<(), DetectionError> {
    if !source.is_dir() {
        return Err(DetectionError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no working copy material at {}", source.display()),
        )));
    }
    for entry in walkdir::WalkDir::new(source).into_iter().filter_map(|e| e.ok()) {
        let rel = match entry.path().strip_prefix(source) {
            Ok(r) if !r.as_os_str().is_empty() => r,
            _ => continue,
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
