//! Programming-domain analysis: downloads one working copy per eligible
//! participation plus the exercise template, runs the external structural
//! tool (template as base code, one retry without it), and converts the
//! tool's report into a stored result. Every acquired copy is scheduled for
//! asynchronous deletion whether the run succeeds or fails.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use db::models::{detection_config, exercise, plagiarism_result};
use futures::stream::{FuturesUnordered, StreamExt};
use sea_orm::DatabaseConnection;
use tokio::sync::Semaphore;

use crate::cache::PlagiarismCache;
use crate::cleanup::CleanupQueue;
use crate::engine::{
    CandidateSubmission, CheckState, ProgressObserver, ScoredComparison, meets_minimum_score,
    similarity_distribution, sort_and_truncate,
};
use crate::error::DetectionError;
use crate::similarity::ElementMatch;
use crate::store;
use crate::structural::{ComparisonResultSet, StructuralComparator, ToolRunOptions};
use crate::vcs::{ParticipationRef, ParticipationSource, WorkingCopy, WorkingCopyProvider};

#[derive(Clone, Debug)]
pub struct ProgrammingCheckSettings {
    pub clone_root: PathBuf,
    pub download_concurrency: usize,
    pub tool_timeout: Duration,
    pub repo_cleanup_delay: Duration,
    pub report_cleanup_delay: Duration,
    pub max_comparisons: usize,
}

pub struct ProgrammingDetectionService {
    db: DatabaseConnection,
    cache: PlagiarismCache,
    participations: Arc<dyn ParticipationSource>,
    working_copies: Arc<dyn WorkingCopyProvider>,
    comparator: Arc<dyn StructuralComparator>,
    observer: Arc<dyn ProgressObserver>,
    cleanup: CleanupQueue,
    settings: ProgrammingCheckSettings,
}

/// A downloaded, size-checked working copy awaiting analysis.
struct DownloadedCopy {
    participation: ParticipationRef,
    copy: WorkingCopy,
    /// Lines differing from the template across the language's source files.
    size: i64,
}

impl DownloadedCopy {
    fn to_candidate(&self) -> CandidateSubmission {
        CandidateSubmission {
            submission_ref: self.participation.submission_ref,
            participant: self.participation.participant.clone(),
            student_login: self.participation.student_login.clone(),
            score: self.participation.score,
            size: self.size,
            // Element-level data stays in the external report; the stored
            // snapshot carries identity and size only.
            elements: Vec::new(),
        }
    }
}

impl ProgrammingDetectionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        cache: PlagiarismCache,
        participations: Arc<dyn ParticipationSource>,
        working_copies: Arc<dyn WorkingCopyProvider>,
        comparator: Arc<dyn StructuralComparator>,
        observer: Arc<dyn ProgressObserver>,
        cleanup: CleanupQueue,
        settings: ProgrammingCheckSettings,
    ) -> Self {
        Self {
            db,
            cache,
            participations,
            working_copies,
            comparator,
            observer,
            cleanup,
            settings,
        }
    }

    /// Downloads all eligible repositories of the exercise and runs the
    /// external structural comparison. Only one check per course may be
    /// active; a concurrent request fails fast with `AlreadyRunning`.
    pub async fn check_exercise(
        &self,
        exercise: &exercise::Model,
        config: &detection_config::Model,
    ) -> Result<plagiarism_result::Model, DetectionError> {
        // Resolve the language before acquiring any resources.
        let language = exercise
            .programming_language
            .as_deref()
            .ok_or_else(|| DetectionError::UnsupportedLanguage("<unset>".to_string()))?;
        let tool_language = tool_language_for(language)?;
        let extensions = source_extensions(language);

        let _guard = self.cache.acquire(exercise.course_id)?;
        let start = Instant::now();

        let participations = self
            .participations
            .participations_for_exercise(exercise.id)
            .await?;
        let eligible: Vec<ParticipationRef> = participations
            .into_iter()
            .filter(|p| !p.practice_mode)
            .filter(|p| p.repository_uri.is_some())
            .filter(|p| meets_minimum_score(p.score, config.minimum_score))
            .collect();
        log::info!(
            "Exercise {}: comparing {} participations after minimum score filter",
            exercise.id,
            eligible.len()
        );
        if eligible.len() < 2 {
            return Err(DetectionError::InsufficientSubmissions {
                available: eligible.len(),
            });
        }

        let target = self
            .settings
            .clone_root
            .join(format!("exercise-{}-{}", exercise.id, Utc::now().timestamp_millis()));
        tokio::fs::create_dir_all(&target).await?;

        let outcome = self
            .analyze(exercise, config, eligible, &target, tool_language, extensions)
            .await;

        // All acquired copies (template included) live under the target
        // directory; schedule its removal on success and failure alike.
        self.cleanup
            .schedule_path_for_deletion(&target, self.settings.repo_cleanup_delay);

        let (result_set, copies) = match outcome {
            Ok(v) => v,
            Err(e) => {
                self.notify(exercise.id, CheckState::Failed, &e.to_string());
                if matches!(e, DetectionError::ExternalTool(_)) {
                    // A failed tool run must not leave a stale result behind.
                    if let Err(purge) =
                        plagiarism_result::Entity::delete_for_exercise(&self.db, exercise.id).await
                    {
                        log::warn!(
                            "Could not purge result of exercise {}: {purge}",
                            exercise.id
                        );
                    }
                }
                return Err(e);
            }
        };

        if let Some(report) = &result_set.report_path {
            self.cleanup
                .schedule_path_for_deletion(report, self.settings.report_cleanup_delay);
        }

        let by_participant: HashMap<&str, &DownloadedCopy> = copies
            .iter()
            .map(|c| (c.participation.participant.as_str(), c))
            .collect();

        let mut comparisons = Vec::new();
        for tool_comparison in &result_set.comparisons {
            if tool_comparison.similarity < f64::from(config.similarity_threshold) {
                continue;
            }
            let (Some(a), Some(b)) = (
                by_participant.get(tool_comparison.participant_a.as_str()),
                by_participant.get(tool_comparison.participant_b.as_str()),
            ) else {
                log::debug!(
                    "Tool reported unknown participants {} / {}",
                    tool_comparison.participant_a,
                    tool_comparison.participant_b
                );
                continue;
            };
            // One coarse region per pair: the tool reports matched lines,
            // not element offsets.
            let matches = vec![ElementMatch {
                start_a: 0,
                start_b: 0,
                length: tool_comparison.lines_matched.max(0) as usize,
            }];
            comparisons.push(ScoredComparison {
                submission_a: a.to_candidate(),
                submission_b: b.to_candidate(),
                similarity: tool_comparison.similarity,
                matches,
            });
        }

        let distribution = similarity_distribution(comparisons.iter().map(|c| c.similarity));
        sort_and_truncate(&mut comparisons, self.settings.max_comparisons);

        let result = store::save_run(
            &self.db,
            exercise.id,
            start.elapsed(),
            distribution,
            comparisons,
        )
        .await?;

        self.notify(
            exercise.id,
            CheckState::Completed,
            &format!("Stored result {}", result.id),
        );
        Ok(result)
    }

    async fn analyze(
        &self,
        exercise: &exercise::Model,
        config: &detection_config::Model,
        eligible: Vec<ParticipationRef>,
        target: &Path,
        tool_language: &str,
        extensions: &'static [&'static str],
    ) -> Result<(ComparisonResultSet, Vec<DownloadedCopy>), DetectionError> {
        let max_repositories = eligible.len() + 1;
        self.notify(
            exercise.id,
            CheckState::Running,
            &format!("Downloading repositories: 0/{max_repositories}"),
        );

        let template = match self
            .working_copies
            .fetch_template_copy(exercise.id, target)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                log::error!(
                    "Template checkout for exercise {} failed: {e}",
                    exercise.id
                );
                None
            }
        };
        if let Some(t) = &template {
            if let Err(e) = self.working_copies.reset_to_clean_state(t).await {
                log::warn!("Template reset failed: {e}");
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.download_concurrency.max(1)));
        let mut futs = FuturesUnordered::new();
        for participation in eligible {
            let provider = Arc::clone(&self.working_copies);
            let semaphore = Arc::clone(&semaphore);
            let target = target.to_path_buf();
            let template_path = template.as_ref().map(|t| t.path.clone());
            let minimum_size = config.minimum_size;
            let exercise_id = exercise.id;
            futs.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                let copy = match provider
                    .fetch_working_copy(exercise_id, &participation, &target)
                    .await
                {
                    Ok(c) => c,
                    Err(e) => {
                        // A failed checkout excludes the participation, it
                        // does not fail the run.
                        log::error!(
                            "Checkout of '{}' failed: {e}",
                            participation.participant
                        );
                        return None;
                    }
                };
                if let Err(e) = provider.reset_to_clean_state(&copy).await {
                    log::warn!("Reset of '{}' failed: {e}", copy.participant);
                }

                let copy_path = copy.path.clone();
                let (size, had_errors) = tokio::task::spawn_blocking(move || {
                    diff_size_against_template(&copy_path, template_path.as_deref(), extensions)
                })
                .await
                .unwrap_or((0, true));

                // The minimum size is a diff against the template, so it can
                // only be applied after download. I/O trouble while counting
                // keeps the submission in (inclusive on error).
                if minimum_size > 0 && size < i64::from(minimum_size) && !had_errors {
                    log::info!(
                        "Excluding '{}' below minimum size ({size} < {minimum_size})",
                        copy.participant
                    );
                    if let Err(e) = provider.delete_working_copy(&copy).await {
                        log::warn!("Could not delete filtered copy: {e}");
                    }
                    return None;
                }
                Some(DownloadedCopy {
                    participation,
                    copy,
                    size,
                })
            }));
        }

        let mut copies = Vec::new();
        while let Some(res) = futs.next().await {
            match res {
                Ok(Some(copy)) => copies.push(copy),
                Ok(None) => {}
                Err(e) => log::error!("Download task failed: {e}"),
            }
        }

        self.notify(
            exercise.id,
            CheckState::Running,
            &format!(
                "Processing repositories: {} valid out of {} total",
                copies.len(),
                max_repositories
            ),
        );

        if copies.len() < 2 {
            return Err(DetectionError::InsufficientSubmissions {
                available: copies.len(),
            });
        }

        let mut options = ToolRunOptions {
            language: tool_language.to_string(),
            roots: copies.iter().map(|c| c.copy.clone()).collect(),
            base_code_dir: template.as_ref().map(|t| t.path.clone()),
            similarity_threshold: f64::from(config.similarity_threshold),
        };

        self.notify(exercise.id, CheckState::Running, "Running structural analysis");
        let result_set = match self.run_tool(&options).await {
            Ok(rs) => rs,
            Err(first) if options.base_code_dir.is_some() => {
                // Degenerate base code makes some tools reject the run;
                // retry once without it before giving up.
                log::warn!(
                    "Structural analysis with base code failed ({first}); retrying without base code"
                );
                options.base_code_dir = None;
                self.run_tool(&options).await?
            }
            Err(e) => return Err(e),
        };

        Ok((result_set, copies))
    }

    async fn run_tool(
        &self,
        options: &ToolRunOptions,
    ) -> Result<ComparisonResultSet, DetectionError> {
        match tokio::time::timeout(self.settings.tool_timeout, self.comparator.run(options)).await
        {
            Ok(result) => result,
            Err(_) => Err(DetectionError::ExternalTool(format!(
                "timed out after {:?}",
                self.settings.tool_timeout
            ))),
        }
    }

    fn notify(&self, exercise_id: i64, state: CheckState, detail: &str) {
        if let Err(e) = self.observer.notify(exercise_id, state, detail) {
            log::debug!("Progress notification failed (ignored): {e}");
        }
    }
}

/// Maps an exercise's programming language to the tool's identifier. Fails
/// before any resource acquisition for languages the tool cannot handle.
pub fn tool_language_for(language: &str) -> Result<&'static str, DetectionError> {
    match language.to_ascii_lowercase().as_str() {
        "java" => Ok("java"),
        "c" => Ok("c"),
        "cpp" | "c++" => Ok("cc"),
        "csharp" | "c#" => Ok("csharp"),
        "python" => Ok("python"),
        "javascript" => Ok("javascript"),
        "typescript" => Ok("javascript"),
        "haskell" => Ok("haskell"),
        "pascal" => Ok("pascal"),
        "perl" => Ok("perl"),
        "matlab" => Ok("matlab"),
        other => Err(DetectionError::UnsupportedLanguage(other.to_string())),
    }
}

/// Source file extensions considered when measuring submission size.
pub fn source_extensions(language: &str) -> &'static [&'static str] {
    match language.to_ascii_lowercase().as_str() {
        "java" => &["java"],
        "c" => &["c", "h"],
        "cpp" | "c++" => &["cpp", "cc", "cxx", "h", "hpp"],
        "csharp" | "c#" => &["cs"],
        "python" => &["py"],
        "javascript" => &["js"],
        "typescript" => &["ts"],
        "haskell" => &["hs"],
        "pascal" => &["pas"],
        "perl" => &["pl", "pm"],
        "matlab" => &["m"],
        _ => &[],
    }
}

/// Counts non-blank source lines in the copy that do not occur in the
/// template's file of the same relative path. Returns the count and whether
/// I/O errors were encountered (errors keep the submission eligible).
fn diff_size_against_template(
    copy: &Path,
    template: Option<&Path>,
    extensions: &'static [&'static str],
) -> (i64, bool) {
    let mut size = 0i64;
    let mut had_errors = false;

    for entry in walkdir::WalkDir::new(copy).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let matches_language = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false);
        if !matches_language {
            continue;
        }

        let content = match std::fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(_) => {
                had_errors = true;
                continue;
            }
        };

        let template_lines: HashSet<String> = template
            .and_then(|t| {
                let rel = entry.path().strip_prefix(copy).ok()?;
                std::fs::read_to_string(t.join(rel)).ok()
            })
            .map(|text| text.lines().map(|l| l.trim().to_string()).collect())
            .unwrap_or_default();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !template_lines.contains(trimmed) {
                size += 1;
            }
        }
    }

    (size, had_errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_is_rejected() {
        assert!(matches!(
            tool_language_for("cobol"),
            Err(DetectionError::UnsupportedLanguage(l)) if l == "cobol"
        ));
        assert_eq!(tool_language_for("Java").expect("java"), "java");
        assert_eq!(tool_language_for("cpp").expect("cpp"), "cc");
    }

    #[test]
    fn diff_size_counts_only_non_template_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let copy = dir.path().join("alice");
        let template = dir.path().join("template");
        std::fs::create_dir_all(&copy).expect("mkdir");
        std::fs::create_dir_all(&template).expect("mkdir");
        std::fs::write(
            template.join("Main.java"),
            "class Main {\n}\n",
        )
        .expect("template");
        std::fs::write(
            copy.join("Main.java"),
            "class Main {\nint stolen = 1;\nint other = 2;\n}\n",
        )
        .expect("copy");
        // README is not a java source file and must not count.
        std::fs::write(copy.join("README.md"), "hello\nworld\n").expect("readme");

        let (size, had_errors) =
            diff_size_against_template(&copy, Some(&template), &["java"]);
        assert!(!had_errors);
        assert_eq!(size, 2);
    }

    #[test]
    fn diff_size_without_template_counts_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("main.py"), "a = 1\n\nb = 2\n").expect("write");
        let (size, had_errors) = diff_size_against_template(dir.path(), None, &["py"]);
        assert!(!had_errors);
        assert_eq!(size, 2);
    }
}
