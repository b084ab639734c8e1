//! On-demand analysis for the element-based domains (text and modeling):
//! pulls candidates from the submission collaborator, runs the comparison
//! sweep, and stores the result, superseding the previous one.

use std::sync::Arc;

use db::models::{detection_config, exercise, plagiarism_result};

use crate::cache::PlagiarismCache;
use crate::engine::{CheckState, ComparisonEngine, ProgressObserver, meets_minimum_score, sort_and_truncate};
use crate::error::DetectionError;
use crate::similarity::SimilarityComparator;
use crate::sources::SubmissionSource;
use crate::store;

pub struct TokenDetectionService {
    db: sea_orm::DatabaseConnection,
    cache: PlagiarismCache,
    observer: Arc<dyn ProgressObserver>,
    max_comparisons: usize,
}

impl TokenDetectionService {
    pub fn new(
        db: sea_orm::DatabaseConnection,
        cache: PlagiarismCache,
        observer: Arc<dyn ProgressObserver>,
        max_comparisons: usize,
    ) -> Self {
        Self {
            db,
            cache,
            observer,
            max_comparisons,
        }
    }

    /// Runs the sweep for one exercise. Guarded per course: a second check
    /// for the same course is rejected immediately, and the guard is
    /// released on every exit path.
    pub async fn check_exercise(
        &self,
        exercise: &exercise::Model,
        config: &detection_config::Model,
        comparator: &dyn SimilarityComparator,
        source: &dyn SubmissionSource,
    ) -> Result<plagiarism_result::Model, DetectionError> {
        let _guard = self.cache.acquire(exercise.course_id)?;

        self.notify(exercise.id, CheckState::Running, "Collecting submissions");
        let candidates = source.latest_submissions(exercise.id).await?;
        let total = candidates.len();

        let eligible: Vec<_> = candidates
            .into_iter()
            .filter(|c| meets_minimum_score(c.score, config.minimum_score))
            .collect();
        log::info!(
            "Exercise {}: {} of {} submissions eligible after minimum score filter",
            exercise.id,
            eligible.len(),
            total
        );

        if eligible.len() < 2 {
            return Err(DetectionError::InsufficientSubmissions {
                available: eligible.len(),
            });
        }

        let engine = ComparisonEngine::new(comparator, self.observer.as_ref());
        let run = engine.compare_all(
            exercise.id,
            eligible,
            f64::from(config.similarity_threshold),
            config.minimum_size.max(0) as usize,
        );

        let mut comparisons = run.comparisons;
        sort_and_truncate(&mut comparisons, self.max_comparisons);

        let result = store::save_run(
            &self.db,
            exercise.id,
            run.duration,
            run.distribution,
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

    fn notify(&self, exercise_id: i64, state: CheckState, detail: &str) {
        if let Err(e) = self.observer.notify(exercise_id, state, detail) {
            log::debug!("Progress notification failed (ignored): {e}");
        }
    }
}
