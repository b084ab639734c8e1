//! Continuous plagiarism control: the scheduled pass that analyses every
//! flagged exercise, automatically confirms the resulting comparisons,
//! notifies the affected students, and prunes cases whose evidence is gone.
//!
//! Failure isolation is explicit: each exercise yields an
//! [`ExerciseOutcome`] and a failing exercise never aborts the batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use db::models::{
    course, detection_config, exercise,
    exercise::ExerciseType,
    plagiarism_case, plagiarism_comparison, plagiarism_result, plagiarism_submission, user,
};
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::case_service::CaseService;
use crate::error::DetectionError;
use crate::notify::build_case_post;
use crate::programming::ProgrammingDetectionService;
use crate::similarity::{ModelingComparator, TextComparator};
use crate::sources::SubmissionSource;
use crate::token_detection::TokenDetectionService;

#[derive(Debug)]
pub enum Outcome {
    Completed {
        comparisons: usize,
        cases_removed: u64,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

/// One line of the batch report returned by a pass.
#[derive(Debug)]
pub struct ExerciseOutcome {
    pub exercise_id: i64,
    pub title: String,
    pub outcome: Outcome,
}

pub struct ContinuousControlScheduler {
    db: DatabaseConnection,
    case_service: CaseService,
    programming: ProgrammingDetectionService,
    token: TokenDetectionService,
    submission_source: Arc<dyn SubmissionSource>,
    text_comparator: TextComparator,
    modeling_comparator: ModelingComparator,
    policy_url: String,
}

impl ContinuousControlScheduler {
    pub fn new(
        db: DatabaseConnection,
        case_service: CaseService,
        programming: ProgrammingDetectionService,
        token: TokenDetectionService,
        submission_source: Arc<dyn SubmissionSource>,
        policy_url: String,
    ) -> Self {
        Self {
            db,
            case_service,
            programming,
            token,
            submission_source,
            text_comparator: TextComparator::default(),
            modeling_comparator: ModelingComparator,
            policy_url,
        }
    }

    /// Periodic entry point for the daemon. The first pass runs immediately.
    pub async fn run_forever(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let outcomes = self.run_once(Utc::now()).await;
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
                .count();
            log::info!(
                "Continuous control pass finished: {} exercises processed, {} failed",
                outcomes.len(),
                failed
            );
        }
    }

    /// Processes every eligible exercise sequentially and returns the batch
    /// report. Exercises are eligible when flagged for continuous control
    /// and either still running or opted into post-due-date checks.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<ExerciseOutcome> {
        let exercises = match exercise::Entity::find_due_for_continuous_control(&self.db, now).await
        {
            Ok(list) => list,
            Err(e) => {
                log::error!("Could not load exercises for continuous control: {e}");
                return Vec::new();
            }
        };
        log::info!(
            "Continuous control pass over {} eligible exercises",
            exercises.len()
        );

        let mut outcomes = Vec::with_capacity(exercises.len());
        for exercise in exercises {
            let outcome = self.process_exercise(&exercise).await;
            outcomes.push(ExerciseOutcome {
                exercise_id: exercise.id,
                title: exercise.title.clone(),
                outcome,
            });
        }
        outcomes
    }

    async fn process_exercise(&self, exercise: &exercise::Model) -> Outcome {
        if matches!(
            exercise.exercise_type,
            ExerciseType::Quiz | ExerciseType::FileUpload
        ) {
            return Outcome::Skipped {
                reason: format!(
                    "{} exercises are not supported for plagiarism checks",
                    exercise.exercise_type
                ),
            };
        }

        match self.try_process(exercise).await {
            Ok((comparisons, cases_removed)) => Outcome::Completed {
                comparisons,
                cases_removed,
            },
            Err(e) => {
                log::error!(
                    "Continuous control for exercise {} (type {}) failed: {e}",
                    exercise.id,
                    exercise.exercise_type
                );
                // No half-written state: whatever this run left behind is
                // purged along with any previous result.
                if let Err(purge) =
                    plagiarism_result::Entity::delete_for_exercise(&self.db, exercise.id).await
                {
                    log::warn!(
                        "Could not purge result of exercise {}: {purge}",
                        exercise.id
                    );
                }
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_process(
        &self,
        exercise: &exercise::Model,
    ) -> Result<(usize, u64), DetectionError> {
        // Legacy exercises may predate detection configs.
        let config =
            detection_config::Entity::get_or_create_default(&self.db, exercise.id).await?;

        let result = match exercise.exercise_type {
            ExerciseType::Programming => {
                self.programming.check_exercise(exercise, &config).await?
            }
            ExerciseType::Text => {
                self.token
                    .check_exercise(
                        exercise,
                        &config,
                        &self.text_comparator,
                        self.submission_source.as_ref(),
                    )
                    .await?
            }
            ExerciseType::Modeling => {
                self.token
                    .check_exercise(
                        exercise,
                        &config,
                        &self.modeling_comparator,
                        self.submission_source.as_ref(),
                    )
                    .await?
            }
            other => {
                return Err(DetectionError::UnsupportedExerciseType(other.to_string()));
            }
        };

        // Continuous-control confirmations are automatic.
        let comparisons =
            plagiarism_comparison::Entity::list_for_result(&self.db, result.id).await?;
        for comparison in &comparisons {
            self.case_service.confirm_comparison(comparison.id, true).await?;
        }

        self.notify_students(exercise, &comparisons).await;

        // Cases created by continuous control are live: drop those the fresh
        // evidence no longer supports.
        let cases_removed = self
            .case_service
            .reconcile_continuous_control_cases(exercise.id)
            .await?;

        Ok((comparisons.len(), cases_removed))
    }

    /// Builds the localized post for every student involved in a confirmed
    /// comparison. Strictly per-student fault tolerant: a failing mailer or
    /// database hiccup for one student logs and moves on.
    async fn notify_students(
        &self,
        exercise: &exercise::Model,
        comparisons: &[plagiarism_comparison::Model],
    ) {
        let course_title = match course::Entity::find_by_id(exercise.course_id)
            .one(&self.db)
            .await
        {
            Ok(Some(c)) => c.title,
            _ => format!("course {}", exercise.course_id),
        };

        let mut seen: HashSet<String> = HashSet::new();
        for comparison in comparisons {
            let submissions = match plagiarism_submission::Entity::for_comparison(
                &self.db,
                comparison.id,
            )
            .await
            {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("Could not load submissions of comparison {}: {e}", comparison.id);
                    continue;
                }
            };

            for submission in submissions {
                let Some(login) = submission.student_login else {
                    continue;
                };
                if !seen.insert(login.clone()) {
                    continue;
                }
                if let Err(e) = self.notify_one(exercise, &course_title, &login).await {
                    log::error!("Notifying student '{login}' failed (continuing): {e}");
                }
            }
        }
    }

    async fn notify_one(
        &self,
        exercise: &exercise::Model,
        course_title: &str,
        login: &str,
    ) -> Result<(), DetectionError> {
        let Some(case) = plagiarism_case::Entity::find_by_exercise_and_student(
            &self.db,
            exercise.id,
            login,
        )
        .await?
        else {
            return Ok(());
        };

        let student = user::Entity::find_by_username(&self.db, login).await?;
        let language = student
            .as_ref()
            .map(|u| u.language.clone())
            .unwrap_or_else(|| "en".to_string());

        let post = build_case_post(&language, &exercise.title, course_title, &self.policy_url);
        // One-way: a student already notified stays notified.
        let newly_attached = self.case_service.attach_post(case.id, post.to_json()).await?;
        if newly_attached {
            log::info!(
                "Student '{login}' notified about plagiarism case {} in exercise {}",
                case.id,
                exercise.id
            );
        }
        Ok(())
    }
}
