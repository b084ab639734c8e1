//! Owns the student-facing plagiarism cases.
//!
//! Confirming a comparison folds its two submissions into per-student cases
//! (created lazily); denying detaches them and garbage-collects cases no
//! submission references anymore. Ownership changes go through the narrow
//! `set_case` column update only.

use std::sync::Arc;

use db::models::{
    plagiarism_case::{self, Verdict},
    plagiarism_comparison::{self, ComparisonStatus},
    plagiarism_submission, user,
};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

use crate::error::DetectionError;
use crate::notify::CaseNotifier;

/// What a student may see about their own case. Returned only once the
/// student has been notified, so an undisclosed suspicion can't leak
/// through an unrelated endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentCaseInfo {
    pub case_id: i64,
    pub verdict: Option<Verdict>,
    pub created_by_continuous_control: bool,
}

#[derive(Clone)]
pub struct CaseService {
    db: DatabaseConnection,
    notifier: Arc<dyn CaseNotifier>,
}

impl CaseService {
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn CaseNotifier>) -> Self {
        Self { db, notifier }
    }

    /// Instructor-facing status update entry point.
    pub async fn update_status(
        &self,
        comparison_id: i64,
        status: ComparisonStatus,
        by_continuous_control: bool,
    ) -> Result<(), DetectionError> {
        match status {
            ComparisonStatus::Confirmed => {
                self.confirm_comparison(comparison_id, by_continuous_control)
                    .await
            }
            ComparisonStatus::Denied => self.deny_comparison(comparison_id).await,
            ComparisonStatus::None => {
                plagiarism_comparison::Entity::set_status(&self.db, comparison_id, status)
                    .await
                    .map_err(DetectionError::from)
            }
        }
    }

    /// Confirms a comparison: for each of its two submissions, find or
    /// create the `(student, exercise)` case and point the submission at it.
    /// Team submissions without a resolvable student are skipped for case
    /// creation but the comparison is still marked confirmed. Confirming
    /// twice is a no-op beyond the status write.
    pub async fn confirm_comparison(
        &self,
        comparison_id: i64,
        by_continuous_control: bool,
    ) -> Result<(), DetectionError> {
        let (comparison, submissions) = self.load(comparison_id).await?;
        let exercise_id = self.exercise_id_of(&comparison).await?;

        plagiarism_comparison::Entity::set_status(
            &self.db,
            comparison.id,
            ComparisonStatus::Confirmed,
        )
        .await?;

        for submission in &submissions {
            let Some(login) = submission.student_login.as_deref() else {
                continue;
            };

            let case = match plagiarism_case::Entity::find_by_exercise_and_student(
                &self.db,
                exercise_id,
                login,
            )
            .await?
            {
                Some(existing) => existing,
                None => {
                    let created = plagiarism_case::Model::create(
                        &self.db,
                        exercise_id,
                        login,
                        by_continuous_control,
                    )
                    .await?;
                    let student = user::Entity::find_by_username(&self.db, login).await?;
                    if let Err(e) = self.notifier.notify_case(&created, student.as_ref()).await {
                        log::warn!("Case notification for '{login}' failed (ignored): {e}");
                    }
                    created
                }
            };

            plagiarism_submission::Entity::set_case(&self.db, submission.id, Some(case.id))
                .await?;
        }

        Ok(())
    }

    /// Denies a comparison: detaches both submissions from any case, then
    /// deletes each affected case that no submission references anymore.
    pub async fn deny_comparison(&self, comparison_id: i64) -> Result<(), DetectionError> {
        let (comparison, submissions) = self.load(comparison_id).await?;

        plagiarism_comparison::Entity::set_status(
            &self.db,
            comparison.id,
            ComparisonStatus::Denied,
        )
        .await?;

        let mut affected_cases: Vec<i64> = Vec::new();
        for submission in &submissions {
            if let Some(case_id) = submission.case_id {
                affected_cases.push(case_id);
                plagiarism_submission::Entity::set_case(&self.db, submission.id, None).await?;
            }
        }

        affected_cases.sort_unstable();
        affected_cases.dedup();
        for case_id in affected_cases {
            self.delete_case_if_empty(case_id).await?;
        }

        Ok(())
    }

    /// Records an instructor verdict. Independent of the confirm/deny state
    /// and always triggers a student notification.
    pub async fn update_verdict(
        &self,
        case_id: i64,
        verdict: Verdict,
        message: Option<String>,
        point_deduction: Option<i32>,
        decided_by: i64,
    ) -> Result<plagiarism_case::Model, DetectionError> {
        let case = plagiarism_case::Entity::set_verdict(
            &self.db,
            case_id,
            verdict,
            message,
            point_deduction,
            decided_by,
        )
        .await?;

        let student =
            user::Entity::find_by_username(&self.db, &case.student_login).await?;
        if let Err(e) = self.notifier.notify_verdict(&case, student.as_ref()).await {
            log::warn!(
                "Verdict notification for '{}' failed (ignored): {e}",
                case.student_login
            );
        }
        Ok(case)
    }

    /// Marks the case as student-notified by attaching the post. One-way:
    /// a case that already has a post keeps it. Returns whether the post
    /// was newly attached.
    pub async fn attach_post(
        &self,
        case_id: i64,
        post: serde_json::Value,
    ) -> Result<bool, DetectionError> {
        plagiarism_case::Entity::attach_post(&self.db, case_id, post)
            .await
            .map_err(DetectionError::from)
    }

    /// Case metadata for the student's own view; `None` until the student
    /// has been notified.
    pub async fn student_case_info(
        &self,
        exercise_id: i64,
        student_login: &str,
    ) -> Result<Option<StudentCaseInfo>, DetectionError> {
        let case = plagiarism_case::Entity::find_by_exercise_and_student(
            &self.db,
            exercise_id,
            student_login,
        )
        .await?;
        Ok(case.filter(|c| c.post.is_some()).map(|c| StudentCaseInfo {
            case_id: c.id,
            verdict: c.verdict,
            created_by_continuous_control: c.created_by_continuous_control,
        }))
    }

    /// Deletes continuous-control cases of the exercise that lost all their
    /// submissions, so automated cases shrink as evidence changes. Returns
    /// how many were removed.
    pub async fn reconcile_continuous_control_cases(
        &self,
        exercise_id: i64,
    ) -> Result<u64, DetectionError> {
        let cases =
            plagiarism_case::Entity::list_continuous_control_for_exercise(&self.db, exercise_id)
                .await?;
        let mut deleted = 0u64;
        for case in cases {
            if self.delete_case_if_empty(case.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_case_if_empty(&self, case_id: i64) -> Result<bool, DetectionError> {
        let remaining =
            plagiarism_submission::Entity::count_for_case(&self.db, case_id).await?;
        if remaining > 0 {
            return Ok(false);
        }
        plagiarism_case::Entity::delete_by_id(case_id)
            .exec(&self.db)
            .await?;
        log::info!("Deleted plagiarism case {case_id}: no submissions reference it");
        Ok(true)
    }

    async fn load(
        &self,
        comparison_id: i64,
    ) -> Result<(plagiarism_comparison::Model, Vec<plagiarism_submission::Model>), DetectionError>
    {
        plagiarism_comparison::Entity::find_with_submissions(&self.db, comparison_id)
            .await?
            .ok_or_else(|| {
                DetectionError::Db(DbErr::RecordNotFound(format!(
                    "plagiarism comparison {comparison_id} not found"
                )))
            })
    }

    async fn exercise_id_of(
        &self,
        comparison: &plagiarism_comparison::Model,
    ) -> Result<i64, DetectionError> {
        let result = db::models::plagiarism_result::Entity::find_by_id(comparison.result_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                DetectionError::Db(DbErr::RecordNotFound(format!(
                    "plagiarism result {} not found",
                    comparison.result_id
                )))
            })?;
        Ok(result.exercise_id)
    }
}
