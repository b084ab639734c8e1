//! Bridges engine output to the persistence layer. Storing a run replaces
//! the exercise's previous result; only the latest result per exercise
//! survives.

use std::time::Duration;

use db::models::plagiarism_result::{self, NewComparison, NewSubmission};
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::json;

use crate::engine::{CandidateSubmission, ScoredComparison};

pub async fn save_run(
    db: &DatabaseConnection,
    exercise_id: i64,
    duration: Duration,
    distribution: [i64; 10],
    comparisons: Vec<ScoredComparison>,
) -> Result<plagiarism_result::Model, DbErr> {
    let rows = comparisons.into_iter().map(to_new_comparison).collect();
    plagiarism_result::Entity::save_replacing_previous(
        db,
        exercise_id,
        duration.as_millis() as i64,
        distribution,
        rows,
    )
    .await
}

fn to_new_comparison(comparison: ScoredComparison) -> NewComparison {
    let matches = if comparison.matches.is_empty() {
        None
    } else {
        Some(json!(comparison.matches))
    };
    NewComparison {
        similarity: comparison.similarity as f32,
        matches,
        submission_a: to_new_submission(comparison.submission_a),
        submission_b: to_new_submission(comparison.submission_b),
    }
}

fn to_new_submission(candidate: CandidateSubmission) -> NewSubmission {
    NewSubmission {
        submission_ref: candidate.submission_ref,
        participant: candidate.participant,
        student_login: candidate.student_login,
        size: candidate.size,
        elements: candidate.elements,
    }
}
