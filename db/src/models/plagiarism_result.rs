//! Result of one analysis run over an exercise. Exactly one result per
//! exercise survives: saving a new one deletes the previous one (and, via
//! cascade, its comparisons and their submissions) in the same transaction.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{QueryOrder, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{plagiarism_comparison, plagiarism_submission};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "plagiarism_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub exercise_id: i64,

    /// Wall-clock duration of the comparison sweep.
    pub duration_ms: i64,

    /// Ten buckets; bucket i counts comparisons with similarity in
    /// [i*10, (i+1)*10), except bucket 9 which also counts exactly 100.
    #[sea_orm(column_type = "JsonBinary")]
    pub similarity_distribution: Json,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::exercise::Entity",
        from = "Column::ExerciseId",
        to = "super::exercise::Column::Id",
        on_delete = "Cascade"
    )]
    Exercise,

    #[sea_orm(has_many = "super::plagiarism_comparison::Entity")]
    Comparison,
}

impl Related<super::plagiarism_comparison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comparison.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Comparison-scoped snapshot of a submission, owned by the comparison row
/// it is inserted under. Two comparisons touching the same underlying
/// submission get independent rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSubmission {
    pub submission_ref: i64,
    /// Identity used for pair distinctness (login or team name).
    pub participant: String,
    /// Singular student behind the submission, when resolvable.
    pub student_login: Option<String>,
    pub size: i64,
    pub elements: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct NewComparison {
    /// Similarity in percent, 0..=100.
    pub similarity: f32,
    pub matches: Option<serde_json::Value>,
    pub submission_a: NewSubmission,
    pub submission_b: NewSubmission,
}

impl Entity {
    /// Persists a fresh result for the exercise, superseding any previous
    /// one. Runs in a single transaction so readers never observe the old
    /// result gone while the new one is missing.
    pub async fn save_replacing_previous(
        db: &DatabaseConnection,
        exercise_id: i64,
        duration_ms: i64,
        distribution: [i64; 10],
        comparisons: Vec<NewComparison>,
    ) -> Result<Model, DbErr> {
        let txn = db.begin().await?;

        Entity::delete_many()
            .filter(Column::ExerciseId.eq(exercise_id))
            .exec(&txn)
            .await?;

        let now = Utc::now();
        let result = ActiveModel {
            exercise_id: Set(exercise_id),
            duration_ms: Set(duration_ms),
            similarity_distribution: Set(json!(distribution.to_vec())),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for comparison in comparisons {
            let stored = plagiarism_comparison::ActiveModel {
                result_id: Set(result.id),
                similarity: Set(comparison.similarity),
                status: Set(plagiarism_comparison::ComparisonStatus::None),
                matches: Set(comparison.matches),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            for submission in [comparison.submission_a, comparison.submission_b] {
                plagiarism_submission::ActiveModel {
                    comparison_id: Set(stored.id),
                    case_id: Set(None),
                    submission_ref: Set(submission.submission_ref),
                    participant: Set(submission.participant),
                    student_login: Set(submission.student_login),
                    size: Set(submission.size),
                    elements: Set(json!(submission.elements)),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(result)
    }

    pub async fn latest_for_exercise(
        db: &DatabaseConnection,
        exercise_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ExerciseId.eq(exercise_id))
            .order_by_desc(Column::CreatedAt)
            .one(db)
            .await
    }

    /// Purges the exercise's result, e.g. after a failed analysis run.
    pub async fn delete_for_exercise(
        db: &DatabaseConnection,
        exercise_id: i64,
    ) -> Result<u64, DbErr> {
        let res = Entity::delete_many()
            .filter(Column::ExerciseId.eq(exercise_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}

impl Model {
    /// Parses the stored distribution back into its ten buckets.
    pub fn distribution(&self) -> [i64; 10] {
        let mut out = [0i64; 10];
        if let Some(values) = self.similarity_distribution.as_array() {
            for (i, v) in values.iter().take(10).enumerate() {
                out[i] = v.as_i64().unwrap_or(0);
            }
        }
        out
    }
}
