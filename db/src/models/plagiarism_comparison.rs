//! A scored pairing of two submissions inside one result. Owned by its
//! result row; deleting the result cascades here and to the submissions.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::Expr;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "plagiarism_comparisons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub result_id: i64,

    /// Similarity in percent, 0..=100.
    pub similarity: f32,

    pub status: ComparisonStatus,

    /// Element-level correspondences for UI highlighting.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub matches: Option<Json>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    /// Not yet reviewed.
    #[sea_orm(string_value = "none")]
    None,
    /// Reviewed and upheld; contributes to plagiarism cases.
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    /// Reviewed and rejected.
    #[sea_orm(string_value = "denied")]
    Denied,
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComparisonStatus::None => "none",
            ComparisonStatus::Confirmed => "confirmed",
            ComparisonStatus::Denied => "denied",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plagiarism_result::Entity",
        from = "Column::ResultId",
        to = "super::plagiarism_result::Column::Id",
        on_delete = "Cascade"
    )]
    Result,

    #[sea_orm(has_many = "super::plagiarism_submission::Entity")]
    Submission,
}

impl Related<super::plagiarism_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Result.def()
    }
}

impl Related<super::plagiarism_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Narrow status update; does not touch any other column.
    pub async fn set_status(
        db: &DatabaseConnection,
        comparison_id: i64,
        status: ComparisonStatus,
    ) -> Result<(), DbErr> {
        Entity::update_many()
            .col_expr(Column::Status, Expr::value(status))
            .filter(Column::Id.eq(comparison_id))
            .exec(db)
            .await
            .map(|_| ())
    }

    /// Comparisons of one result, highest similarity first.
    pub async fn list_for_result(
        db: &DatabaseConnection,
        result_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::ResultId.eq(result_id))
            .order_by_desc(Column::Similarity)
            .all(db)
            .await
    }

    /// Loads a comparison together with its two submission snapshots.
    pub async fn find_with_submissions(
        db: &DatabaseConnection,
        comparison_id: i64,
    ) -> Result<Option<(Model, Vec<super::plagiarism_submission::Model>)>, DbErr> {
        let Some(comparison) = Entity::find_by_id(comparison_id).one(db).await? else {
            return Ok(None);
        };
        let submissions = super::plagiarism_submission::Entity::for_comparison(db, comparison_id).await?;
        Ok(Some((comparison, submissions)))
    }
}
