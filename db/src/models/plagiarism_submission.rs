//! Comparison-scoped snapshot of one participant's submission. Owned by its
//! comparison; the `case_id` column is a non-owning back-reference that is
//! only ever changed through the narrow [`Entity::set_case`] update so that
//! re-pointing a submission cannot cascade into unrelated rows.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::prelude::Expr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "plagiarism_submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub comparison_id: i64,

    /// Owning case, if this submission is part of a confirmed comparison.
    pub case_id: Option<i64>,

    /// Id of the underlying submission in the exercise subsystem.
    pub submission_ref: i64,

    /// Identity used for pair distinctness (login or team name).
    pub participant: String,

    /// Singular student behind the submission, when resolvable.
    pub student_login: Option<String>,

    /// Size metric: element count, or diff lines for programming.
    pub size: i64,

    /// Ordered comparable units (tokens, model elements, code regions).
    #[sea_orm(column_type = "JsonBinary")]
    pub elements: Json,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plagiarism_comparison::Entity",
        from = "Column::ComparisonId",
        to = "super::plagiarism_comparison::Column::Id",
        on_delete = "Cascade"
    )]
    Comparison,

    #[sea_orm(
        belongs_to = "super::plagiarism_case::Entity",
        from = "Column::CaseId",
        to = "super::plagiarism_case::Column::Id",
        on_delete = "SetNull"
    )]
    Case,
}

impl Related<super::plagiarism_comparison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comparison.def()
    }
}

impl Related<super::plagiarism_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Targeted owner update: sets only `case_id`, nothing else.
    pub async fn set_case(
        db: &DatabaseConnection,
        submission_id: i64,
        case_id: Option<i64>,
    ) -> Result<(), DbErr> {
        Entity::update_many()
            .col_expr(Column::CaseId, Expr::value(case_id))
            .filter(Column::Id.eq(submission_id))
            .exec(db)
            .await
            .map(|_| ())
    }

    pub async fn for_comparison(
        db: &DatabaseConnection,
        comparison_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::ComparisonId.eq(comparison_id))
            .all(db)
            .await
    }

    /// Number of submissions still pointing at the case.
    pub async fn count_for_case(db: &DatabaseConnection, case_id: i64) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::CaseId.eq(case_id))
            .count(db)
            .await
    }
}

impl Model {
    /// Parses the stored element list.
    pub fn elements_vec(&self) -> Vec<String> {
        self.elements
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
