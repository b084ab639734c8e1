//! Durable, student-scoped aggregation of confirmed comparisons for one
//! exercise. Created lazily on the first confirmation involving the student
//! and deleted once no submission references it anymore.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::Expr;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "plagiarism_cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub exercise_id: i64,
    pub student_login: String,

    pub verdict: Option<Verdict>,
    pub verdict_message: Option<String>,
    pub verdict_point_deduction: Option<i32>,
    pub verdict_date: Option<DateTime<Utc>>,
    pub verdict_by: Option<i64>,

    /// Student-facing notification artifact; null until the student has been
    /// notified. Attaching it is a one-way transition.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub post: Option<Json>,

    pub created_by_continuous_control: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[sea_orm(string_value = "point_deduction")]
    PointDeduction,
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "plagiarism")]
    Plagiarism,
    #[sea_orm(string_value = "no_plagiarism")]
    NoPlagiarism,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::PointDeduction => "point_deduction",
            Verdict::Warning => "warning",
            Verdict::Plagiarism => "plagiarism",
            Verdict::NoPlagiarism => "no_plagiarism",
        };
        write!(f, "{s}")
    }
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

    #[sea_orm(has_many = "super::plagiarism_submission::Entity")]
    Submission,
}

impl Related<super::exercise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Exercise.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        exercise_id: i64,
        student_login: &str,
        created_by_continuous_control: bool,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            exercise_id: Set(exercise_id),
            student_login: Set(student_login.to_string()),
            created_by_continuous_control: Set(created_by_continuous_control),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }
}

impl Entity {
    pub async fn find_by_exercise_and_student(
        db: &DatabaseConnection,
        exercise_id: i64,
        student_login: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ExerciseId.eq(exercise_id))
            .filter(Column::StudentLogin.eq(student_login))
            .one(db)
            .await
    }

    pub async fn list_continuous_control_for_exercise(
        db: &DatabaseConnection,
        exercise_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::ExerciseId.eq(exercise_id))
            .filter(Column::CreatedByContinuousControl.eq(true))
            .all(db)
            .await
    }

    /// Records an instructor verdict and stamps who decided when.
    pub async fn set_verdict(
        db: &DatabaseConnection,
        case_id: i64,
        verdict: Verdict,
        message: Option<String>,
        point_deduction: Option<i32>,
        decided_by: i64,
    ) -> Result<Model, DbErr> {
        let Some(m) = Entity::find_by_id(case_id).one(db).await? else {
            return Err(DbErr::RecordNotFound("plagiarism case not found".into()));
        };
        let mut am: ActiveModel = m.into();
        am.verdict = Set(Some(verdict));
        am.verdict_message = Set(message);
        am.verdict_point_deduction = Set(point_deduction);
        am.verdict_date = Set(Some(Utc::now()));
        am.verdict_by = Set(Some(decided_by));
        am.updated_at = Set(Utc::now());
        am.update(db).await
    }

    /// Attaches the student notification post, but only if none exists yet.
    /// Returns whether the post was newly attached.
    pub async fn attach_post(
        db: &DatabaseConnection,
        case_id: i64,
        post: serde_json::Value,
    ) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::Post, Expr::value(Some(post)))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(case_id))
            .filter(Column::Post.is_null())
            .exec(db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}
