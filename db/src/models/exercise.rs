//! Exercise entity. Exercise CRUD lives outside this subsystem; this model
//! carries the fields the detection engine and the continuous control loop
//! need: the domain (exercise type), the due date, and the control flags.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{Condition, IntoActiveModel, QueryOrder};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exercises")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub course_id: i64,
    pub title: String,

    pub exercise_type: ExerciseType,

    /// Only set for programming exercises; drives external tool selection.
    pub programming_language: Option<String>,

    pub due_date: DateTime<Utc>,

    /// Whether the scheduled analysis pass picks this exercise up.
    pub continuous_control_enabled: bool,

    /// Keep analysing after the due date has passed.
    pub post_due_date_checks_enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ExerciseType {
    #[sea_orm(string_value = "programming")]
    Programming,
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "modeling")]
    Modeling,
    #[sea_orm(string_value = "quiz")]
    Quiz,
    #[sea_orm(string_value = "file_upload")]
    FileUpload,
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExerciseType::Programming => "programming",
            ExerciseType::Text => "text",
            ExerciseType::Modeling => "modeling",
            ExerciseType::Quiz => "quiz",
            ExerciseType::FileUpload => "file_upload",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        course_id: i64,
        title: &str,
        exercise_type: ExerciseType,
        programming_language: Option<&str>,
        due_date: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            course_id: Set(course_id),
            title: Set(title.to_string()),
            exercise_type: Set(exercise_type),
            programming_language: Set(programming_language.map(str::to_string)),
            due_date: Set(due_date),
            continuous_control_enabled: Set(false),
            post_due_date_checks_enabled: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }
}

impl Entity {
    /// Flags an exercise for the scheduled analysis pass.
    pub async fn enable_continuous_control(
        db: &DatabaseConnection,
        exercise_id: i64,
        post_due_date_checks: bool,
    ) -> Result<(), DbErr> {
        if let Some(m) = Entity::find_by_id(exercise_id).one(db).await? {
            let mut am = m.into_active_model();
            am.continuous_control_enabled = Set(true);
            am.post_due_date_checks_enabled = Set(post_due_date_checks);
            am.updated_at = Set(Utc::now());
            am.update(db).await.map(|_| ())
        } else {
            Err(DbErr::RecordNotFound("exercise not found".into()))
        }
    }

    /// Exercises eligible for the continuous control pass: flagged, and
    /// either still running or explicitly opted into post-due-date checks.
    pub async fn find_due_for_continuous_control(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(
                Condition::all()
                    .add(Column::ContinuousControlEnabled.eq(true))
                    .add(
                        Condition::any()
                            .add(Column::DueDate.gt(now))
                            .add(Column::PostDueDateChecksEnabled.eq(true)),
                    ),
            )
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
