//! Per-exercise plagiarism detection thresholds. Created lazily with
//! defaults so exercises predating the feature keep working.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 90.0;
pub const DEFAULT_MINIMUM_SCORE: i32 = 0;
pub const DEFAULT_MINIMUM_SIZE: i32 = 50;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "detection_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub exercise_id: i64,

    /// Comparisons below this similarity (percent) are dropped.
    pub similarity_threshold: f32,

    /// Submissions scored below this are excluded before analysis.
    pub minimum_score: i32,

    /// Minimum size metric (element count or diff lines) for eligibility.
    pub minimum_size: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
}

impl Related<super::exercise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Exercise.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    pub async fn find_for_exercise(
        db: &DatabaseConnection,
        exercise_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ExerciseId.eq(exercise_id))
            .one(db)
            .await
    }

    /// Returns the exercise's config, creating a default one for legacy
    /// exercises that never had one.
    pub async fn get_or_create_default(
        db: &DatabaseConnection,
        exercise_id: i64,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Entity::find_for_exercise(db, exercise_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let active = ActiveModel {
            exercise_id: Set(exercise_id),
            similarity_threshold: Set(DEFAULT_SIMILARITY_THRESHOLD),
            minimum_score: Set(DEFAULT_MINIMUM_SCORE),
            minimum_size: Set(DEFAULT_MINIMUM_SIZE),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }
}
