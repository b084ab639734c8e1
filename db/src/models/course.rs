//! Minimal course entity, read-only to this subsystem. The course id keys the
//! per-course analysis lock; the title is embedded in student notifications.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub title: String,
    pub short_name: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::exercise::Entity")]
    Exercise,
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
        title: &str,
        short_name: &str,
    ) -> Result<Model, DbErr> {
        let active = ActiveModel {
            title: Set(title.to_string()),
            short_name: Set(short_name.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(db).await
    }
}
