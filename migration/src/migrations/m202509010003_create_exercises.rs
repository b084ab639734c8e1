use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202509010003_create_exercises"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("exercises"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id"))
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key())
                    .col(ColumnDef::new(Alias::new("course_id"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("title"))
                        .string()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("exercise_type"))
                        .string()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("programming_language"))
                        .string()
                        .null())
                    .col(ColumnDef::new(Alias::new("due_date"))
                        .timestamp()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("continuous_control_enabled"))
                        .boolean()
                        .not_null()
                        .default(false))
                    .col(ColumnDef::new(Alias::new("post_due_date_checks_enabled"))
                        .boolean()
                        .not_null()
                        .default(false))
                    .col(ColumnDef::new(Alias::new("created_at"))
                        .timestamp()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Alias::new("updated_at"))
                        .timestamp()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exercise_course")
                            .from(Alias::new("exercises"), Alias::new("course_id"))
                            .to(Alias::new("courses"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("exercises")).to_owned())
            .await
    }
}
