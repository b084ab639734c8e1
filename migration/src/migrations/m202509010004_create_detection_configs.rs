use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202509010004_create_detection_configs"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("detection_configs"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id"))
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key())
                    .col(ColumnDef::new(Alias::new("exercise_id"))
                        .big_integer()
                        .not_null()
                        .unique_key())
                    .col(ColumnDef::new(Alias::new("similarity_threshold"))
                        .float()
                        .not_null()
                        .default(90.0))
                    .col(ColumnDef::new(Alias::new("minimum_score"))
                        .integer()
                        .not_null()
                        .default(0))
                    .col(ColumnDef::new(Alias::new("minimum_size"))
                        .integer()
                        .not_null()
                        .default(50))
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
                            .name("fk_detection_config_exercise")
                            .from(Alias::new("detection_configs"), Alias::new("exercise_id"))
                            .to(Alias::new("exercises"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("detection_configs")).to_owned())
            .await
    }
}
