use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202509010006_create_plagiarism_comparisons"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("plagiarism_comparisons"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id"))
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key())
                    .col(ColumnDef::new(Alias::new("result_id"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("similarity"))
                        .float()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("status"))
                        .string()
                        .not_null()
                        .default("none"))
                    .col(ColumnDef::new(Alias::new("matches"))
                        .json_binary()
                        .null())
                    .col(ColumnDef::new(Alias::new("created_at"))
                        .timestamp()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comparison_result")
                            .from(Alias::new("plagiarism_comparisons"), Alias::new("result_id"))
                            .to(Alias::new("plagiarism_results"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("plagiarism_comparisons")).to_owned())
            .await
    }
}
