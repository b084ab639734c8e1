use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202509010008_create_plagiarism_submissions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("plagiarism_submissions"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id"))
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key())
                    .col(ColumnDef::new(Alias::new("comparison_id"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("case_id"))
                        .big_integer()
                        .null())
                    .col(ColumnDef::new(Alias::new("submission_ref"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("participant"))
                        .string()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("student_login"))
                        .string()
                        .null())
                    .col(ColumnDef::new(Alias::new("size"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("elements"))
                        .json_binary()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("created_at"))
                        .timestamp()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_comparison")
                            .from(Alias::new("plagiarism_submissions"), Alias::new("comparison_id"))
                            .to(Alias::new("plagiarism_comparisons"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_case")
                            .from(Alias::new("plagiarism_submissions"), Alias::new("case_id"))
                            .to(Alias::new("plagiarism_cases"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("plagiarism_submissions")).to_owned())
            .await
    }
}
