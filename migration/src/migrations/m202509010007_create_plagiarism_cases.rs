use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202509010007_create_plagiarism_cases"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("plagiarism_cases"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id"))
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key())
                    .col(ColumnDef::new(Alias::new("exercise_id"))
                        .big_integer()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("student_login"))
                        .string()
                        .not_null())
                    .col(ColumnDef::new(Alias::new("verdict"))
                        .string()
                        .null())
                    .col(ColumnDef::new(Alias::new("verdict_message"))
                        .text()
                        .null())
                    .col(ColumnDef::new(Alias::new("verdict_point_deduction"))
                        .integer()
                        .null())
                    .col(ColumnDef::new(Alias::new("verdict_date"))
                        .timestamp()
                        .null())
                    .col(ColumnDef::new(Alias::new("verdict_by"))
                        .big_integer()
                        .null())
                    .col(ColumnDef::new(Alias::new("post"))
                        .json_binary()
                        .null())
                    .col(ColumnDef::new(Alias::new("created_by_continuous_control"))
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
                            .name("fk_case_exercise")
                            .from(Alias::new("plagiarism_cases"), Alias::new("exercise_id"))
                            .to(Alias::new("exercises"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_case_exercise_student")
                    .table(Alias::new("plagiarism_cases"))
                    .col(Alias::new("exercise_id"))
                    .col(Alias::new("student_login"))
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("plagiarism_cases")).to_owned())
            .await
    }
}
