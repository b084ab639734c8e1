use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202509010001_create_users::Migration),
            Box::new(migrations::m202509010002_create_courses::Migration),
            Box::new(migrations::m202509010003_create_exercises::Migration),
            Box::new(migrations::m202509010004_create_detection_configs::Migration),
            Box::new(migrations::m202509010005_create_plagiarism_results::Migration),
            Box::new(migrations::m202509010006_create_plagiarism_comparisons::Migration),
            Box::new(migrations::m202509010007_create_plagiarism_cases::Migration),
            Box::new(migrations::m202509010008_create_plagiarism_submissions::Migration),
        ]
    }
}
