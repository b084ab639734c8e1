pub mod m202509010001_create_users;
pub mod m202509010002_create_courses;
pub mod m202509010003_create_exercises;
pub mod m202509010004_create_detection_configs;
pub mod m202509010005_create_plagiarism_results;
pub mod m202509010006_create_plagiarism_comparisons;
pub mod m202509010007_create_plagiarism_cases;
pub mod m202509010008_create_plagiarism_submissions;
