pub mod user;
pub mod course;
pub mod exercise;
pub mod detection_config;
pub mod plagiarism_result;
pub mod plagiarism_comparison;
pub mod plagiarism_submission;
pub mod plagiarism_case;

pub use user::Entity as User;
pub use course::Entity as Course;
pub use exercise::Entity as Exercise;
pub use detection_config::Entity as DetectionConfig;
pub use plagiarism_result::Entity as PlagiarismResult;
pub use plagiarism_comparison::Entity as PlagiarismComparison;
pub use plagiarism_submission::Entity as PlagiarismSubmission;
pub use plagiarism_case::Entity as PlagiarismCase;
