use sea_orm::DbErr;
use thiserror::Error;

/// Failure taxonomy of the detection engine. On-demand checks surface these
/// directly to the caller; the continuous control loop catches them per
/// exercise and records them in its batch report instead.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("a plagiarism check is already running for course {course_id}")]
    AlreadyRunning { course_id: i64 },

    #[error("insufficient eligible submissions for comparison ({available} available, 2 required)")]
    InsufficientSubmissions { available: usize },

    #[error("programming language '{0}' is not supported for plagiarism checks")]
    UnsupportedLanguage(String),

    #[error("exercise type '{0}' is not supported for plagiarism checks")]
    UnsupportedExerciseType(String),

    #[error("external comparison tool failed: {0}")]
    ExternalTool(String),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
