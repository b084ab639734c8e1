//! Programming-domain runner behavior against a staged storage root and a
//! scripted external tool: eligibility filters, the base-code retry, the
//! stale-result purge, and the guaranteed cleanup scheduling.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use db::models::{
    course, detection_config, exercise,
    exercise::ExerciseType,
    plagiarism_comparison, plagiarism_result,
};
use db::test_utils::setup_test_db;
use sea_orm::DatabaseConnection;
use services::cache::PlagiarismCache;
use services::cleanup::CleanupQueue;
use services::engine::LogObserver;
use services::error::DetectionError;
use services::programming::{ProgrammingCheckSettings, ProgrammingDetectionService};
use services::store;
use services::structural::{
    ComparisonResultSet, StructuralComparator, ToolComparison, ToolRunOptions,
};
use services::vcs::{FsWorkingCopyProvider, ParticipationRef};

/// Scripted tool double: records every invocation and can be told to fail
/// always or only while base code is configured.
struct ScriptedTool {
    fail_always: bool,
    fail_with_base: bool,
    comparisons: Vec<ToolComparison>,
    invocations: Mutex<Vec<(Option<PathBuf>, Vec<String>)>>,
}

impl ScriptedTool {
    fn succeeding(comparisons: Vec<ToolComparison>) -> Self {
        Self {
            fail_always: false,
            fail_with_base: false,
            comparisons,
            invocations: Mutex::new(Vec::new()),
        }
    }

    fn invocations(&self) -> Vec<(Option<PathBuf>, Vec<String>)> {
        self.invocations.lock().expect("invocations lock").clone()
    }
}

#[async_trait]
impl StructuralComparator for ScriptedTool {
    async fn run(&self, options: &ToolRunOptions) -> Result<ComparisonResultSet, DetectionError> {
        let participants = options
            .roots
            .iter()
            .map(|r| r.participant.clone())
            .collect();
        self.invocations
            .lock()
            .expect("invocations lock")
            .push((options.base_code_dir.clone(), participants));

        if self.fail_always || (self.fail_with_base && options.base_code_dir.is_some()) {
            return Err(DetectionError::ExternalTool("tool rejected the run".into()));
        }
        Ok(ComparisonResultSet {
            comparisons: self.comparisons.clone(),
            report_path: None,
        })
    }
}

fn tool_comparison(a: &str, b: &str, similarity: f64) -> ToolComparison {
    ToolComparison {
        participant_a: a.to_string(),
        participant_b: b.to_string(),
        similarity,
        lines_matched: 42,
    }
}

fn participation(id: i64, participant: &str) -> ParticipationRef {
    ParticipationRef {
        participation_id: id,
        participant: participant.to_string(),
        student_login: Some(participant.to_string()),
        submission_ref: id * 10,
        score: Some(100.0),
        repository_uri: Some(format!("local:{participant}")),
        practice_mode: false,
    }
}

/// Stages `storage_root/exercise-<id>` with repos and the manifest.
fn stage_storage(
    storage_root: &Path,
    exercise_id: i64,
    repos: &[(&str, &str)],
    template: Option<&str>,
    participations: &[ParticipationRef],
) {
    let base = storage_root.join(format!("exercise-{exercise_id}"));
    for (participant, content) in repos {
        let dir = base.join("repos").join(participant);
        std::fs::create_dir_all(&dir).expect("repo dir");
        std::fs::write(dir.join("Main.java"), content).expect("repo file");
    }
    if let Some(content) = template {
        let dir = base.join("template");
        std::fs::create_dir_all(&dir).expect("template dir");
        std::fs::write(dir.join("Main.java"), content).expect("template file");
    }
    std::fs::write(
        base.join("participations.json"),
        serde_json::to_string(participations).expect("manifest json"),
    )
    .expect("manifest");
}

async fn seed_programming_exercise(db: &DatabaseConnection) -> exercise::Model {
    let course = course::Model::create(db, "Algorithms", "ALG01")
        .await
        .expect("course");
    exercise::Model::create(
        db,
        course.id,
        "Sorting",
        ExerciseType::Programming,
        Some("java"),
        Utc::now() + ChronoDuration::days(7),
    )
    .await
    .expect("exercise")
}

fn config_for(exercise_id: i64, threshold: f32, minimum_size: i32) -> detection_config::Model {
    let now = Utc::now();
    detection_config::Model {
        id: 0,
        exercise_id,
        similarity_threshold: threshold,
        minimum_score: 0,
        minimum_size,
        created_at: now,
        updated_at: now,
    }
}

struct Harness {
    service: ProgrammingDetectionService,
    cleanup: CleanupQueue,
    cache: PlagiarismCache,
}

fn build_service(
    db: &DatabaseConnection,
    storage_root: &Path,
    clone_root: &Path,
    tool: Arc<ScriptedTool>,
) -> Harness {
    let provider = Arc::new(FsWorkingCopyProvider::new(storage_root));
    let cleanup = CleanupQueue::start();
    let cache = PlagiarismCache::new();
    let service = ProgrammingDetectionService::new(
        db.clone(),
        cache.clone(),
        provider.clone(),
        provider,
        tool,
        Arc::new(LogObserver),
        cleanup.clone(),
        ProgrammingCheckSettings {
            clone_root: clone_root.to_path_buf(),
            download_concurrency: 4,
            tool_timeout: Duration::from_secs(5),
            repo_cleanup_delay: Duration::from_secs(60),
            report_cleanup_delay: Duration::from_secs(60),
            max_comparisons: 500,
        },
    );
    Harness {
        service,
        cleanup,
        cache,
    }
}

const BIG_SOURCE: &str = "class Main {\nint a = 1;\nint b = 2;\nint c = 3;\nint d = 4;\nint e = 5;\nint f = 6;\n}\n";

#[tokio::test]
async fn fewer_than_two_eligible_participations_fail_fast() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[("alice", BIG_SOURCE)],
        None,
        &[participation(1, "alice")],
    );

    let tool = Arc::new(ScriptedTool::succeeding(vec![]));
    let harness = build_service(&db, storage.path(), clones.path(), tool.clone());

    let err = harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        DetectionError::InsufficientSubmissions { available: 1 }
    ));
    assert!(tool.invocations().is_empty());
    let stored = plagiarism_result::Entity::latest_for_exercise(&db, exercise.id)
        .await
        .expect("query");
    assert!(stored.is_none());
}

#[tokio::test]
async fn successful_check_stores_the_filtered_result() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[("alice", BIG_SOURCE), ("bob", BIG_SOURCE)],
        None,
        &[participation(1, "alice"), participation(2, "bob")],
    );

    // One pair above the threshold, one below: only the first survives.
    let tool = Arc::new(ScriptedTool::succeeding(vec![
        tool_comparison("alice", "bob", 95.0),
        tool_comparison("bob", "alice", 50.0),
    ]));
    let harness = build_service(&db, storage.path(), clones.path(), tool.clone());

    let result = harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect("check");

    let comparisons = plagiarism_comparison::Entity::list_for_result(&db, result.id)
        .await
        .expect("list");
    assert_eq!(comparisons.len(), 1);
    assert!((comparisons[0].similarity - 95.0).abs() < 1e-3);
    assert!(comparisons[0].matches.is_some());
    assert_eq!(result.distribution().iter().sum::<i64>(), 1);

    // Working copies were scheduled for deferred deletion.
    assert!(harness.cleanup.scheduled_count() >= 1);
    // The guard was released: a follow-up check may start.
    assert!(harness.cache.acquire(exercise.course_id).is_ok());
}

#[tokio::test]
async fn base_code_failure_triggers_one_retry_without_base() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[("alice", BIG_SOURCE), ("bob", BIG_SOURCE)],
        Some("class Main {\n}\n"),
        &[participation(1, "alice"), participation(2, "bob")],
    );

    let tool = Arc::new(ScriptedTool {
        fail_always: false,
        fail_with_base: true,
        comparisons: vec![tool_comparison("alice", "bob", 93.0)],
        invocations: Mutex::new(Vec::new()),
    });
    let harness = build_service(&db, storage.path(), clones.path(), tool.clone());

    let result = harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect("check succeeds on retry");

    let invocations = tool.invocations();
    assert_eq!(invocations.len(), 2);
    assert!(invocations[0].0.is_some(), "first run uses the template");
    assert!(invocations[1].0.is_none(), "retry drops the base code");

    let comparisons = plagiarism_comparison::Entity::list_for_result(&db, result.id)
        .await
        .expect("list");
    assert_eq!(comparisons.len(), 1);
}

#[tokio::test]
async fn final_tool_failure_purges_the_stale_result() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[("alice", BIG_SOURCE), ("bob", BIG_SOURCE)],
        None,
        &[participation(1, "alice"), participation(2, "bob")],
    );

    store::save_run(&db, exercise.id, Duration::from_millis(1), [0; 10], vec![])
        .await
        .expect("stale result");

    let tool = Arc::new(ScriptedTool {
        fail_always: true,
        fail_with_base: false,
        comparisons: vec![],
        invocations: Mutex::new(Vec::new()),
    });
    let harness = build_service(&db, storage.path(), clones.path(), tool.clone());

    let err = harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect_err("tool failure surfaces");
    assert!(matches!(err, DetectionError::ExternalTool(_)));

    let stored = plagiarism_result::Entity::latest_for_exercise(&db, exercise.id)
        .await
        .expect("query");
    assert!(stored.is_none(), "stale result must be purged");

    // Cleanup still runs on the failure path.
    assert!(harness.cleanup.scheduled_count() >= 1);
    assert!(harness.cache.acquire(exercise.course_id).is_ok());
}

#[tokio::test]
async fn undersized_repositories_are_excluded_before_the_tool_runs() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[
            ("alice", BIG_SOURCE),
            ("bob", "class Main {}\n"),
            ("carol", BIG_SOURCE),
        ],
        None,
        &[
            participation(1, "alice"),
            participation(2, "bob"),
            participation(3, "carol"),
        ],
    );

    let tool = Arc::new(ScriptedTool::succeeding(vec![tool_comparison(
        "alice", "carol", 96.0,
    )]));
    let harness = build_service(&db, storage.path(), clones.path(), tool.clone());

    harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 5))
        .await
        .expect("check");

    let invocations = tool.invocations();
    assert_eq!(invocations.len(), 1);
    let mut participants = invocations[0].1.clone();
    participants.sort();
    assert_eq!(participants, vec!["alice", "carol"]);
}

#[tokio::test]
async fn concurrent_check_for_the_same_course_is_rejected() {
    let db = setup_test_db().await;
    let exercise = seed_programming_exercise(&db).await;
    let storage = tempfile::tempdir().expect("storage");
    let clones = tempfile::tempdir().expect("clones");

    stage_storage(
        storage.path(),
        exercise.id,
        &[("alice", BIG_SOURCE), ("bob", BIG_SOURCE)],
        None,
        &[participation(1, "alice"), participation(2, "bob")],
    );

    let tool = Arc::new(ScriptedTool::succeeding(vec![]));
    let harness = build_service(&db, storage.path(), clones.path(), tool);

    let guard = harness
        .cache
        .acquire(exercise.course_id)
        .expect("simulated active run");

    let err = harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, DetectionError::AlreadyRunning { .. }));

    guard.release();
    // With the course free again the check goes through.
    harness
        .service
        .check_exercise(&exercise, &config_for(exercise.id, 90.0, 0))
        .await
        .expect("second attempt succeeds");
}
