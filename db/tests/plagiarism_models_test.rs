//! Persistence behavior of the plagiarism entities: latest-result-only
//! replacement, cascade ownership, targeted column updates, and the
//! one-way post attachment.

use chrono::{Duration, Utc};
use db::models::{
    course, detection_config, exercise,
    exercise::ExerciseType,
    plagiarism_case, plagiarism_comparison, plagiarism_result,
    plagiarism_result::{NewComparison, NewSubmission},
    plagiarism_submission,
};
use db::test_utils::setup_test_db;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

fn submission(participant: &str, submission_ref: i64) -> NewSubmission {
    NewSubmission {
        submission_ref,
        participant: participant.to_string(),
        student_login: Some(participant.to_string()),
        size: 40,
        elements: vec!["a".to_string(), "b".to_string()],
    }
}

fn new_comparison(a: &str, b: &str, similarity: f32) -> NewComparison {
    NewComparison {
        similarity,
        matches: None,
        submission_a: submission(a, 1),
        submission_b: submission(b, 2),
    }
}

async fn seed_exercise(db: &DatabaseConnection) -> exercise::Model {
    let course = course::Model::create(db, "Databases", "DB01")
        .await
        .expect("course");
    exercise::Model::create(
        db,
        course.id,
        "Joins",
        ExerciseType::Text,
        None,
        Utc::now() + Duration::days(5),
    )
    .await
    .expect("exercise")
}

#[tokio::test]
async fn saving_a_result_replaces_the_previous_one() {
    let db = setup_test_db().await;
    let exercise = seed_exercise(&db).await;

    let first = plagiarism_result::Entity::save_replacing_previous(
        &db,
        exercise.id,
        120,
        [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        vec![new_comparison("alice", "bob", 5.0)],
    )
    .await
    .expect("first save");

    let second = plagiarism_result::Entity::save_replacing_previous(
        &db,
        exercise.id,
        80,
        [0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
        vec![
            new_comparison("alice", "bob", 95.0),
            new_comparison("alice", "carol", 91.0),
        ],
    )
    .await
    .expect("second save");

    let results = plagiarism_result::Entity::find()
        .all(&db)
        .await
        .expect("all results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, second.id);
    assert_ne!(results[0].id, first.id);

    // The old result's comparisons and submissions went with it.
    let comparisons = plagiarism_comparison::Entity::find()
        .count(&db)
        .await
        .expect("count comparisons");
    assert_eq!(comparisons, 2);
    let submissions = plagiarism_submission::Entity::find()
        .count(&db)
        .await
        .expect("count submissions");
    assert_eq!(submissions, 4);

    let latest = plagiarism_result::Entity::latest_for_exercise(&db, exercise.id)
        .await
        .expect("latest")
        .expect("present");
    assert_eq!(latest.duration_ms, 80);
    assert_eq!(latest.distribution(), [0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
}

#[tokio::test]
async fn deleting_for_exercise_purges_everything() {
    let db = setup_test_db().await;
    let exercise = seed_exercise(&db).await;

    plagiarism_result::Entity::save_replacing_previous(
        &db,
        exercise.id,
        10,
        [0; 10],
        vec![new_comparison("alice", "bob", 92.0)],
    )
    .await
    .expect("save");

    let removed = plagiarism_result::Entity::delete_for_exercise(&db, exercise.id)
        .await
        .expect("delete");
    assert_eq!(removed, 1);

    assert_eq!(
        plagiarism_comparison::Entity::find()
            .count(&db)
            .await
            .expect("count"),
        0
    );
    assert_eq!(
        plagiarism_submission::Entity::find()
            .count(&db)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn set_case_updates_only_the_owner_column() {
    let db = setup_test_db().await;
    let exercise = seed_exercise(&db).await;

    let result = plagiarism_result::Entity::save_replacing_previous(
        &db,
        exercise.id,
        10,
        [0; 10],
        vec![new_comparison("alice", "bob", 92.0)],
    )
    .await
    .expect("save");
    let comparisons = plagiarism_comparison::Entity::list_for_result(&db, result.id)
        .await
        .expect("list");
    let submissions = plagiarism_submission::Entity::for_comparison(&db, comparisons[0].id)
        .await
        .expect("submissions");
    let target = &submissions[0];

    let case = plagiarism_case::Model::create(&db, exercise.id, "alice", false)
        .await
        .expect("case");

    plagiarism_submission::Entity::set_case(&db, target.id, Some(case.id))
        .await
        .expect("set case");

    let reloaded = plagiarism_submission::Entity::find_by_id(target.id)
        .one(&db)
        .await
        .expect("reload")
        .expect("present");
    assert_eq!(reloaded.case_id, Some(case.id));
    // Everything else is untouched.
    assert_eq!(reloaded.participant, target.participant);
    assert_eq!(reloaded.size, target.size);
    assert_eq!(reloaded.elements_vec(), vec!["a", "b"]);

    plagiarism_submission::Entity::set_case(&db, target.id, None)
        .await
        .expect("clear case");
    let cleared = plagiarism_submission::Entity::find_by_id(target.id)
        .one(&db)
        .await
        .expect("reload")
        .expect("present");
    assert_eq!(cleared.case_id, None);
}

#[tokio::test]
async fn post_attachment_is_one_way() {
    let db = setup_test_db().await;
    let exercise = seed_exercise(&db).await;
    let case = plagiarism_case::Model::create(&db, exercise.id, "alice", true)
        .await
        .expect("case");

    let first = plagiarism_case::Entity::attach_post(
        &db,
        case.id,
        serde_json::json!({"title": "original"}),
    )
    .await
    .expect("attach");
    assert!(first);

    let second = plagiarism_case::Entity::attach_post(
        &db,
        case.id,
        serde_json::json!({"title": "replacement"}),
    )
    .await
    .expect("attach again");
    assert!(!second);

    let reloaded = plagiarism_case::Entity::find_by_id(case.id)
        .one(&db)
        .await
        .expect("reload")
        .expect("present");
    let post = reloaded.post.expect("post kept");
    assert_eq!(post["title"], "original");
}

#[tokio::test]
async fn detection_config_is_created_lazily_with_defaults() {
    let db = setup_test_db().await;
    let exercise = seed_exercise(&db).await;

    let created = detection_config::Entity::get_or_create_default(&db, exercise.id)
        .await
        .expect("create");
    assert_eq!(
        created.similarity_threshold,
        detection_config::DEFAULT_SIMILARITY_THRESHOLD
    );
    assert_eq!(created.minimum_size, detection_config::DEFAULT_MINIMUM_SIZE);

    let again = detection_config::Entity::get_or_create_default(&db, exercise.id)
        .await
        .expect("reuse");
    assert_eq!(again.id, created.id);
    assert_eq!(
        detection_config::Entity::find()
            .count(&db)
            .await
            .expect("count"),
        1
    );
}

#[tokio::test]
async fn continuous_control_eligibility_respects_due_dates() {
    let db = setup_test_db().await;
    let course = course::Model::create(&db, "Systems", "SYS01")
        .await
        .expect("course");

    let running = exercise::Model::create(
        &db,
        course.id,
        "Running",
        ExerciseType::Text,
        None,
        Utc::now() + Duration::days(1),
    )
    .await
    .expect("exercise");
    exercise::Entity::enable_continuous_control(&db, running.id, false)
        .await
        .expect("flag");

    let over = exercise::Model::create(
        &db,
        course.id,
        "Over",
        ExerciseType::Text,
        None,
        Utc::now() - Duration::days(1),
    )
    .await
    .expect("exercise");
    exercise::Entity::enable_continuous_control(&db, over.id, false)
        .await
        .expect("flag");

    let over_opted_in = exercise::Model::create(
        &db,
        course.id,
        "Over+",
        ExerciseType::Text,
        None,
        Utc::now() - Duration::days(1),
    )
    .await
    .expect("exercise");
    exercise::Entity::enable_continuous_control(&db, over_opted_in.id, true)
        .await
        .expect("flag");

    // Never flagged at all.
    exercise::Model::create(
        &db,
        course.id,
        "Unflagged",
        ExerciseType::Text,
        None,
        Utc::now() + Duration::days(1),
    )
    .await
    .expect("exercise");

    let due = exercise::Entity::find_due_for_continuous_control(&db, Utc::now())
        .await
        .expect("query");
    let ids: Vec<i64> = due.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![running.id, over_opted_in.id]);
}
