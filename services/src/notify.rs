//! Notification collaborator boundary and the student-facing post builder.
//!
//! Delivery (mail, in-app messaging) lives outside this subsystem. Failures
//! from the collaborator are logged and swallowed by callers; a broken
//! mailer must never abort an analysis batch.

use async_trait::async_trait;
use chrono::Utc;
use db::models::{plagiarism_case, user};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[async_trait]
pub trait CaseNotifier: Send + Sync {
    /// Tells the notification subsystem a case now involves the student.
    async fn notify_case(
        &self,
        case: &plagiarism_case::Model,
        student: Option<&user::Model>,
    ) -> Result<(), String>;

    /// Tells the notification subsystem a verdict was reached.
    async fn notify_verdict(
        &self,
        case: &plagiarism_case::Model,
        student: Option<&user::Model>,
    ) -> Result<(), String>;
}

/// Default collaborator: notifications go to the log only.
pub struct LogNotifier;

#[async_trait]
impl CaseNotifier for LogNotifier {
    async fn notify_case(
        &self,
        case: &plagiarism_case::Model,
        student: Option<&user::Model>,
    ) -> Result<(), String> {
        log::info!(
            "Notify {} about plagiarism case {}",
            student.map(|u| u.username.as_str()).unwrap_or("<unresolved>"),
            case.id
        );
        Ok(())
    }

    async fn notify_verdict(
        &self,
        case: &plagiarism_case::Model,
        student: Option<&user::Model>,
    ) -> Result<(), String> {
        log::info!(
            "Notify {} about verdict {:?} on case {}",
            student.map(|u| u.username.as_str()).unwrap_or("<unresolved>"),
            case.verdict,
            case.id
        );
        Ok(())
    }
}

/// Student-facing notification artifact attached to a case. Stored on the
/// case as JSON; its presence is what marks the student as notified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
}

impl PostPayload {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "content": self.content,
            "created_at": Utc::now(),
        })
    }
}

/// Builds the localized post for a continuous-control case. Only English and
/// German are offered; anything else falls back to English.
pub fn build_case_post(
    language: &str,
    exercise_title: &str,
    course_title: &str,
    policy_url: &str,
) -> PostPayload {
    match language {
        "de" => PostPayload {
            title: format!("Plagiatsverdacht in {exercise_title}"),
            content: format!(
                "Bei der automatischen Ähnlichkeitsanalyse der Aufgabe \"{exercise_title}\" \
                 im Kurs \"{course_title}\" wurde Ihre Abgabe auffällig. Ein Prüfer wird den \
                 Fall begutachten. Informationen zum Umgang mit Plagiaten finden Sie unter: \
                 {policy_url}"
            ),
        },
        _ => PostPayload {
            title: format!("Plagiarism suspicion in {exercise_title}"),
            content: format!(
                "The automated similarity analysis of exercise \"{exercise_title}\" in course \
                 \"{course_title}\" flagged your submission. An instructor will review the \
                 case. See the policy on academic misconduct: {policy_url}"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_is_localized_by_language() {
        let en = build_case_post("en", "Ex 1", "CS 101", "https://policy");
        let de = build_case_post("de", "Ex 1", "CS 101", "https://policy");
        let fallback = build_case_post("fr", "Ex 1", "CS 101", "https://policy");
        assert!(en.title.starts_with("Plagiarism suspicion"));
        assert!(de.title.starts_with("Plagiatsverdacht"));
        assert_eq!(fallback.title, en.title);
        for post in [&en, &de] {
            assert!(post.content.contains("Ex 1"));
            assert!(post.content.contains("CS 101"));
            assert!(post.content.contains("https://policy"));
        }
    }

    #[test]
    fn post_json_carries_creation_time() {
        let post = build_case_post("en", "Ex", "C", "u").to_json();
        assert!(post.get("created_at").is_some());
        assert_eq!(post["title"], "Plagiarism suspicion in Ex");
    }
}
