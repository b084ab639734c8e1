//! External structural-similarity tool boundary for the programming domain.
//!
//! The runner only sees [`StructuralComparator`]; the bundled implementation
//! drives a MOSS-style service through [`moss_client`] and turns its report
//! into a [`ComparisonResultSet`].

use std::path::PathBuf;

use async_trait::async_trait;
use moss_client::{MossClient, MossOptions, SubmissionRoot};
use serde_json::json;

use crate::error::DetectionError;
use crate::vcs::WorkingCopy;

#[derive(Clone, Debug)]
pub struct ToolRunOptions {
    /// Tool-specific language identifier.
    pub language: String,
    /// One root directory per participant.
    pub roots: Vec<WorkingCopy>,
    /// Template/reference code excluded from mutual matching.
    pub base_code_dir: Option<PathBuf>,
    /// Percent threshold the caller will apply to the result.
    pub similarity_threshold: f64,
}

/// One pairwise match reported by the tool, in percent.
#[derive(Clone, Debug)]
pub struct ToolComparison {
    pub participant_a: String,
    pub participant_b: String,
    pub similarity: f64,
    pub lines_matched: i64,
}

#[derive(Debug, Default)]
pub struct ComparisonResultSet {
    pub comparisons: Vec<ToolComparison>,
    /// Report artifact written to disk, if any. The caller schedules its
    /// deletion independently of the working-copy cleanup.
    pub report_path: Option<PathBuf>,
}

#[async_trait]
pub trait StructuralComparator: Send + Sync {
    async fn run(&self, options: &ToolRunOptions) -> Result<ComparisonResultSet, DetectionError>;
}

/// Runs the analysis against a MOSS-style service and archives the parsed
/// report next to the working copies.
pub struct MossComparator {
    client: MossClient,
    report_dir: PathBuf,
}

impl MossComparator {
    pub fn new(user_id: &str, server: &str, port: u16, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: MossClient::new(user_id, server, port),
            report_dir: report_dir.into(),
        }
    }
}

#[async_trait]
impl StructuralComparator for MossComparator {
    async fn run(&self, options: &ToolRunOptions) -> Result<ComparisonResultSet, DetectionError> {
        let roots: Vec<SubmissionRoot> = options
            .roots
            .iter()
            .map(|copy| SubmissionRoot {
                participant: copy.participant.clone(),
                path: copy.path.clone(),
            })
            .collect();

        let moss_options = MossOptions {
            language: options.language.clone(),
            ..MossOptions::default()
        };

        let url = self
            .client
            .submit(&roots, options.base_code_dir.as_deref(), &moss_options)
            .await
            .map_err(|e| DetectionError::ExternalTool(format!("{e:#}")))?;
        log::info!("Structural analysis report available at {url}");

        let matches = moss_client::fetch_matches(&url)
            .await
            .map_err(|e| DetectionError::ExternalTool(format!("{e:#}")))?;

        let comparisons: Vec<ToolComparison> = matches
            .iter()
            .map(|m| ToolComparison {
                participant_a: m.participant_a.clone(),
                participant_b: m.participant_b.clone(),
                // The report gives one percentage per side; the pair's
                // similarity is their mean.
                similarity: f64::from(m.percent_a + m.percent_b) / 2.0,
                lines_matched: m.lines_matched,
            })
            .collect();

        let report_path = self.archive_report(&url, &matches).await;

        Ok(ComparisonResultSet {
            comparisons,
            report_path,
        })
    }
}

impl MossComparator {
    /// Best-effort: an unwritable report never fails the analysis.
    async fn archive_report(
        &self,
        url: &str,
        matches: &[moss_client::MossMatch],
    ) -> Option<PathBuf> {
        let path = self.report_dir.join(format!(
            "report-{}.json",
            chrono::Utc::now().timestamp_millis()
        ));
        let body = json!({ "url": url, "matches": matches });
        if let Err(e) = tokio::fs::create_dir_all(&self.report_dir).await {
            log::warn!("Could not create report dir: {e}");
            return None;
        }
        match tokio::fs::write(&path, body.to_string()).await {
            Ok(()) => Some(path),
            Err(e) => {
                log::warn!("Could not write report {}: {e}", path.display());
                None
            }
        }
    }
}
