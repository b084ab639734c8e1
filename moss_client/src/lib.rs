//! Client for a MOSS-style structural similarity service: uploads one
//! directory of source files per participant (plus optional base code that is
//! excluded from mutual matching) and retrieves the resulting report as a
//! structured set of pairwise matches.

pub mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use walkdir::WalkDir;

pub use report::{MossMatch, fetch_matches};

/// Options for a single run.
#[derive(Clone, Debug)]
pub struct MossOptions {
    pub language: String,
    /// How often a passage may appear before it is ignored as boilerplate.
    pub max_matches: u32,
    /// Number of matched pairs shown in the report.
    pub show_limit: u32,
}

impl Default for MossOptions {
    fn default() -> Self {
        Self {
            language: "java".to_string(),
            max_matches: 10,
            show_limit: 500,
        }
    }
}

/// One participant's working copy on disk. Every regular file under `path`
/// is uploaded under the participant's name.
#[derive(Clone, Debug)]
pub struct SubmissionRoot {
    pub participant: String,
    pub path: PathBuf,
}

pub struct MossClient {
    user_id: String,
    server: String,
    port: u16,
}

impl MossClient {
    pub fn new(user_id: &str, server: &str, port: u16) -> Self {
        Self {
            user_id: user_id.to_string(),
            server: server.to_string(),
            port,
        }
    }

    /// Uploads base code and submissions, returns the report URL.
    ///
    /// `base_dir` contents are sent as base files (id 0) so shared starter
    /// code does not produce mutual matches.
    pub async fn submit(
        &self,
        roots: &[SubmissionRoot],
        base_dir: Option<&Path>,
        opts: &MossOptions,
    ) -> Result<String> {
        if roots.len() < 2 {
            bail!("at least 2 submission roots are required");
        }

        let mut stream = TcpStream::connect((self.server.as_str(), self.port))
            .await
            .with_context(|| format!("connect to {}:{}", self.server, self.port))?;

        send_command(&mut stream, &format!("moss {}", self.user_id)).await?;
        send_command(&mut stream, "directory 1").await?;
        send_command(&mut stream, "X 0").await?;
        send_command(&mut stream, &format!("maxmatches {}", opts.max_matches)).await?;
        send_command(&mut stream, &format!("show {}", opts.show_limit)).await?;
        send_command(&mut stream, &format!("language {}", opts.language)).await?;

        // Language ack
        {
            let mut line = String::new();
            let mut reader = BufReader::new(&mut stream);
            reader
                .read_line(&mut line)
                .await
                .context("read language response")?;
            if line.trim() == "no" {
                bail!("language '{}' not supported by the server", opts.language);
            }
        }

        if let Some(base) = base_dir {
            self.upload_root(&mut stream, base, "base", 0, &opts.language)
                .await
                .context("upload base code")?;
        }

        let mut file_id = 1u32;
        for root in roots {
            let dir_tag = sanitize(&root.participant);
            file_id = self
                .upload_root(&mut stream, &root.path, &dir_tag, file_id, &opts.language)
                .await
                .with_context(|| format!("upload submission of '{}'", root.participant))?;
        }

        send_command(&mut stream, "query 0 ").await?;
        let mut response = String::new();
        {
            let mut reader = BufReader::new(&mut stream);
            reader
                .read_line(&mut response)
                .await
                .context("read query response")?;
        }
        send_command(&mut stream, "end").await?;

        let report_url = response.trim().to_string();
        if !report_url.starts_with("http") {
            bail!("invalid response from server: '{report_url}'");
        }
        Ok(report_url)
    }

    /// Uploads every regular file under `root`. Base files use id 0 (which
    /// never advances); submission files count up from `starting_file_id`.
    async fn upload_root(
        &self,
        stream: &mut TcpStream,
        root: &Path,
        dir_tag: &str,
        starting_file_id: u32,
        language: &str,
    ) -> Result<u32> {
        let mut next_id = starting_file_id;
        let mut uploaded = 0usize;

        for path in source_files(root) {
            let content = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;

            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let display_name = format!("{}/{}", dir_tag, rel.replace(' ', "_"));

            let header = format!(
                "file {} {} {} {}",
                next_id,
                language,
                content.len(),
                display_name
            );
            send_command(stream, &header).await?;
            stream
                .write_all(&content)
                .await
                .context("upload file content")?;

            if next_id > 0 {
                next_id += 1;
            }
            uploaded += 1;
        }

        if uploaded == 0 && starting_file_id > 0 {
            bail!("no files found under {}", root.display());
        }
        Ok(next_id)
    }
}

/* ---------------- small pure helpers ---------------- */

async fn send_command(stream: &mut TcpStream, command: &str) -> Result<()> {
    let cmd = format!("{command}\n");
    stream
        .write_all(cmd.as_bytes())
        .await
        .with_context(|| format!("send '{command}'"))
}

fn sanitize(s: &str) -> String {
    s.replace('\\', "_").replace('/', "_").replace(' ', "_")
}

/// Regular files under the root, skipping VCS metadata and hidden entries.
fn source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name().to_string_lossy().as_ref()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_flattens_separators() {
        assert_eq!(sanitize("team a/b"), "team_a_b");
    }

    #[test]
    fn hidden_entries_are_skipped() {
        assert!(is_hidden(".git"));
        assert!(!is_hidden("main.rs"));
    }
}
