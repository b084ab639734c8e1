//! Parses the HTML report served at the URL returned by a run into
//! structured per-pair matches, keyed by the participant tags the uploader
//! used as directory prefixes.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::{Client, redirect};
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashMap;

/// One matched participant pair from the report, deduplicated: if the report
/// lists several file pairs for the same two participants, the row with the
/// most matched lines wins.
#[derive(Debug, Clone, Serialize)]
pub struct MossMatch {
    pub participant_a: String,
    pub participant_b: String,
    pub percent_a: u32,
    pub percent_b: u32,
    pub lines_matched: i64,
}

/// Fetches the report and parses it.
pub async fn fetch_matches(url: &str) -> Result<Vec<MossMatch>> {
    let html = fetch_html(url).await?;
    Ok(parse_matches(&html))
}

async fn fetch_html(url: &str) -> Result<String> {
    let client = Client::builder()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .redirect(redirect::Policy::limited(10))
        .build()
        .context("building HTTP client")?;

    let resp = client
        .get(url)
        .timeout(std::time::Duration::from_secs(60))
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .context("non-success status")?;

    let bytes = resp.bytes().await.context("reading body")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses the report's result table. Rows look like
/// `<tr><td><a>alice/Main.java (82%)</a></td><td><a>bob/Main.java (78%)</a></td><td>112</td></tr>`.
pub fn parse_matches(html: &str) -> Vec<MossMatch> {
    let doc = Html::parse_document(html);
    let tr_sel = Selector::parse("table tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let pct_re = Regex::new(r"^(?P<name>.+?)\s*\((?P<pct>\d+)%\)\s*$").unwrap();

    let mut rows = Vec::new();
    for tr in doc.select(&tr_sel) {
        let tds: Vec<_> = tr.select(&td_sel).collect();
        if tds.len() < 3 {
            continue;
        }

        let cell_text = |i: usize| -> String {
            tds[i].text().collect::<String>().trim().to_string()
        };

        let Some((part_a, pct_a)) = split_cell(&pct_re, &cell_text(0)) else {
            continue;
        };
        let Some((part_b, pct_b)) = split_cell(&pct_re, &cell_text(1)) else {
            continue;
        };
        let lines = cell_text(2).parse::<i64>().unwrap_or(0);

        // Self matches can appear when a participant uploaded several files.
        if part_a == part_b {
            continue;
        }

        rows.push(MossMatch {
            participant_a: part_a,
            participant_b: part_b,
            percent_a: pct_a,
            percent_b: pct_b,
            lines_matched: lines,
        });
    }

    dedupe_keep_best(rows)
}

/// Splits `alice/Main.java (82%)` into the participant tag and percentage.
fn split_cell(pct_re: &Regex, text: &str) -> Option<(String, u32)> {
    let caps = pct_re.captures(text)?;
    let name = caps.name("name")?.as_str();
    let pct = caps.name("pct")?.as_str().parse().ok()?;
    let participant = name.split('/').next().unwrap_or(name).trim().to_string();
    if participant.is_empty() {
        return None;
    }
    Some((participant, pct))
}

fn dedupe_keep_best(rows: Vec<MossMatch>) -> Vec<MossMatch> {
    let mut best: HashMap<(String, String), MossMatch> = HashMap::new();
    for row in rows {
        let key = if row.participant_a <= row.participant_b {
            (row.participant_a.clone(), row.participant_b.clone())
        } else {
            (row.participant_b.clone(), row.participant_a.clone())
        };
        match best.get(&key) {
            Some(existing) if existing.lines_matched >= row.lines_matched => {}
            _ => {
                best.insert(key, row);
            }
        }
    }
    let mut out: Vec<_> = best.into_values().collect();
    out.sort_by(|a, b| b.lines_matched.cmp(&a.lines_matched));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body><table>
        <tr><th>File 1</th><th>File 2</th><th>Lines Matched</th></tr>
        <tr>
          <td><a href="match0.html">alice/Main.java (82%)</a></td>
          <td><a href="match0.html">bob/Main.java (78%)</a></td>
          <td align="right">112</td>
        </tr>
        <tr>
          <td><a href="match1.html">alice/Util.java (40%)</a></td>
          <td><a href="match1.html">bob/Util.java (35%)</a></td>
          <td align="right">20</td>
        </tr>
        <tr>
          <td><a href="match2.html">carol/Main.java (12%)</a></td>
          <td><a href="match2.html">carol/Backup.java (12%)</a></td>
          <td align="right">300</td>
        </tr>
        </table></body></html>
    "#;

    #[test]
    fn parses_and_dedupes_pairs() {
        let matches = parse_matches(SAMPLE);
        // carol vs carol is a self match; alice/bob appears once (best row).
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.participant_a, "alice");
        assert_eq!(m.participant_b, "bob");
        assert_eq!(m.percent_a, 82);
        assert_eq!(m.percent_b, 78);
        assert_eq!(m.lines_matched, 112);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let matches = parse_matches("<table><tr><td>garbage</td></tr></table>");
        assert!(matches.is_empty());
    }
}
