//! Pairwise comparison sweep.
//!
//! Exhaustive detection is inherently O(n²) comparator invocations: every
//! unordered pair of eligible submissions is compared exactly once via an
//! upper-triangular sweep. No sub-quadratic approximation is applied; the
//! comparison cap only bounds what is *stored*, not what is compared.

use std::time::{Duration, Instant};

use crate::similarity::{ElementMatch, SimilarityComparator};

/// Frozen, comparison-scoped projection of one participant's latest
/// submission. The engine clones it into every comparison it appears in, so
/// each comparison owns independent copies.
#[derive(Clone, Debug)]
pub struct CandidateSubmission {
    /// Id of the underlying submission in the exercise subsystem.
    pub submission_ref: i64,
    /// Identity used for pair distinctness (login or team name).
    pub participant: String,
    /// Singular student behind the submission, when resolvable.
    pub student_login: Option<String>,
    pub score: Option<f64>,
    /// Size metric: element count, or diff lines for programming.
    pub size: i64,
    pub elements: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckState {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckState::Running => "running",
            CheckState::Completed => "completed",
            CheckState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Receives incremental progress so a UI can display it. Implementations
/// must not block; a failed notification never aborts the sweep.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, exercise_id: i64, state: CheckState, detail: &str) -> Result<(), String>;
}

/// Default observer: progress goes to the log.
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn notify(&self, exercise_id: i64, state: CheckState, detail: &str) -> Result<(), String> {
        log::info!("Plagiarism check for exercise {exercise_id} [{state}]: {detail}");
        Ok(())
    }
}

/// One emitted comparison; similarity is in percent.
#[derive(Clone, Debug)]
pub struct ScoredComparison {
    pub submission_a: CandidateSubmission,
    pub submission_b: CandidateSubmission,
    pub similarity: f64,
    pub matches: Vec<ElementMatch>,
}

/// Outcome of one sweep. The distribution is computed over the full
/// (pre-truncation) comparison set.
#[derive(Debug)]
pub struct EngineRun {
    pub comparisons: Vec<ScoredComparison>,
    pub distribution: [i64; 10],
    pub duration: Duration,
}

pub struct ComparisonEngine<'a> {
    comparator: &'a dyn SimilarityComparator,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ComparisonEngine<'a> {
    pub fn new(comparator: &'a dyn SimilarityComparator, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            comparator,
            observer,
        }
    }

    /// Runs the sweep.
    ///
    /// Candidates with fewer than `minimum_element_count` elements are
    /// excluded up front, not merely scored low. Comparisons below
    /// `minimum_similarity` (percent) are dropped, a hard filter.
    pub fn compare_all(
        &self,
        exercise_id: i64,
        candidates: Vec<CandidateSubmission>,
        minimum_similarity: f64,
        minimum_element_count: usize,
    ) -> EngineRun {
        let eligible: Vec<CandidateSubmission> = candidates
            .into_iter()
            .filter(|c| c.elements.len() >= minimum_element_count)
            .collect();

        let n = eligible.len();
        let start = Instant::now();
        let mut comparisons = Vec::new();

        for i in 0..n {
            self.notify(
                exercise_id,
                CheckState::Running,
                &format!("Comparing submission {}/{}", i + 1, n),
            );
            for j in (i + 1)..n {
                let a = &eligible[i];
                let b = &eligible[j];
                // Pair invariant: never compare a participant to themselves.
                if a.participant == b.participant {
                    continue;
                }

                let similarity = self.comparator.compare(&a.elements, &b.elements) * 100.0;
                if similarity < minimum_similarity {
                    continue;
                }

                let matches = self.comparator.matches(&a.elements, &b.elements);
                comparisons.push(ScoredComparison {
                    submission_a: a.clone(),
                    submission_b: b.clone(),
                    similarity,
                    matches,
                });
            }
        }

        let duration = start.elapsed();
        let distribution = similarity_distribution(comparisons.iter().map(|c| c.similarity));

        EngineRun {
            comparisons,
            distribution,
            duration,
        }
    }

    fn notify(&self, exercise_id: i64, state: CheckState, detail: &str) {
        if let Err(e) = self.observer.notify(exercise_id, state, detail) {
            log::debug!("Progress notification failed (ignored): {e}");
        }
    }
}

/// Minimum-score eligibility gate, shared by all domains: a minimum of 0
/// admits everything (including unscored submissions); otherwise unscored
/// submissions are excluded.
pub fn meets_minimum_score(score: Option<f64>, minimum_score: i32) -> bool {
    minimum_score == 0 || score.map_or(false, |s| s >= f64::from(minimum_score))
}

/// Ten-bucket histogram over similarities in percent. Bucket i counts
/// [i*10, (i+1)*10); exactly 100 lands in the last bucket.
pub fn similarity_distribution(similarities: impl Iterator<Item = f64>) -> [i64; 10] {
    let mut buckets = [0i64; 10];
    for similarity in similarities {
        let bucket = ((similarity / 10.0) as usize).min(9);
        buckets[bucket] += 1;
    }
    buckets
}

/// Shared post-processing for every domain: order by descending similarity
/// (ties broken by participants, for determinism) and cap the stored set.
/// Unbounded comparison sets from large cohorts exceed storage practicality.
pub fn sort_and_truncate(comparisons: &mut Vec<ScoredComparison>, cap: usize) {
    comparisons.sort_by(|x, y| {
        y.similarity
            .partial_cmp(&x.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.submission_a.participant.cmp(&y.submission_a.participant))
            .then_with(|| x.submission_b.participant.cmp(&y.submission_b.participant))
    });
    comparisons.truncate(cap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::TextComparator;

    struct FixedComparator(f64);

    impl SimilarityComparator for FixedComparator {
        fn compare(&self, _a: &[String], _b: &[String]) -> f64 {
            self.0
        }
    }

    /// Observer that always fails, to prove failures don't abort the sweep.
    struct FailingObserver;

    impl ProgressObserver for FailingObserver {
        fn notify(&self, _: i64, _: CheckState, _: &str) -> Result<(), String> {
            Err("socket closed".into())
        }
    }

    fn candidate(participant: &str, elements: &[&str]) -> CandidateSubmission {
        CandidateSubmission {
            submission_ref: participant.len() as i64,
            participant: participant.to_string(),
            student_login: Some(participant.to_string()),
            score: Some(100.0),
            size: elements.len() as i64,
            elements: elements.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn many_elements(n: usize, seed: &str) -> Vec<String> {
        (0..n).map(|i| format!("{seed}{i}")).collect()
    }

    #[test]
    fn emits_each_unordered_pair_at_most_once() {
        let comparator = FixedComparator(1.0);
        let engine = ComparisonEngine::new(&comparator, &LogObserver);
        let candidates: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|p| candidate(p, &["x", "y", "z"]))
            .collect();
        let run = engine.compare_all(1, candidates, 0.0, 0);
        assert_eq!(run.comparisons.len(), 4 * 3 / 2);
        for c in &run.comparisons {
            assert_ne!(c.submission_a.participant, c.submission_b.participant);
        }
    }

    #[test]
    fn threshold_is_a_hard_filter() {
        let comparator = FixedComparator(0.5);
        let engine = ComparisonEngine::new(&comparator, &LogObserver);
        let candidates = vec![candidate("alice", &["a"]), candidate("bob", &["b"])];
        let run = engine.compare_all(1, candidates, 80.0, 0);
        assert!(run.comparisons.is_empty());
        assert_eq!(run.distribution, [0i64; 10]);
    }

    #[test]
    fn matching_pair_is_emitted_with_scaled_similarity() {
        let comparator = FixedComparator(0.92);
        let engine = ComparisonEngine::new(&comparator, &LogObserver);
        let mut alice = candidate("alice", &[]);
        alice.elements = many_elements(50, "a");
        alice.size = 50;
        let mut bob = candidate("bob", &[]);
        bob.elements = many_elements(50, "b");
        bob.size = 50;

        let run = engine.compare_all(1, vec![alice, bob], 80.0, 10);
        assert_eq!(run.comparisons.len(), 1);
        let c = &run.comparisons[0];
        assert!((c.similarity - 92.0).abs() < 1e-9);
        assert_eq!(c.submission_a.participant, "alice");
        assert_eq!(c.submission_b.participant, "bob");
    }

    #[test]
    fn undersized_submissions_never_appear() {
        let comparator = FixedComparator(1.0);
        let engine = ComparisonEngine::new(&comparator, &LogObserver);
        let tiny = candidate("tiny", &["a", "b", "c"]);
        let mut big_a = candidate("alice", &[]);
        big_a.elements = many_elements(20, "a");
        let mut big_b = candidate("bob", &[]);
        big_b.elements = many_elements(20, "b");

        let run = engine.compare_all(1, vec![tiny, big_a, big_b], 0.0, 10);
        assert_eq!(run.comparisons.len(), 1);
        for c in &run.comparisons {
            assert_ne!(c.submission_a.participant, "tiny");
            assert_ne!(c.submission_b.participant, "tiny");
        }
    }

    #[test]
    fn failing_observer_does_not_abort_sweep() {
        let comparator = FixedComparator(1.0);
        let engine = ComparisonEngine::new(&comparator, &FailingObserver);
        let candidates = vec![candidate("alice", &["a"]), candidate("bob", &["b"])];
        let run = engine.compare_all(1, candidates, 0.0, 0);
        assert_eq!(run.comparisons.len(), 1);
    }

    #[test]
    fn histogram_counts_every_comparison_once() {
        let sims = [0.0, 9.9, 10.0, 55.0, 99.9, 100.0];
        let buckets = similarity_distribution(sims.iter().copied());
        assert_eq!(buckets.iter().sum::<i64>(), sims.len() as i64);
        assert_eq!(buckets[0], 2);
        assert_eq!(buckets[1], 1);
        assert_eq!(buckets[5], 1);
        // 99.9 and exactly 100 both land in the last bucket.
        assert_eq!(buckets[9], 2);
    }

    #[test]
    fn sort_and_truncate_orders_descending_and_caps() {
        let mk = |p: &str, sim: f64| ScoredComparison {
            submission_a: candidate(p, &["x"]),
            submission_b: candidate("other", &["y"]),
            similarity: sim,
            matches: Vec::new(),
        };
        let mut comparisons = vec![mk("a", 50.0), mk("b", 99.0), mk("c", 75.0), mk("d", 60.0)];
        sort_and_truncate(&mut comparisons, 3);
        assert_eq!(comparisons.len(), 3);
        let sims: Vec<f64> = comparisons.iter().map(|c| c.similarity).collect();
        assert_eq!(sims, vec![99.0, 75.0, 60.0]);
    }

    #[test]
    fn real_comparator_pair_runs_symmetrically_through_engine() {
        let comparator = TextComparator::default();
        let engine = ComparisonEngine::new(&comparator, &LogObserver);
        let a = candidate("alice", &["p", "q", "r", "s", "t"]);
        let b = candidate("bob", &["q", "r", "s", "t", "u"]);
        let forward = engine.compare_all(1, vec![a.clone(), b.clone()], 0.0, 0);
        let backward = engine.compare_all(1, vec![b, a], 0.0, 0);
        assert_eq!(
            forward.comparisons[0].similarity,
            backward.comparisons[0].similarity
        );
    }
}
