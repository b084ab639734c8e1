//! Domain-specific similarity functions.
//!
//! Every comparator maps two ordered element sequences to a similarity in
//! [0.0, 1.0]. Implementations must be pure, deterministic for identical
//! inputs, and commutative; the engine scales to percent and applies
//! thresholds.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One element-level correspondence between the two sides, used for
/// highlighting in the review UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMatch {
    pub start_a: usize,
    pub start_b: usize,
    pub length: usize,
}

pub trait SimilarityComparator: Send + Sync {
    /// Similarity of the two element sequences in [0.0, 1.0].
    fn compare(&self, a: &[String], b: &[String]) -> f64;

    /// Element correspondences backing the score. Optional; comparators
    /// without positional information return nothing.
    fn matches(&self, _a: &[String], _b: &[String]) -> Vec<ElementMatch> {
        Vec::new()
    }
}

/// Token-window comparator for text submissions: Jaccard similarity over the
/// sets of `window`-grams. Sequences shorter than the window fall back to
/// plain token-set Jaccard.
pub struct TextComparator {
    pub window: usize,
}

impl Default for TextComparator {
    fn default() -> Self {
        Self { window: 3 }
    }
}

impl SimilarityComparator for TextComparator {
    fn compare(&self, a: &[String], b: &[String]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a.len() < self.window || b.len() < self.window {
            let set_a: HashSet<&String> = a.iter().collect();
            let set_b: HashSet<&String> = b.iter().collect();
            return jaccard(set_a.len(), set_b.len(), set_a.intersection(&set_b).count());
        }

        let grams_a: HashSet<&[String]> = a.windows(self.window).collect();
        let grams_b: HashSet<&[String]> = b.windows(self.window).collect();
        jaccard(
            grams_a.len(),
            grams_b.len(),
            grams_a.intersection(&grams_b).count(),
        )
    }

    fn matches(&self, a: &[String], b: &[String]) -> Vec<ElementMatch> {
        if a.len() < self.window || b.len() < self.window {
            return Vec::new();
        }

        // Positions of each window in b, so runs can be extended greedily.
        let mut positions: HashMap<&[String], Vec<usize>> = HashMap::new();
        for (j, gram) in b.windows(self.window).enumerate() {
            positions.entry(gram).or_default().push(j);
        }

        let mut claimed_b = vec![false; b.len()];
        let mut out = Vec::new();
        let mut i = 0;
        while i + self.window <= a.len() {
            let gram = &a[i..i + self.window];
            let candidate = positions
                .get(gram)
                .and_then(|js| js.iter().find(|&&j| !claimed_b[j]))
                .copied();

            let Some(j) = candidate else {
                i += 1;
                continue;
            };

            let mut length = self.window;
            while i + length < a.len() && j + length < b.len() && a[i + length] == b[j + length] {
                length += 1;
            }

            for offset in 0..length {
                claimed_b[j + offset] = true;
            }
            out.push(ElementMatch {
                start_a: i,
                start_b: j,
                length,
            });
            i += length;
        }
        out
    }
}

/// Comparator for modeling submissions: Dice coefficient over the element
/// multisets. Order does not matter for diagram elements, multiplicity does.
pub struct ModelingComparator;

impl SimilarityComparator for ModelingComparator {
    fn compare(&self, a: &[String], b: &[String]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let mut counts: HashMap<&String, usize> = HashMap::new();
        for element in a {
            *counts.entry(element).or_default() += 1;
        }

        let mut intersection = 0usize;
        for element in b {
            if let Some(count) = counts.get_mut(element) {
                if *count > 0 {
                    *count -= 1;
                    intersection += 1;
                }
            }
        }

        2.0 * intersection as f64 / (a.len() + b.len()) as f64
    }
}

fn jaccard(len_a: usize, len_b: usize, intersection: usize) -> f64 {
    let union = len_a + len_b - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
