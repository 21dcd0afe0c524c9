// Copyright 2021 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

const MAX_ORDER: usize = 4;

/// Smoothing applied to n-gram precisions without any match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingFunction {
    /// Zero precisions are replaced by the smallest positive float, driving the score to 0
    #[default]
    None,
    /// Zero precisions are replaced by `epsilon / denominator`, with `epsilon = 0.1`
    Method1,
}

impl SmoothingFunction {
    const EPSILON: f64 = 0.1;

    fn precision(&self, numerator: usize, denominator: usize) -> f64 {
        match (numerator, self) {
            (0, SmoothingFunction::None) => f64::MIN_POSITIVE,
            (0, SmoothingFunction::Method1) => Self::EPSILON / denominator as f64,
            _ => numerator as f64 / denominator as f64,
        }
    }
}

fn ngram_counts<'a>(words: &'a [&'a str], n: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if words.len() >= n {
        for window in words.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// Clipped n-gram matches and total hypothesis n-grams (at least 1).
fn modified_precision(references: &[&[&str]], hypothesis: &[&str], n: usize) -> (usize, usize) {
    let counts = ngram_counts(hypothesis, n);
    let mut max_reference_counts: HashMap<&[&str], usize> = HashMap::new();
    for reference in references {
        for (ngram, count) in ngram_counts(reference, n) {
            if counts.contains_key(ngram) {
                let max_count = max_reference_counts.entry(ngram).or_insert(0);
                *max_count = (*max_count).max(count);
            }
        }
    }

    let clipped = counts
        .iter()
        .map(|(ngram, count)| {
            (*count).min(max_reference_counts.get(ngram).copied().unwrap_or(0))
        })
        .sum();
    let total = counts.values().sum::<usize>().max(1);
    (clipped, total)
}

/// Length of the reference closest to `hypothesis_len`, the shorter one on ties.
fn closest_reference_length(references: &[&[&str]], hypothesis_len: usize) -> usize {
    references
        .iter()
        .map(|reference| reference.len())
        .min_by_key(|&len| (len.abs_diff(hypothesis_len), len))
        .unwrap_or(0)
}

fn brevity_penalty(closest_reference_len: usize, hypothesis_len: usize) -> f64 {
    if hypothesis_len > closest_reference_len {
        1.0
    } else if hypothesis_len == 0 {
        0.0
    } else {
        (1.0 - closest_reference_len as f64 / hypothesis_len as f64).exp()
    }
}

/// Sentence-level BLEU with uniform weights over 1- to 4-grams.
///
/// # Arguments
///
/// * `references` - tokenized reference texts
/// * `hypothesis` - tokenized hypothesis
/// * `smoothing` - treatment of n-gram orders without any match
///
/// Returns 0 when no hypothesis unigram matches a reference.
///
/// # Example
///
/// ```
/// use t5_pegasus_summarizer::metrics::{sentence_bleu, SmoothingFunction};
/// let reference = ["北", "京", "天", "气", "晴"];
/// let score = sentence_bleu(&[&reference[..]], &reference, SmoothingFunction::Method1);
/// assert!((score - 1.0).abs() < 1e-9);
/// ```
pub fn sentence_bleu(
    references: &[&[&str]],
    hypothesis: &[&str],
    smoothing: SmoothingFunction,
) -> f64 {
    let precisions = (1..=MAX_ORDER)
        .map(|n| modified_precision(references, hypothesis, n))
        .collect::<Vec<(usize, usize)>>();
    if precisions[0].0 == 0 {
        return 0.0;
    }

    let penalty = brevity_penalty(
        closest_reference_length(references, hypothesis.len()),
        hypothesis.len(),
    );
    let weight = 1.0 / MAX_ORDER as f64;
    let log_precision = precisions
        .iter()
        .map(|(numerator, denominator)| {
            weight * smoothing.precision(*numerator, *denominator).ln()
        })
        .sum::<f64>();
    penalty * log_precision.exp()
}

#[cfg(test)]
mod test {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split(' ').collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn partial_match_is_geometric_mean_of_precisions() {
        let reference = words("a b c d f");
        let hypothesis = words("a b c d e");
        let score = sentence_bleu(&[reference.as_slice()], &hypothesis, SmoothingFunction::None);
        assert_close(score, 0.2f64.powf(0.25));
    }

    #[test]
    fn short_hypothesis_with_smoothing() {
        let reference = words("a b c");
        let hypothesis = words("a b");
        let score = sentence_bleu(&[reference.as_slice()], &hypothesis, SmoothingFunction::Method1);
        assert_close(score, (-0.5f64).exp() * 0.01f64.powf(0.25));
    }

    #[test]
    fn missing_orders_without_smoothing_vanish() {
        let reference = words("a b c");
        let hypothesis = words("a b");
        let score = sentence_bleu(&[reference.as_slice()], &hypothesis, SmoothingFunction::None);
        assert!(score < 1e-70);
    }

    #[test]
    fn no_unigram_match_scores_zero() {
        let reference = words("a b c");
        let hypothesis = words("d e f");
        assert_eq!(
            sentence_bleu(&[reference.as_slice()], &hypothesis, SmoothingFunction::Method1),
            0.0
        );
    }

    #[test]
    fn counts_are_clipped_by_reference() {
        let reference = words("the cat");
        let hypothesis = words("the the the the");
        assert_eq!(modified_precision(&[reference.as_slice()], &hypothesis, 1), (1, 4));
        assert_eq!(modified_precision(&[reference.as_slice()], &hypothesis, 3), (0, 2));
        assert_eq!(modified_precision(&[reference.as_slice()], &words("the"), 2), (0, 1));
    }

    #[test]
    fn closest_reference_prefers_shorter_on_ties() {
        let short = words("a b");
        let long = words("a b c d");
        assert_eq!(closest_reference_length(&[long.as_slice(), short.as_slice()], 3), 2);
        assert_eq!(brevity_penalty(2, 3), 1.0);
        assert_close(brevity_penalty(4, 2), (-1.0f64).exp());
        assert_eq!(brevity_penalty(4, 0), 0.0);
    }
}
