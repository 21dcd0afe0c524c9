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

use crate::SummarizerError;
use std::collections::HashSet;

/// Precision, recall and F-score of a ROUGE variant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RougeScore {
    pub f: f64,
    pub p: f64,
    pub r: f64,
}

/// ROUGE-1, ROUGE-2 and ROUGE-L scores of a hypothesis against a reference
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RougeScores {
    pub rouge_1: RougeScore,
    pub rouge_2: RougeScore,
    pub rouge_l: RougeScore,
}

/// # ROUGE scorer
///
/// Texts are split into sentences on `.`, and sentences into words on single spaces. N-gram
/// overlaps are computed on sets (repeated n-grams count once) and ROUGE-L is the summary-level
/// variant built on the union of longest common subsequences.
pub struct Rouge;

impl Rouge {
    /// Scores a hypothesis against a reference.
    ///
    /// # Example
    ///
    /// ```
    /// use t5_pegasus_summarizer::metrics::Rouge;
    /// let scores = Rouge::get_scores("北 京 天 气", "北 京 下 雨").unwrap();
    /// assert!((scores.rouge_1.f - 0.5).abs() < 1e-6);
    /// ```
    pub fn get_scores(hypothesis: &str, reference: &str) -> Result<RougeScores, SummarizerError> {
        let hypothesis = split_sentences(hypothesis);
        let reference = split_sentences(reference);
        Ok(RougeScores {
            rouge_1: rouge_n(&hypothesis, &reference, 1)?,
            rouge_2: rouge_n(&hypothesis, &reference, 2)?,
            rouge_l: rouge_l(&hypothesis, &reference)?,
        })
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .filter(|sentence| !sentence.is_empty())
        .map(|sentence| sentence.split_whitespace().collect::<Vec<&str>>().join(" "))
        .collect()
}

fn split_words<S: AsRef<str>>(sentences: &[S]) -> Vec<&str> {
    sentences
        .iter()
        .flat_map(|sentence| sentence.as_ref().split(' '))
        .collect()
}

fn ngrams<'a>(words: &[&'a str], n: usize) -> HashSet<Vec<&'a str>> {
    if n == 0 || words.len() < n {
        return HashSet::new();
    }
    words.windows(n).map(|window| window.to_vec()).collect()
}

fn check_not_empty<S: AsRef<str>>(
    hypothesis: &[S],
    reference: &[S],
) -> Result<(), SummarizerError> {
    if hypothesis.is_empty() {
        return Err(SummarizerError::ValueError("Hypothesis is empty.".into()));
    }
    if reference.is_empty() {
        return Err(SummarizerError::ValueError("Reference is empty.".into()));
    }
    Ok(())
}

/// ROUGE-N over sentence lists.
pub fn rouge_n<S: AsRef<str>>(
    hypothesis: &[S],
    reference: &[S],
    n: usize,
) -> Result<RougeScore, SummarizerError> {
    check_not_empty(hypothesis, reference)?;
    let hypothesis_words = split_words(hypothesis);
    let reference_words = split_words(reference);
    let hypothesis_ngrams = ngrams(&hypothesis_words, n);
    let reference_ngrams = ngrams(&reference_words, n);
    let overlap = hypothesis_ngrams.intersection(&reference_ngrams).count();

    let p = ratio(overlap, hypothesis_ngrams.len());
    let r = ratio(overlap, reference_ngrams.len());
    Ok(RougeScore {
        f: 2.0 * ((p * r) / (p + r + 1e-8)),
        p,
        r,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Words of one longest common subsequence of `x` and `y`.
fn lcs_words<'a>(x: &[&'a str], y: &[&'a str]) -> Vec<&'a str> {
    let mut table = vec![vec![0usize; y.len() + 1]; x.len() + 1];
    for i in 1..=x.len() {
        for j in 1..=y.len() {
            table[i][j] = if x[i - 1] == y[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    let (mut i, mut j) = (x.len(), y.len());
    let mut words = Vec::with_capacity(table[i][j]);
    while i > 0 && j > 0 {
        if x[i - 1] == y[j - 1] {
            words.push(x[i - 1]);
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] > table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    words.reverse();
    words
}

/// Summary-level ROUGE-L over sentence lists.
///
/// For every reference sentence, the words of its LCS with each hypothesis sentence are merged
/// into a running union; the union size is compared with the number of distinct words on
/// each side.
pub fn rouge_l<S: AsRef<str>>(
    hypothesis: &[S],
    reference: &[S],
) -> Result<RougeScore, SummarizerError> {
    check_not_empty(hypothesis, reference)?;
    let reference_size = split_words(reference).into_iter().collect::<HashSet<_>>().len();
    let hypothesis_size = split_words(hypothesis).into_iter().collect::<HashSet<_>>().len();

    let mut union = HashSet::new();
    for reference_sentence in reference {
        let reference_words = reference_sentence.as_ref().split(' ').collect::<Vec<&str>>();
        for hypothesis_sentence in hypothesis {
            let hypothesis_words = hypothesis_sentence.as_ref().split(' ').collect::<Vec<&str>>();
            union.extend(lcs_words(&reference_words, &hypothesis_words));
        }
    }

    let lcs = union.len() as f64;
    let r = lcs / reference_size as f64;
    let p = lcs / hypothesis_size as f64;
    let beta = p / (r + 1e-12);
    let beta_2 = beta * beta;
    let f = ((1.0 + beta_2) * r * p) / (r + beta_2 * p + 1e-12);
    Ok(RougeScore { f, p, r })
}
