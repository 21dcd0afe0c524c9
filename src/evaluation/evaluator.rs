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

use crate::common::progress::progress_bar;
use crate::data::Sample;
use crate::evaluation::results::{ResultRow, ResultsTable};
use crate::generation::TitleGenerator;
use crate::metrics::{sentence_bleu, Rouge, SmoothingFunction};
use crate::training::EpochCallback;
use crate::SummarizerError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tch::nn::VarStore;
use tracing::{debug, info};

/// Mean scores over an evaluation set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub rouge_1: f64,
    pub rouge_2: f64,
    pub rouge_l: f64,
    pub bleu: f64,
}

/// Spaces a title per character and lower-cases it, so that metrics operate on characters.
pub fn space_characters(text: &str) -> String {
    text.chars()
        .map(String::from)
        .collect::<Vec<String>>()
        .join(" ")
        .to_lowercase()
}

/// # Title generation evaluator
///
/// Generates a title for every sample of a dataset and scores it against the reference with
/// ROUGE-1/2/L F-scores and smoothed sentence BLEU. Every generated title is recorded in a
/// `ResultsTable`.
///
/// Used as an `EpochCallback`, the validation set is evaluated after each epoch and the weights
/// are saved whenever the validation BLEU improves.
pub struct Evaluator<'a, G: TitleGenerator> {
    generator: G,
    valid_data: &'a [Sample],
    topk: usize,
    results: ResultsTable,
    checkpoint: Option<(&'a VarStore, PathBuf)>,
    best_bleu: f64,
}

impl<'a, G: TitleGenerator> Evaluator<'a, G> {
    /// Build a new `Evaluator`
    ///
    /// # Arguments
    ///
    /// * `generator` - title generator under evaluation
    /// * `valid_data` - samples evaluated at the end of every epoch
    /// * `topk` - beam size used for generation
    pub fn new(generator: G, valid_data: &'a [Sample], topk: usize) -> Evaluator<'a, G> {
        Evaluator {
            generator,
            valid_data,
            topk,
            results: ResultsTable::new(),
            checkpoint: None,
            best_bleu: 0.0,
        }
    }

    /// Saves the variables of `vs` to `path` whenever a new best validation BLEU is reached.
    pub fn with_checkpoint<P: AsRef<Path>>(mut self, vs: &'a VarStore, path: P) -> Self {
        self.checkpoint = Some((vs, path.as_ref().to_path_buf()));
        self
    }

    pub fn best_bleu(&self) -> f64 {
        self.best_bleu
    }

    pub fn results(&self) -> &ResultsTable {
        &self.results
    }

    pub fn into_results(self) -> ResultsTable {
        self.results
    }

    /// Scores generated titles for `data`.
    ///
    /// Samples with a blank prediction score 0 but still count in the averages. An empty
    /// dataset gives all-zero metrics.
    pub fn evaluate(&mut self, data: &[Sample], topk: usize) -> Result<Metrics, SummarizerError> {
        let mut metrics = Metrics::default();
        if data.is_empty() {
            return Ok(metrics);
        }

        let bar = progress_bar(data.len() as u64, "evaluating");
        for sample in data {
            let title = space_characters(&sample.title);
            let pred_title = space_characters(&self.generator.generate(&sample.content, topk)?);
            debug!(content = %sample.content, %title, %pred_title, "generated title");

            if !pred_title.trim().is_empty() {
                let scores = Rouge::get_scores(&pred_title, &title)?;
                metrics.rouge_1 += scores.rouge_1.f;
                metrics.rouge_2 += scores.rouge_2.f;
                metrics.rouge_l += scores.rouge_l.f;
                let reference = title.split(' ').collect::<Vec<&str>>();
                let hypothesis = pred_title.split(' ').collect::<Vec<&str>>();
                metrics.bleu += sentence_bleu(
                    &[reference.as_slice()],
                    &hypothesis,
                    SmoothingFunction::Method1,
                );
            }
            self.results.push(ResultRow {
                content: sample.content.clone(),
                title,
                pred_title,
            });
            bar.inc(1);
        }
        bar.finish_and_clear();

        let total = data.len() as f64;
        metrics.rouge_1 /= total;
        metrics.rouge_2 /= total;
        metrics.rouge_l /= total;
        metrics.bleu /= total;
        Ok(metrics)
    }

    fn save_checkpoint(&self) -> Result<(), SummarizerError> {
        if let Some((vs, path)) = &self.checkpoint {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            vs.save(path)?;
            info!(path = %path.display(), "saved best model");
        }
        Ok(())
    }
}

impl<G: TitleGenerator> EpochCallback for Evaluator<'_, G> {
    fn on_epoch_end(&mut self, epoch: usize, mean_loss: f64) -> Result<(), SummarizerError> {
        let metrics = self.evaluate(self.valid_data, self.topk)?;
        if metrics.bleu > self.best_bleu {
            self.best_bleu = metrics.bleu;
            self.save_checkpoint()?;
        }
        info!(
            epoch = epoch + 1,
            loss = mean_loss,
            rouge_1 = metrics.rouge_1,
            rouge_2 = metrics.rouge_2,
            rouge_l = metrics.rouge_l,
            bleu = metrics.bleu,
            best_bleu = self.best_bleu,
            "validation metrics"
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;
    use tch::{nn, Device, Kind};

    struct LookupGenerator {
        predictions: HashMap<String, String>,
    }

    impl LookupGenerator {
        fn new(pairs: &[(&str, &str)]) -> LookupGenerator {
            LookupGenerator {
                predictions: pairs
                    .iter()
                    .map(|(content, title)| (content.to_string(), title.to_string()))
                    .collect(),
            }
        }
    }

    impl TitleGenerator for LookupGenerator {
        fn generate(&self, text: &str, _topk: usize) -> Result<String, SummarizerError> {
            Ok(self.predictions.get(text).cloned().unwrap_or_default())
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample::new("北京下雨", "北京今天下雨了"),
            Sample::new("上海晴天", "上海今天是晴天"),
        ]
    }

    #[test]
    fn spaces_and_lower_cases_characters() {
        assert_eq!(space_characters("北京ABC"), "北 京 a b c");
        assert_eq!(space_characters(""), "");
    }

    #[test]
    fn perfect_predictions_score_one() {
        let generator = LookupGenerator::new(&[
            ("北京今天下雨了", "北京下雨"),
            ("上海今天是晴天", "上海晴天"),
        ]);
        let data = samples();
        let mut evaluator = Evaluator::new(generator, &data, 1);
        let metrics = evaluator.evaluate(&data, 1).unwrap();
        assert!((metrics.rouge_1 - 1.0).abs() < 1e-6);
        assert!((metrics.rouge_l - 1.0).abs() < 1e-6);
        assert!((metrics.bleu - 1.0).abs() < 1e-9);
        assert_eq!(evaluator.results().len(), 2);
        assert_eq!(evaluator.results().rows()[0].title, "北 京 下 雨");
    }

    #[test]
    fn blank_predictions_count_as_zero() {
        let generator = LookupGenerator::new(&[("北京今天下雨了", "北京下雨")]);
        let data = samples();
        let mut evaluator = Evaluator::new(generator, &data, 1);
        let metrics = evaluator.evaluate(&data, 1).unwrap();
        assert!((metrics.rouge_1 - 0.5).abs() < 1e-6);
        assert!((metrics.bleu - 0.5).abs() < 1e-9);
        assert_eq!(evaluator.results().rows()[1].pred_title, "");
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logs_each_generated_title() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let generator = LookupGenerator::new(&[("北京今天下雨了", "北京下雨")]);
        let data = samples();
        let mut evaluator = Evaluator::new(generator, &data, 1);
        tracing::subscriber::with_default(subscriber, || evaluator.evaluate(&data, 1)).unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let lines = output
            .lines()
            .filter(|line| line.contains("generated title"))
            .collect::<Vec<&str>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("content=北京今天下雨了"));
        assert!(lines[0].contains("pred_title=北 京 下 雨"));
        assert!(lines[1].contains("content=上海今天是晴天"));
        assert!(lines[1].contains("title=上 海 晴 天"));
    }

    #[test]
    fn empty_data_gives_zero_metrics() {
        let mut evaluator = Evaluator::new(LookupGenerator::new(&[]), &[], 1);
        assert_eq!(evaluator.evaluate(&[], 1).unwrap(), Metrics::default());
        assert!(evaluator.results().is_empty());
    }

    #[test]
    fn saves_weights_on_improvement_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("best").join("best_model.ot");
        let vs = nn::VarStore::new(Device::Cpu);
        let _weight = vs
            .root()
            .var("weight", &[2, 2], nn::Init::Const(1.0));

        let data = samples();
        let generator = LookupGenerator::new(&[("北京今天下雨了", "北京下雨")]);
        let mut evaluator = Evaluator::new(generator, &data, 1).with_checkpoint(&vs, &path);

        evaluator.on_epoch_end(0, 1.0)?;
        assert!(path.exists());
        assert!((evaluator.best_bleu() - 0.5).abs() < 1e-9);

        let mut restored = nn::VarStore::new(Device::Cpu);
        let weight = restored
            .root()
            .var("weight", &[2, 2], nn::Init::Const(0.0));
        restored.load(&path)?;
        assert_eq!(weight.sum(Kind::Float).double_value(&[]), 4.0);

        fs::remove_file(&path)?;
        evaluator.on_epoch_end(1, 0.5)?;
        assert!(!path.exists());
        assert_eq!(evaluator.results().len(), 4);
        Ok(())
    }
}
