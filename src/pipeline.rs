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

//! # Fine-tuning and evaluation runs
//!
//! End-to-end flows driven by a `FinetuneConfig`: `train` fine-tunes the pretrained checkpoint
//! while keeping the weights with the best validation BLEU, `evaluate` scores saved weights on
//! the test split. Both append the generated titles to the results table.

use crate::data::{DataGenerator, Split};
use crate::evaluation::{Evaluator, Metrics};
use crate::generation::AutoTitle;
use crate::t5::{T5Config, T5ForConditionalGeneration};
use crate::tokenizer::PegasusTokenizer;
use crate::training::{FinetuneConfig, Trainer};
use crate::{Config, SummarizerError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tch::nn::VarStore;
use tracing::{info, warn};

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Mean training loss of each epoch
    pub epoch_losses: Vec<f64>,
    /// Best validation BLEU, reached by the weights saved to `best_model_path`
    pub best_bleu: f64,
}

/// Loads the tokenizer from `vocab_path`.
pub fn load_tokenizer(config: &FinetuneConfig) -> Result<PegasusTokenizer, SummarizerError> {
    let tokenizer = PegasusTokenizer::from_file(&config.vocab_path, config.lower_case)?;
    info!(
        vocab_size = tokenizer.vocab_size(),
        path = %config.vocab_path.display(),
        "loaded vocabulary"
    );
    Ok(tokenizer)
}

/// Variables a pretrained checkpoint may lack, left at their initialization.
const OPTIONAL_VARIABLES: [&str; 1] = ["lm_head.weight"];

fn build_model(
    config: &FinetuneConfig,
    tokenizer: &PegasusTokenizer,
) -> Result<(VarStore, T5ForConditionalGeneration), SummarizerError> {
    let model_config = T5Config::try_from_file(&config.config_path)?;
    if model_config.vocab_size as usize != tokenizer.vocab_size() {
        warn!(
            model = model_config.vocab_size,
            tokenizer = tokenizer.vocab_size(),
            "model and tokenizer vocabulary sizes differ"
        );
    }
    let vs = VarStore::new(config.device());
    let model = T5ForConditionalGeneration::new(vs.root(), &model_config);
    Ok((vs, model))
}

fn log_loaded(vs: &VarStore, weights: &Path) {
    let num_parameters = vs
        .trainable_variables()
        .iter()
        .map(|tensor| tensor.numel())
        .sum::<usize>();
    info!(
        num_parameters,
        device = ?vs.device(),
        path = %weights.display(),
        "loaded model"
    );
}

/// Builds the model described by `config_path` and loads `weights`.
///
/// Every variable of the model must be present in the weight file.
pub fn load_model<P: AsRef<Path>>(
    config: &FinetuneConfig,
    tokenizer: &PegasusTokenizer,
    weights: P,
) -> Result<(VarStore, T5ForConditionalGeneration), SummarizerError> {
    let (mut vs, model) = build_model(config, tokenizer)?;
    vs.load(weights.as_ref())?;
    log_loaded(&vs, weights.as_ref());
    Ok((vs, model))
}

/// Builds the model described by `config_path` and loads a pretrained checkpoint.
///
/// Only the variables listed in `OPTIONAL_VARIABLES` may be missing from the checkpoint; they
/// keep their initialization and are reported. Any other missing variable is an
/// `InvalidConfigurationError`.
pub fn load_pretrained_model<P: AsRef<Path>>(
    config: &FinetuneConfig,
    tokenizer: &PegasusTokenizer,
    weights: P,
) -> Result<(VarStore, T5ForConditionalGeneration), SummarizerError> {
    let (mut vs, model) = build_model(config, tokenizer)?;
    let missing = vs.load_partial(weights.as_ref())?;
    if !missing.is_empty() && missing.len() == vs.variables().len() {
        return Err(SummarizerError::InvalidConfigurationError(format!(
            "no model variable found in {}",
            weights.as_ref().display()
        )));
    }
    let required: Vec<&String> = missing
        .iter()
        .filter(|name| !OPTIONAL_VARIABLES.contains(&name.as_str()))
        .collect();
    if !required.is_empty() {
        return Err(SummarizerError::InvalidConfigurationError(format!(
            "variables {:?} not found in {}",
            required,
            weights.as_ref().display()
        )));
    }
    if !missing.is_empty() {
        warn!(?missing, "variables not found in the weight file");
    }
    log_loaded(&vs, weights.as_ref());
    Ok((vs, model))
}

/// Fine-tunes the pretrained checkpoint on the training split.
///
/// After every epoch the validation split is evaluated and the weights are saved to
/// `best_model_path` when the validation BLEU improves. The generated validation titles of all
/// epochs are appended to `results_path` at the end.
pub fn train(config: &FinetuneConfig) -> Result<TrainingReport, SummarizerError> {
    config.validate()?;
    tch::manual_seed(config.seed as i64);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let train_data = config.load_split(Split::Train)?;
    let valid_data = config.load_split(Split::Valid)?;
    let tokenizer = load_tokenizer(config)?;
    let (vs, model) = load_pretrained_model(config, &tokenizer, &config.checkpoint_path)?;

    let generator = DataGenerator::new(
        &train_data,
        &tokenizer,
        config.batch_size,
        config.max_content_len,
        config.max_title_len,
    );
    let title_generator = AutoTitle::new(
        &model,
        &tokenizer,
        config.max_content_len,
        config.max_title_len,
        vs.device(),
    );
    let mut evaluator = Evaluator::new(title_generator, &valid_data, config.beam_size)
        .with_checkpoint(&vs, &config.best_model_path);

    let mut trainer = Trainer::new(&vs, config.learning_rate, config.epochs, tokenizer.pad_id())?;
    let epoch_losses = trainer.fit(&model, &generator, &mut rng, &mut evaluator)?;

    let best_bleu = evaluator.best_bleu();
    info!(best_bleu, "training completed");
    evaluator.into_results().write(&config.results_path)?;
    Ok(TrainingReport {
        epoch_losses,
        best_bleu,
    })
}

/// Scores saved weights on the test split and appends the generated titles to `results_path`.
///
/// # Arguments
///
/// * `config` - run configuration
/// * `weights` - weight file to evaluate, `best_model_path` if `None`
pub fn evaluate(
    config: &FinetuneConfig,
    weights: Option<&Path>,
) -> Result<Metrics, SummarizerError> {
    config.validate()?;
    let test_data = config.load_split(Split::Test)?;
    let tokenizer = load_tokenizer(config)?;
    let weights = weights.unwrap_or(config.best_model_path.as_path());
    let (vs, model) = load_model(config, &tokenizer, weights)?;

    let title_generator = AutoTitle::new(
        &model,
        &tokenizer,
        config.max_content_len,
        config.max_title_len,
        vs.device(),
    );
    let mut evaluator = Evaluator::new(title_generator, &[], config.beam_size);
    let metrics = evaluator.evaluate(&test_data, config.beam_size)?;
    info!(
        samples = test_data.len(),
        rouge_1 = metrics.rouge_1,
        rouge_2 = metrics.rouge_2,
        rouge_l = metrics.rouge_l,
        bleu = metrics.bleu,
        "test metrics"
    );
    evaluator.into_results().write(&config.results_path)?;
    Ok(metrics)
}
