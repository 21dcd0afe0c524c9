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
use crate::data::{Batch, DataGenerator};
use crate::t5::T5ForConditionalGeneration;
use crate::training::masked_cross_entropy;
use crate::SummarizerError;
use rand::Rng;
use tch::nn::{self, OptimizerConfig};
use tch::Device;
use tracing::{debug, info};

/// Hook invoked after every training epoch (evaluation, checkpointing...)
pub trait EpochCallback {
    /// # Arguments
    ///
    /// * `epoch` - 0-based index of the epoch that just completed
    /// * `mean_loss` - average training loss over the epoch
    fn on_epoch_end(&mut self, epoch: usize, mean_loss: f64) -> Result<(), SummarizerError>;
}

/// Callback doing nothing, for training runs without evaluation
pub struct NoCallback;

impl EpochCallback for NoCallback {
    fn on_epoch_end(&mut self, _epoch: usize, _mean_loss: f64) -> Result<(), SummarizerError> {
        Ok(())
    }
}

/// # Fine-tuning loop
/// Optimizes the variables of a `VarStore` with Adam on the masked cross-entropy of
/// teacher-forced decoder outputs.
pub struct Trainer {
    optimizer: nn::Optimizer,
    epochs: usize,
    device: Device,
    pad_id: i64,
}

impl Trainer {
    /// Build a new `Trainer`
    ///
    /// # Arguments
    ///
    /// * `vs` - variable store holding the model weights to optimize
    /// * `learning_rate` - Adam learning rate
    /// * `epochs` - number of passes over the training data
    /// * `pad_id` - padding token id, ignored by the loss
    pub fn new(
        vs: &nn::VarStore,
        learning_rate: f64,
        epochs: usize,
        pad_id: i64,
    ) -> Result<Trainer, SummarizerError> {
        let optimizer = nn::Adam::default().build(vs, learning_rate)?;
        Ok(Trainer {
            optimizer,
            epochs,
            device: vs.device(),
            pad_id,
        })
    }

    /// Runs a single optimization step and returns the batch loss.
    pub fn train_step(
        &mut self,
        model: &T5ForConditionalGeneration,
        batch: &Batch,
    ) -> Result<f64, SummarizerError> {
        let content_ids = batch.content_ids.to(self.device);
        let title_ids = batch.title_ids.to(self.device);

        let logits = model.forward_t(&content_ids, &title_ids, true)?;
        let loss = masked_cross_entropy(&logits, &title_ids, self.pad_id)?;
        self.optimizer.backward_step(&loss);

        Ok(loss.double_value(&[]))
    }

    /// Trains for the configured number of epochs, shuffling the batches of every epoch with
    /// `rng`, and calls `callback` at the end of each epoch.
    ///
    /// # Returns
    ///
    /// * the mean training loss of each epoch
    pub fn fit<R: Rng, C: EpochCallback>(
        &mut self,
        model: &T5ForConditionalGeneration,
        generator: &DataGenerator,
        rng: &mut R,
        callback: &mut C,
    ) -> Result<Vec<f64>, SummarizerError> {
        if generator.is_empty() {
            return Err(SummarizerError::DataError(
                "training requires at least one sample".into(),
            ));
        }
        info!(
            epochs = self.epochs,
            samples = generator.num_samples(),
            steps_per_epoch = generator.len(),
            "starting training"
        );

        let mut epoch_losses = Vec::with_capacity(self.epochs);
        for epoch in 0..self.epochs {
            let bar = progress_bar(
                generator.len() as u64,
                format!("epoch {}/{}", epoch + 1, self.epochs),
            );
            let mut total_loss = 0f64;
            let mut steps = 0usize;
            for batch in generator.batches(Some(&mut *rng)) {
                let loss = self.train_step(model, &batch)?;
                total_loss += loss;
                steps += 1;
                debug!(epoch, step = steps, loss, "training step");
                bar.set_message(format!("loss: {loss:.4}"));
                bar.inc(1);
            }
            bar.finish_and_clear();

            let mean_loss = total_loss / steps.max(1) as f64;
            info!(epoch = epoch + 1, loss = mean_loss, "epoch completed");
            epoch_losses.push(mean_loss);
            callback.on_epoch_end(epoch, mean_loss)?;
        }
        Ok(epoch_losses)
    }
}
