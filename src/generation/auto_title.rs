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

use crate::generation::beam_search::{BeamSearchDecoder, NextTokenScorer};
use crate::t5::T5ForConditionalGeneration;
use crate::tokenizer::PegasusTokenizer;
use crate::SummarizerError;
use tch::{no_grad, Device, Kind, Tensor};
use tracing::debug;

impl NextTokenScorer for T5ForConditionalGeneration {
    fn next_token_scores(
        &self,
        encoded: &Tensor,
        output_ids: &Tensor,
    ) -> Result<Tensor, SummarizerError> {
        let logits = self.decode(encoded, None, output_ids, false)?;
        Ok(logits.select(1, -1).log_softmax(-1, Kind::Float))
    }
}

/// Generates a title for a single text.
pub trait TitleGenerator {
    /// # Arguments
    ///
    /// * `text` - source text
    /// * `topk` - beam size, 1 for greedy decoding
    fn generate(&self, text: &str, topk: usize) -> Result<String, SummarizerError>;
}

/// # Title generation with a T5 PEGASUS model
///
/// The text is tokenized and truncated to `max_content_len` tokens, encoded once, and decoded by
/// beam search for at most `max_title_len` tokens. Runs without gradient tracking.
pub struct AutoTitle<'a> {
    model: &'a T5ForConditionalGeneration,
    tokenizer: &'a PegasusTokenizer,
    decoder: BeamSearchDecoder,
    max_content_len: usize,
    device: Device,
}

impl<'a> AutoTitle<'a> {
    /// Create a new `AutoTitle` generator
    ///
    /// # Arguments
    ///
    /// * `model` - model used for generation, its weights are not modified
    /// * `tokenizer` - tokenizer matching the model vocabulary
    /// * `max_content_len` - maximum number of source tokens, markers included
    /// * `max_title_len` - maximum number of generated tokens
    /// * `device` - device hosting the model weights
    pub fn new(
        model: &'a T5ForConditionalGeneration,
        tokenizer: &'a PegasusTokenizer,
        max_content_len: usize,
        max_title_len: usize,
        device: Device,
    ) -> AutoTitle<'a> {
        AutoTitle {
            model,
            tokenizer,
            decoder: BeamSearchDecoder::new(tokenizer.start_id(), tokenizer.end_id(), max_title_len),
            max_content_len,
            device,
        }
    }
}

impl TitleGenerator for AutoTitle<'_> {
    fn generate(&self, text: &str, topk: usize) -> Result<String, SummarizerError> {
        let token_ids = self.tokenizer.encode(text, self.max_content_len);
        let output_ids = no_grad(|| -> Result<Vec<i64>, SummarizerError> {
            let input_ids = Tensor::from_slice(&token_ids)
                .unsqueeze(0)
                .to(self.device);
            let encoded = self.model.encode(&input_ids, false)?;
            self.decoder.beam_search(self.model, &encoded, topk)
        })?;
        debug!(
            source_tokens = token_ids.len(),
            generated_tokens = output_ids.len(),
            "generated title"
        );
        Ok(self.tokenizer.decode(&output_ids))
    }
}
