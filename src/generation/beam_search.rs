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
use tch::{Kind, Tensor};

/// Scores candidate next tokens for a batch of partial outputs.
pub trait NextTokenScorer {
    /// # Arguments
    ///
    /// * `encoded` - encoder states of shape (*num beams*, ...), one row per partial output
    /// * `output_ids` - partial outputs of shape (*num beams*, *current length*)
    ///
    /// # Returns
    ///
    /// * log-probabilities of the next token, shape (*num beams*, *vocab_size*)
    fn next_token_scores(
        &self,
        encoded: &Tensor,
        output_ids: &Tensor,
    ) -> Result<Tensor, SummarizerError>;
}

/// # Beam search decoder
///
/// At every step the log-probabilities of the next token are added to the score of each beam
/// and the `topk` best (beam, token) pairs over all beams are kept. Decoding stops as soon as the
/// best beam ends with the end token; beams that end without being the best are dropped and the
/// beam count shrinks accordingly. After `max_len` steps the best beam is returned as is.
#[derive(Debug, Clone, Copy)]
pub struct BeamSearchDecoder {
    pub start_id: i64,
    pub end_id: i64,
    /// Maximum number of generated tokens (start token excluded)
    pub max_len: usize,
    /// Minimum output length (start token included) before a beam may be returned
    pub min_len: usize,
    /// Number of end tokens a beam needs to be considered finished
    pub min_ends: i64,
}

impl BeamSearchDecoder {
    pub fn new(start_id: i64, end_id: i64, max_len: usize) -> BeamSearchDecoder {
        BeamSearchDecoder {
            start_id,
            end_id,
            max_len,
            min_len: 1,
            min_ends: 1,
        }
    }

    /// Decodes a single input.
    ///
    /// # Arguments
    ///
    /// * `scorer` - next token scorer
    /// * `encoded` - encoder states for the input, with a leading batch dimension of 1
    /// * `topk` - beam size
    ///
    /// # Returns
    ///
    /// * token ids of the best beam, starting with the start token
    pub fn beam_search<S: NextTokenScorer + ?Sized>(
        &self,
        scorer: &S,
        encoded: &Tensor,
        topk: usize,
    ) -> Result<Vec<i64>, SummarizerError> {
        let device = encoded.device();
        let mut topk = topk.max(1) as i64;
        let mut encoded = encoded.shallow_clone();
        let mut output_ids = Tensor::from_slice(&[self.start_id])
            .view([1, 1])
            .to(device);
        let mut output_scores = Tensor::zeros([1], (Kind::Float, device));

        for step in 0..self.max_len {
            let scores = scorer.next_token_scores(&encoded, &output_ids)?;
            if step == 0 {
                let mut repeats = vec![1i64; encoded.dim()];
                repeats[0] = topk;
                encoded = encoded.repeat(repeats.as_slice());
            }
            let scores = output_scores.unsqueeze(1) + scores.to_kind(Kind::Float);
            let vocab_size = scores.size()[1];
            let k = topk.min(scores.numel() as i64);
            let (top_scores, indices) = scores.view(-1).topk(k, -1, true, true);
            let beam_indices = indices.floor_divide_scalar(vocab_size);
            let token_indices = indices.remainder(vocab_size).unsqueeze(1);

            output_ids = Tensor::cat(&[output_ids.index_select(0, &beam_indices), token_indices], 1);
            output_scores = top_scores;
            if encoded.size()[0] != k {
                encoded = encoded.narrow(0, 0, k);
            }

            if output_ids.size()[1] as usize >= self.min_len {
                let is_end = output_ids.select(1, -1).eq(self.end_id);
                let end_counts =
                    output_ids
                        .eq(self.end_id)
                        .sum_dim_intlist([1].as_slice(), false, Kind::Int64);
                let best = output_scores.argmax(0, false).int64_value(&[]);
                if is_end.to_kind(Kind::Int64).int64_value(&[best]) == 1
                    && end_counts.int64_value(&[best]) >= self.min_ends
                {
                    return Ok(Vec::<i64>::try_from(&output_ids.get(best))?);
                }
                let unfinished = is_end.logical_not().logical_or(&end_counts.lt(self.min_ends));
                let keep = unfinished.nonzero().squeeze_dim(1);
                let kept = keep.size()[0];
                if kept < output_ids.size()[0] {
                    encoded = encoded.index_select(0, &keep);
                    output_ids = output_ids.index_select(0, &keep);
                    output_scores = output_scores.index_select(0, &keep);
                    topk = kept;
                }
            }
        }

        let best = output_scores.argmax(0, false).int64_value(&[]);
        Ok(Vec::<i64>::try_from(&output_ids.get(best))?)
    }
}
