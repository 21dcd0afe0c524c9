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

use crate::data::Sample;
use crate::tokenizer::PegasusTokenizer;
use rand::seq::SliceRandom;
use rand::Rng;
use tch::Tensor;

/// Pads variable-length token id sequences with `pad_id` to the longest sequence of the batch
/// and stacks them into a tensor of shape (*batch size*, *max length*).
pub fn sequence_padding(sequences: &[Vec<i64>], pad_id: i64) -> Tensor {
    let max_len = sequences.iter().map(Vec::len).max().unwrap_or(0);
    let mut padded = Vec::with_capacity(sequences.len() * max_len);
    for sequence in sequences {
        padded.extend_from_slice(sequence);
        padded.extend(std::iter::repeat(pad_id).take(max_len - sequence.len()));
    }
    Tensor::from_slice(&padded).view([sequences.len() as i64, max_len as i64])
}

/// Padded content and title token ids for one optimization step
#[derive(Debug)]
pub struct Batch {
    /// Source document ids, shape (*batch size*, *content length*)
    pub content_ids: Tensor,
    /// Target title ids starting with the start token, shape (*batch size*, *title length*)
    pub title_ids: Tensor,
}

/// Turns samples into batches of padded token ids.
pub struct DataGenerator<'a> {
    data: &'a [Sample],
    tokenizer: &'a PegasusTokenizer,
    batch_size: usize,
    max_content_len: usize,
    max_title_len: usize,
}

impl<'a> DataGenerator<'a> {
    pub fn new(
        data: &'a [Sample],
        tokenizer: &'a PegasusTokenizer,
        batch_size: usize,
        max_content_len: usize,
        max_title_len: usize,
    ) -> DataGenerator<'a> {
        DataGenerator {
            data,
            tokenizer,
            batch_size: batch_size.max(1),
            max_content_len,
            max_title_len,
        }
    }

    /// Number of batches per epoch, the last one possibly being smaller
    pub fn len(&self) -> usize {
        (self.data.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.data.len()
    }

    /// Iterates once over the data. Samples are visited in a random order when `rng` is given.
    pub fn batches<R: Rng>(&self, rng: Option<&mut R>) -> Batches<'_, 'a> {
        let mut order = (0..self.data.len()).collect::<Vec<usize>>();
        if let Some(rng) = rng {
            order.shuffle(rng);
        }
        Batches {
            generator: self,
            order,
            position: 0,
        }
    }

    fn make_batch(&self, indices: &[usize]) -> Batch {
        let (content_ids, title_ids): (Vec<Vec<i64>>, Vec<Vec<i64>>) = indices
            .iter()
            .map(|index| {
                let sample = &self.data[*index];
                (
                    self.tokenizer.encode(&sample.content, self.max_content_len),
                    self.tokenizer.encode(&sample.title, self.max_title_len),
                )
            })
            .unzip();
        let pad_id = self.tokenizer.pad_id();
        Batch {
            content_ids: sequence_padding(&content_ids, pad_id),
            title_ids: sequence_padding(&title_ids, pad_id),
        }
    }
}

pub struct Batches<'g, 'a> {
    generator: &'g DataGenerator<'a>,
    order: Vec<usize>,
    position: usize,
}

impl Iterator for Batches<'_, '_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.generator.batch_size).min(self.order.len());
        let batch = self.generator.make_batch(&self.order[self.position..end]);
        self.position = end;
        Some(batch)
    }
}
