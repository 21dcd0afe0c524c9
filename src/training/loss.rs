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

/// Cross-entropy of teacher-forced decoder outputs, averaged over non-padding target positions.
///
/// The logits at position `t` are scored against the target token at position `t + 1`: the first
/// target token (start marker) is never predicted and the last logits position is discarded.
///
/// # Arguments
///
/// * `logits` - decoder outputs of shape (*batch size*, *target_sequence_length*, *vocab_size*)
/// * `targets` - target token ids of shape (*batch size*, *target_sequence_length*), the decoder inputs
/// * `pad_id` - padding token id, excluded from the loss
///
/// # Returns
///
/// * scalar `Tensor` holding the mean loss over unmasked positions
pub fn masked_cross_entropy(
    logits: &Tensor,
    targets: &Tensor,
    pad_id: i64,
) -> Result<Tensor, SummarizerError> {
    let target_size = targets.size();
    let logits_size = logits.size();
    if target_size.len() != 2 || logits_size.len() != 3 || logits_size[..2] != target_size[..] {
        return Err(SummarizerError::ValueError(format!(
            "incompatible logits {logits_size:?} and targets {target_size:?} shapes"
        )));
    }
    let sequence_length = target_size[1];
    if sequence_length < 2 {
        return Err(SummarizerError::ValueError(
            "targets must hold at least a start token and one token to predict".into(),
        ));
    }

    let y_true = targets.narrow(1, 1, sequence_length - 1);
    let y_pred = logits.narrow(1, 0, sequence_length - 1);
    let y_mask = y_true.ne(pad_id).to_kind(Kind::Float);

    let loss = -y_pred
        .log_softmax(-1, Kind::Float)
        .gather(-1, &y_true.unsqueeze(-1), false)
        .squeeze_dim(-1);

    Ok((loss * &y_mask).sum(Kind::Float) / y_mask.sum(Kind::Float))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uniform_logits_give_log_vocab_size() {
        let logits = Tensor::zeros([2, 4, 8], (Kind::Float, tch::Device::Cpu));
        let targets = Tensor::from_slice(&[2i64, 5, 3, 0, 2, 6, 7, 3]).view([2, 4]);

        let loss = masked_cross_entropy(&logits, &targets, 0).unwrap();

        assert!((loss.double_value(&[]) - 8f64.ln()).abs() < 1e-6);
    }

    #[test]
    fn padding_positions_are_ignored() {
        // Logits predicting token 1 with high confidence everywhere
        let mut logits_values = vec![0f32; 2 * 3 * 4];
        for position in 0..6 {
            logits_values[position * 4 + 1] = 20.0;
        }
        let logits = Tensor::from_slice(&logits_values).view([2, 3, 4]);
        // Second sequence only has padding after its first target token
        let targets = Tensor::from_slice(&[2i64, 1, 1, 2, 1, 0]).view([2, 3]);

        let loss = masked_cross_entropy(&logits, &targets, 0).unwrap();

        assert!(loss.double_value(&[]) < 1e-6);
    }

    #[test]
    fn predictions_are_shifted_by_one() {
        // Position 0 predicts token 3, position 1 predicts token 2: matches targets[1..] exactly
        let mut logits_values = vec![0f32; 3 * 4];
        logits_values[3] = 30.0;
        logits_values[4 + 2] = 30.0;
        let logits = Tensor::from_slice(&logits_values).view([1, 3, 4]);
        let targets = Tensor::from_slice(&[1i64, 3, 2]).view([1, 3]);
        let loss = masked_cross_entropy(&logits, &targets, 0).unwrap();
        assert!(loss.double_value(&[]) < 1e-6);

        let unshifted_targets = Tensor::from_slice(&[3i64, 2, 1]).view([1, 3]);
        let loss = masked_cross_entropy(&logits, &unshifted_targets, 0).unwrap();
        assert!(loss.double_value(&[]) > 1.0);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let logits = Tensor::zeros([1, 3, 4], (Kind::Float, tch::Device::Cpu));
        let targets = Tensor::from_slice(&[1i64, 2]).view([1, 2]);
        assert!(masked_cross_entropy(&logits, &targets, 0).is_err());

        let targets = Tensor::from_slice(&[1i64]).view([1, 1]);
        let logits = Tensor::zeros([1, 1, 4], (Kind::Float, tch::Device::Cpu));
        assert!(masked_cross_entropy(&logits, &targets, 0).is_err());
    }
}
