// Copyright 2018 Mesh TensorFlow authors, T5 Authors and HuggingFace Inc. team.
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

use crate::common::activations::TensorFunction;
use crate::common::dropout::Dropout;
use crate::common::kind::get_min;
use crate::t5::attention::{T5LayerCrossAttention, T5LayerSelfAttention};
use crate::t5::layer_norm::T5LayerNorm;
use crate::t5::{FeedForwardProj, T5Config};
use crate::SummarizerError;
use std::borrow::Borrow;
use tch::nn::LinearConfig;
use tch::{nn, Kind, Tensor};

pub struct T5DenseActDense {
    wi: nn::Linear,
    wo: nn::Linear,
    dropout: Dropout,
}

impl T5DenseActDense {
    pub fn new<'p, P>(p: P, config: &T5Config) -> T5DenseActDense
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let linear_config = LinearConfig {
            bias: false,
            ..Default::default()
        };
        let wi = nn::linear(p / "wi", config.d_model, config.d_ff, linear_config);
        let wo = nn::linear(p / "wo", config.d_ff, config.d_model, linear_config);
        let dropout = Dropout::new(config.dropout_rate);

        T5DenseActDense { wi, wo, dropout }
    }

    pub fn forward_t(&self, hidden_states: &Tensor, train: bool) -> Tensor {
        hidden_states
            .apply(&self.wi)
            .relu()
            .apply_t(&self.dropout, train)
            .apply(&self.wo)
    }
}

/// Gated feed-forward: `wo(act(wi_0 x) * wi_1 x)`
pub struct T5DenseGatedActDense {
    wi_0: nn::Linear,
    wi_1: nn::Linear,
    wo: nn::Linear,
    dropout: Dropout,
    activation: TensorFunction,
}

impl T5DenseGatedActDense {
    pub fn new<'p, P>(p: P, config: &T5Config) -> T5DenseGatedActDense
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let linear_config = LinearConfig {
            bias: false,
            ..Default::default()
        };
        let wi_0 = nn::linear(p / "wi_0", config.d_model, config.d_ff, linear_config);
        let wi_1 = nn::linear(p / "wi_1", config.d_model, config.d_ff, linear_config);
        let wo = nn::linear(p / "wo", config.d_ff, config.d_model, linear_config);
        let dropout = Dropout::new(config.dropout_rate);
        let activation = config.dense_act_fn.get_function();

        T5DenseGatedActDense {
            wi_0,
            wi_1,
            wo,
            dropout,
            activation,
        }
    }

    pub fn forward_t(&self, hidden_states: &Tensor, train: bool) -> Tensor {
        let gate = self.activation.get_fn()(&hidden_states.apply(&self.wi_0));
        (gate * hidden_states.apply(&self.wi_1))
            .apply_t(&self.dropout, train)
            .apply(&self.wo)
    }
}

pub enum T5FeedForwardLayer {
    ActDense(T5DenseActDense),
    GatedActDense(T5DenseGatedActDense),
}

impl T5FeedForwardLayer {
    pub fn forward_t(&self, hidden_states: &Tensor, train: bool) -> Tensor {
        match self {
            T5FeedForwardLayer::ActDense(ref layer) => layer.forward_t(hidden_states, train),
            T5FeedForwardLayer::GatedActDense(ref layer) => layer.forward_t(hidden_states, train),
        }
    }
}

pub struct T5LayerFF {
    feed_forward_layer: T5FeedForwardLayer,
    layer_norm: T5LayerNorm,
    dropout: Dropout,
}

impl T5LayerFF {
    pub fn new<'p, P>(p: P, config: &T5Config) -> T5LayerFF
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let feed_forward_layer = match config.feed_forward_proj {
            FeedForwardProj::Relu => {
                T5FeedForwardLayer::ActDense(T5DenseActDense::new(p / "DenseReluDense", config))
            }
            FeedForwardProj::GatedGelu => T5FeedForwardLayer::GatedActDense(
                T5DenseGatedActDense::new(p / "DenseReluDense", config),
            ),
        };
        let layer_norm =
            T5LayerNorm::new(p / "layer_norm", config.d_model, config.layer_norm_epsilon);
        let dropout = Dropout::new(config.dropout_rate);

        T5LayerFF {
            feed_forward_layer,
            layer_norm,
            dropout,
        }
    }

    pub fn forward_t(&self, hidden_states: &Tensor, train: bool) -> Tensor {
        let y = self
            .feed_forward_layer
            .forward_t(&hidden_states.apply(&self.layer_norm), train);

        hidden_states + y.apply_t(&self.dropout, train)
    }
}

/// Container holding a T5 block output
pub struct T5BlockOutput {
    pub hidden_states: Tensor,
    pub self_attention_position_bias: Tensor,
    pub cross_attention_position_bias: Option<Tensor>,
}

pub struct T5Block {
    self_attention: T5LayerSelfAttention,
    cross_attention: Option<T5LayerCrossAttention>,
    ff_layer: T5LayerFF,
}

impl T5Block {
    pub fn new<'p, P>(
        p: P,
        config: &T5Config,
        has_relative_attention_bias: bool,
        is_decoder: bool,
    ) -> T5Block
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "layer";
        let mut module_index = 0;

        let self_attention = T5LayerSelfAttention::new(
            &p / module_index,
            config,
            has_relative_attention_bias,
            is_decoder,
        );

        let cross_attention = if is_decoder {
            module_index += 1;
            Some(T5LayerCrossAttention::new(&p / module_index, config))
        } else {
            None
        };
        module_index += 1;

        let ff_layer = T5LayerFF::new(&p / module_index, config);

        T5Block {
            self_attention,
            cross_attention,
            ff_layer,
        }
    }

    pub fn forward_t(
        &self,
        hidden_states: &Tensor,
        attention_mask: Option<&Tensor>,
        position_bias: Option<&Tensor>,
        encoder_hidden_states: Option<&Tensor>,
        encoder_attention_mask: Option<&Tensor>,
        encoder_decoder_position_bias: Option<&Tensor>,
        train: bool,
    ) -> T5BlockOutput {
        let (hidden_states, self_attention_position_bias) =
            self.self_attention
                .forward_t(hidden_states, position_bias, attention_mask, train);

        let (hidden_states, cross_attention_position_bias) =
            match (&self.cross_attention, encoder_hidden_states) {
                (Some(cross_attention), Some(encoder_hidden_states)) => {
                    let (hidden_states, position_bias) = cross_attention.forward_t(
                        &hidden_states,
                        encoder_hidden_states,
                        encoder_decoder_position_bias,
                        encoder_attention_mask,
                        train,
                    );
                    (hidden_states, Some(position_bias))
                }
                _ => (hidden_states, None),
            };

        let hidden_states = self.ff_layer.forward_t(&hidden_states, train);

        T5BlockOutput {
            hidden_states,
            self_attention_position_bias,
            cross_attention_position_bias,
        }
    }
}

/// Converts a `(batch, length)` mask of 1 (keep) / 0 (ignore) into an additive mask
/// broadcastable over heads and query positions.
fn additive_mask(mask: &Tensor, kind: Kind) -> Result<Tensor, SummarizerError> {
    let mask = mask.to_kind(kind);
    Ok((mask.ones_like() - mask) * get_min(kind)?)
}

pub struct T5Stack {
    blocks: Vec<T5Block>,
    final_layer_norm: T5LayerNorm,
    dropout: Dropout,
    is_decoder: bool,
}

impl T5Stack {
    pub fn new<'p, P>(p: P, config: &T5Config, is_decoder: bool) -> T5Stack
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let dropout = Dropout::new(config.dropout_rate);

        let num_layers = if is_decoder {
            config.num_decoder_layers.unwrap_or(config.num_layers)
        } else {
            config.num_layers
        };

        let p_layers = p / "block";
        let blocks = (0..num_layers)
            .map(|layer_index| T5Block::new(&p_layers / layer_index, config, layer_index == 0, is_decoder))
            .collect::<Vec<T5Block>>();

        let final_layer_norm = T5LayerNorm::new(
            p / "final_layer_norm",
            config.d_model,
            config.layer_norm_epsilon,
        );

        T5Stack {
            blocks,
            final_layer_norm,
            dropout,
            is_decoder,
        }
    }

    /// # Arguments
    ///
    /// * `input_ids` - tensor of shape (*batch size*, *sequence_length*)
    /// * `attention_mask` - tensor of shape (*batch size*, *sequence_length*), 1 for positions to attend to
    /// * `encoder_hidden_states` - for the decoder, encoder output of shape (*batch size*, *source_sequence_length*, *hidden_size*)
    /// * `encoder_attention_mask` - for the decoder, tensor of shape (*batch size*, *source_sequence_length*)
    /// * `embeddings` - token embeddings shared between encoder and decoder
    /// * `train` - enables dropout
    pub fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        encoder_hidden_states: Option<&Tensor>,
        encoder_attention_mask: Option<&Tensor>,
        embeddings: &nn::Embedding,
        train: bool,
    ) -> Result<Tensor, SummarizerError> {
        let input_embeddings = input_ids.apply(embeddings);
        let (kind, device) = (input_embeddings.kind(), input_embeddings.device());
        let sequence_length = input_ids.size()[1];

        let extended_attention_mask = if self.is_decoder {
            let seq_ids = Tensor::arange(sequence_length, (Kind::Int64, device));
            let causal_mask = seq_ids
                .unsqueeze(0)
                .le_tensor(&seq_ids.unsqueeze(-1))
                .to_kind(kind)
                .unsqueeze(0)
                .unsqueeze(0);
            let padding_mask = attention_mask.to_kind(kind).unsqueeze(1).unsqueeze(1);
            additive_mask(&(causal_mask * padding_mask), kind)?
        } else {
            additive_mask(&attention_mask.unsqueeze(1).unsqueeze(1), kind)?
        };

        let encoder_extended_attention_mask = match encoder_attention_mask {
            Some(mask) if encoder_hidden_states.is_some() => {
                Some(additive_mask(&mask.unsqueeze(1).unsqueeze(1), kind)?)
            }
            _ => None,
        };

        let mut position_bias: Option<Tensor> = None;
        let mut encoder_decoder_position_bias: Option<Tensor> = None;
        let mut hidden_state = input_embeddings.apply_t(&self.dropout, train);

        for (layer_idx, layer) in self.blocks.iter().enumerate() {
            let block_output = layer.forward_t(
                &hidden_state,
                Some(&extended_attention_mask),
                position_bias.as_ref(),
                encoder_hidden_states,
                encoder_extended_attention_mask.as_ref(),
                encoder_decoder_position_bias.as_ref(),
                train,
            );
            if layer_idx == 0 {
                position_bias = Some(block_output.self_attention_position_bias);
                encoder_decoder_position_bias = block_output.cross_attention_position_bias;
            }
            hidden_state = block_output.hidden_states;
        }

        Ok(hidden_state
            .apply(&self.final_layer_norm)
            .apply_t(&self.dropout, train))
    }
}
