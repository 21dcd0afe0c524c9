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

use crate::common::dropout::Dropout;
use crate::t5::layer_norm::T5LayerNorm;
use crate::t5::T5Config;
use std::borrow::Borrow;
use tch::nn::LinearConfig;
use tch::{nn, Device, Kind, Tensor};

/// Maps signed relative positions (`memory - query`) to bucket indices.
///
/// Small distances get one bucket each, larger distances share logarithmically sized buckets up
/// to `max_distance`. For bidirectional attention half of the buckets are reserved for positive
/// offsets; for causal attention only non-positive offsets are distinguished.
pub fn get_relative_position_bucket(
    relative_position: &Tensor,
    bidirectional: bool,
    num_buckets: i64,
    max_distance: i64,
) -> Tensor {
    let mut num_buckets = num_buckets;
    let mut relative_buckets = relative_position.zeros_like();

    let relative_position = if bidirectional {
        num_buckets /= 2;
        relative_buckets += relative_position.gt(0i64).to_kind(Kind::Int64) * num_buckets;
        relative_position.abs()
    } else {
        -relative_position.clamp_max(0i64)
    };

    let max_exact = num_buckets / 2;
    let is_small = relative_position.lt(max_exact);

    let value_if_large: Tensor = ((relative_position.to_kind(Kind::Float) / max_exact as f64)
        .log()
        / (max_distance as f64 / max_exact as f64).ln()
        * (num_buckets - max_exact) as f64)
        .to_kind(Kind::Int64)
        + max_exact;
    let value_if_large = value_if_large.clamp_max(num_buckets - 1);

    relative_buckets + relative_position.where_self(&is_small, &value_if_large)
}

#[derive(Debug)]
pub struct T5Attention {
    is_bidirectional: bool,
    relative_attention_num_buckets: i64,
    relative_attention_max_distance: i64,
    n_heads: i64,
    d_kv: i64,
    inner_dim: i64,
    dropout: Dropout,
    q: nn::Linear,
    k: nn::Linear,
    v: nn::Linear,
    o: nn::Linear,
    relative_attention_bias: Option<nn::Embedding>,
}

impl T5Attention {
    pub fn new<'p, P>(
        p: P,
        config: &T5Config,
        is_decoder: bool,
        has_relative_attention_bias: bool,
    ) -> T5Attention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let linear_config = LinearConfig {
            bias: false,
            ..Default::default()
        };
        let inner_dim = config.num_heads * config.d_kv;
        let k = nn::linear(p / "k", config.d_model, inner_dim, linear_config);
        let v = nn::linear(p / "v", config.d_model, inner_dim, linear_config);
        let q = nn::linear(p / "q", config.d_model, inner_dim, linear_config);
        let o = nn::linear(p / "o", inner_dim, config.d_model, linear_config);

        let dropout = Dropout::new(config.dropout_rate);
        let relative_attention_bias = if has_relative_attention_bias {
            Some(nn::embedding(
                p / "relative_attention_bias",
                config.relative_attention_num_buckets,
                config.num_heads,
                Default::default(),
            ))
        } else {
            None
        };

        T5Attention {
            is_bidirectional: !is_decoder,
            relative_attention_num_buckets: config.relative_attention_num_buckets,
            relative_attention_max_distance: config.relative_attention_max_distance,
            n_heads: config.num_heads,
            d_kv: config.d_kv,
            inner_dim,
            dropout,
            q,
            k,
            v,
            o,
            relative_attention_bias,
        }
    }

    fn unshape(&self, x: Tensor, bs: i64) -> Tensor {
        x.transpose(1, 2).contiguous().view((bs, -1, self.inner_dim))
    }

    fn shape(&self, x: Tensor, bs: i64) -> Tensor {
        x.view((bs, -1, self.n_heads, self.d_kv)).transpose(1, 2)
    }

    /// Attends from `hidden_states` to `kv` (cross-attention) or to itself (self-attention).
    ///
    /// The returned position bias already contains the additive `attention_mask` and can be
    /// handed to the following layers of the same stack.
    pub fn forward_t(
        &self,
        hidden_states: &Tensor,
        kv: Option<&Tensor>,
        position_bias: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
        train: bool,
    ) -> (Tensor, Tensor) {
        let input_size = hidden_states.size();
        let (bs, q_len) = (input_size[0], input_size[1]);
        let source = kv.unwrap_or(hidden_states);
        let k_len = source.size()[1];

        let q = self.shape(hidden_states.apply(&self.q), bs);
        let k = self.shape(source.apply(&self.k), bs);
        let v = self.shape(source.apply(&self.v), bs);

        let scores = q.matmul(&k.transpose(-1, -2));

        let position_bias = match position_bias {
            Some(value) => value.shallow_clone(),
            None => {
                let bias = match &self.relative_attention_bias {
                    Some(embeddings) => {
                        self.compute_bias(embeddings, q_len, k_len, hidden_states.device())
                    }
                    None => Tensor::zeros(
                        [1, self.n_heads, q_len, k_len],
                        (scores.kind(), scores.device()),
                    ),
                };
                match attention_mask {
                    Some(mask) => bias + mask,
                    None => bias,
                }
            }
        };

        let attention_weights = (scores + &position_bias)
            .softmax(-1, Kind::Float)
            .to_kind(q.kind())
            .apply_t(&self.dropout, train);
        let context = self
            .unshape(attention_weights.matmul(&v), bs)
            .apply(&self.o);

        (context, position_bias)
    }

    fn compute_bias(
        &self,
        relative_attention_bias: &nn::Embedding,
        q_len: i64,
        k_len: i64,
        device: Device,
    ) -> Tensor {
        let context_position = Tensor::arange(q_len, (Kind::Int64, device)).unsqueeze(1);
        let memory_position = Tensor::arange(k_len, (Kind::Int64, device)).unsqueeze(0);
        let relative_position = memory_position - context_position;

        let rp_bucket = get_relative_position_bucket(
            &relative_position,
            self.is_bidirectional,
            self.relative_attention_num_buckets,
            self.relative_attention_max_distance,
        );
        rp_bucket
            .apply(relative_attention_bias)
            .permute([2, 0, 1])
            .unsqueeze(0)
    }
}

pub struct T5LayerSelfAttention {
    self_attention: T5Attention,
    layer_norm: T5LayerNorm,
    dropout: Dropout,
}

impl T5LayerSelfAttention {
    pub fn new<'p, P>(
        p: P,
        config: &T5Config,
        has_relative_attention_bias: bool,
        is_decoder: bool,
    ) -> T5LayerSelfAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let self_attention = T5Attention::new(
            p / "SelfAttention",
            config,
            is_decoder,
            has_relative_attention_bias,
        );
        let layer_norm =
            T5LayerNorm::new(p / "layer_norm", config.d_model, config.layer_norm_epsilon);
        let dropout = Dropout::new(config.dropout_rate);

        T5LayerSelfAttention {
            self_attention,
            layer_norm,
            dropout,
        }
    }

    pub fn forward_t(
        &self,
        hidden_states: &Tensor,
        position_bias: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
        train: bool,
    ) -> (Tensor, Tensor) {
        let norm_x = hidden_states.apply(&self.layer_norm);

        let (y, position_bias) =
            self.self_attention
                .forward_t(&norm_x, None, position_bias, attention_mask, train);

        (hidden_states + y.apply_t(&self.dropout, train), position_bias)
    }
}

pub struct T5LayerCrossAttention {
    encoder_decoder_attention: T5Attention,
    layer_norm: T5LayerNorm,
    dropout: Dropout,
}

impl T5LayerCrossAttention {
    pub fn new<'p, P>(p: P, config: &T5Config) -> T5LayerCrossAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let encoder_decoder_attention = T5Attention::new(p / "EncDecAttention", config, true, false);
        let layer_norm =
            T5LayerNorm::new(p / "layer_norm", config.d_model, config.layer_norm_epsilon);
        let dropout = Dropout::new(config.dropout_rate);

        T5LayerCrossAttention {
            encoder_decoder_attention,
            layer_norm,
            dropout,
        }
    }

    pub fn forward_t(
        &self,
        hidden_states: &Tensor,
        kv: &Tensor,
        position_bias: Option<&Tensor>,
        attention_mask: Option<&Tensor>,
        train: bool,
    ) -> (Tensor, Tensor) {
        let norm_x = hidden_states.apply(&self.layer_norm);

        let (y, position_bias) = self.encoder_decoder_attention.forward_t(
            &norm_x,
            Some(kv),
            position_bias,
            attention_mask,
            train,
        );

        (hidden_states + y.apply_t(&self.dropout, train), position_bias)
    }
}
