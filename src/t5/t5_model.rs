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

use crate::common::activations::Activation;
use crate::t5::encoder::T5Stack;
use crate::{Config, SummarizerError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::nn::{embedding, LinearConfig};
use tch::{nn, Tensor};

#[derive(Clone, Debug, Serialize, Deserialize, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
/// # Options for T5 Feed-forward projection layer
pub enum FeedForwardProj {
    /// ReLU
    Relu,
    /// Gated geLU
    GatedGelu,
}

fn default_max_distance() -> i64 {
    128
}

fn default_layer_norm_epsilon() -> f64 {
    1e-6
}

fn default_dropout_rate() -> f64 {
    0.1
}

fn default_feed_forward_proj() -> FeedForwardProj {
    FeedForwardProj::GatedGelu
}

fn default_dense_act_fn() -> Activation {
    Activation::gelu
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// # T5 model configuration
/// Defines the T5 model architecture (e.g. number of layers, hidden layer size, vocabulary size...).
/// Field names follow the Transformers library; the bert4keras names used by the T5 PEGASUS
/// checkpoints are accepted as aliases.
pub struct T5Config {
    #[serde(alias = "hidden_dropout_prob", default = "default_dropout_rate")]
    pub dropout_rate: f64,
    #[serde(alias = "hidden_size")]
    pub d_model: i64,
    #[serde(alias = "intermediate_size")]
    pub d_ff: i64,
    #[serde(alias = "attention_head_size")]
    pub d_kv: i64,
    #[serde(alias = "num_attention_heads")]
    pub num_heads: i64,
    #[serde(alias = "num_hidden_layers")]
    pub num_layers: i64,
    pub num_decoder_layers: Option<i64>,
    pub vocab_size: i64,
    pub relative_attention_num_buckets: i64,
    #[serde(default = "default_max_distance")]
    pub relative_attention_max_distance: i64,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_feed_forward_proj")]
    pub feed_forward_proj: FeedForwardProj,
    #[serde(default = "default_dense_act_fn")]
    pub dense_act_fn: Activation,
    #[serde(default)]
    pub tie_word_embeddings: bool,
    /// Scale the decoder output by `d_model^-0.5` before the language model head
    #[serde(default = "default_true")]
    pub scale_decoder_outputs: bool,
    pub pad_token_id: Option<i64>,
}

impl Config for T5Config {}

impl Default for T5Config {
    /// Architecture of `chinese_t5_pegasus_small`
    fn default() -> Self {
        T5Config {
            dropout_rate: 0.1,
            d_model: 512,
            d_ff: 1024,
            d_kv: 64,
            num_heads: 6,
            num_layers: 8,
            num_decoder_layers: None,
            vocab_size: 50000,
            relative_attention_num_buckets: 32,
            relative_attention_max_distance: 128,
            layer_norm_epsilon: 1e-6,
            feed_forward_proj: FeedForwardProj::GatedGelu,
            dense_act_fn: Activation::gelu,
            tie_word_embeddings: false,
            scale_decoder_outputs: true,
            pad_token_id: Some(0),
        }
    }
}

/// # T5 Model for conditional generation
/// T5 encoder-decoder with a language modeling head, used for title generation.
/// It is made of the following blocks:
/// - `embeddings`: `nn::Embedding` shared between the encoder and decoder
/// - `encoder`: `T5Stack` (transformer) made of a vector of encoding layers
/// - `decoder`: `T5Stack` (transformer) made of a vector of decoding layers with self attention and encoder cross-attention
/// - `lm_head`: projection to the vocabulary, absent when the embeddings are tied
pub struct T5ForConditionalGeneration {
    embeddings: nn::Embedding,
    encoder: T5Stack,
    decoder: T5Stack,
    lm_head: Option<nn::Linear>,
    output_scale: Option<f64>,
    pad_token_id: i64,
}

impl T5ForConditionalGeneration {
    /// Build a new `T5ForConditionalGeneration`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the T5 model
    /// * `config` - `T5Config` object defining the model architecture
    ///
    /// # Example
    ///
    /// ```no_run
    /// use t5_pegasus_summarizer::t5::{T5Config, T5ForConditionalGeneration};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let config = T5Config::default();
    /// let t5 = T5ForConditionalGeneration::new(vs.root(), &config);
    /// ```
    pub fn new<'p, P>(p: P, config: &T5Config) -> T5ForConditionalGeneration
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let embeddings: nn::Embedding = embedding(
            p / "shared",
            config.vocab_size,
            config.d_model,
            Default::default(),
        );
        let encoder = T5Stack::new(p / "encoder", config, false);
        let decoder = T5Stack::new(p / "decoder", config, true);

        let lm_head = if !config.tie_word_embeddings {
            Some(nn::linear(
                p / "lm_head",
                config.d_model,
                config.vocab_size,
                LinearConfig {
                    bias: false,
                    ..Default::default()
                },
            ))
        } else {
            None
        };
        let output_scale = if config.tie_word_embeddings || config.scale_decoder_outputs {
            Some((config.d_model as f64).powf(-0.5))
        } else {
            None
        };

        T5ForConditionalGeneration {
            embeddings,
            encoder,
            decoder,
            lm_head,
            output_scale,
            pad_token_id: config.pad_token_id.unwrap_or(0),
        }
    }

    fn padding_mask(&self, input_ids: &Tensor) -> Tensor {
        input_ids.ne(self.pad_token_id)
    }

    /// Encodes a batch of padded token ids into hidden states of shape
    /// (*batch size*, *source_sequence_length*, *hidden_size*).
    pub fn encode(&self, input_ids: &Tensor, train: bool) -> Result<Tensor, SummarizerError> {
        self.encoder.forward_t(
            input_ids,
            &self.padding_mask(input_ids),
            None,
            None,
            &self.embeddings,
            train,
        )
    }

    /// Runs the decoder over `decoder_input_ids` attending to `encoder_hidden_states` and returns
    /// the logits of shape (*batch size*, *target_sequence_length*, *vocab_size*).
    ///
    /// # Arguments
    ///
    /// * `encoder_hidden_states` - output of `encode`
    /// * `encoder_attention_mask` - optional mask of shape (*batch size*, *source_sequence_length*), all positions are attended to if `None`
    /// * `decoder_input_ids` - tensor of shape (*batch size*, *target_sequence_length*), starting with the start token
    /// * `train` - enables dropout
    pub fn decode(
        &self,
        encoder_hidden_states: &Tensor,
        encoder_attention_mask: Option<&Tensor>,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Result<Tensor, SummarizerError> {
        let decoder_output = self.decoder.forward_t(
            decoder_input_ids,
            &self.padding_mask(decoder_input_ids),
            Some(encoder_hidden_states),
            encoder_attention_mask,
            &self.embeddings,
            train,
        )?;

        let decoder_output = match self.output_scale {
            Some(scale) => decoder_output * scale,
            None => decoder_output,
        };

        Ok(match &self.lm_head {
            Some(lm_head) => decoder_output.apply(lm_head),
            None => decoder_output.linear::<Tensor>(&self.embeddings.ws, None),
        })
    }

    /// Teacher-forced forward pass through the encoder and decoder.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - source token ids of shape (*batch size*, *source_sequence_length*), padded with the pad token
    /// * `decoder_input_ids` - target token ids of shape (*batch size*, *target_sequence_length*), padded with the pad token
    /// * `train` - enables dropout
    ///
    /// # Returns
    ///
    /// * logits of shape (*batch size*, *target_sequence_length*, *vocab_size*); position `t` predicts token `t + 1`
    pub fn forward_t(
        &self,
        input_ids: &Tensor,
        decoder_input_ids: &Tensor,
        train: bool,
    ) -> Result<Tensor, SummarizerError> {
        let encoder_hidden_states = self.encode(input_ids, train)?;
        let encoder_attention_mask = self.padding_mask(input_ids);
        self.decode(
            &encoder_hidden_states,
            Some(&encoder_attention_mask),
            decoder_input_ids,
            train,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tch::{Device, Kind};

    fn tiny_config() -> T5Config {
        T5Config {
            d_model: 16,
            d_ff: 32,
            d_kv: 4,
            num_heads: 4,
            num_layers: 2,
            num_decoder_layers: Some(1),
            vocab_size: 30,
            relative_attention_num_buckets: 8,
            ..Default::default()
        }
    }

    #[test]
    fn parses_bert4keras_config() {
        let config: T5Config = serde_json::from_str(
            r#"{
                "hidden_act": ["gelu", "linear"],
                "hidden_dropout_prob": 0.1,
                "hidden_size": 512,
                "initializer_range": 0.02,
                "intermediate_size": 1024,
                "num_attention_heads": 6,
                "attention_head_size": 64,
                "num_hidden_layers": 8,
                "vocab_size": 50000,
                "relative_attention_num_buckets": 32,
                "attention_scale": false,
                "is_dropout": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.d_model, 512);
        assert_eq!(config.d_ff, 1024);
        assert_eq!(config.d_kv, 64);
        assert_eq!(config.num_heads, 6);
        assert_eq!(config.num_layers, 8);
        assert_eq!(config.feed_forward_proj, FeedForwardProj::GatedGelu);
        assert!(!config.tie_word_embeddings);
        assert_eq!(config.relative_attention_max_distance, 128);
    }

    #[test]
    fn parses_transformers_config() {
        let config: T5Config = serde_json::from_str(
            r#"{
                "d_model": 768,
                "d_ff": 2048,
                "d_kv": 64,
                "num_heads": 12,
                "num_layers": 12,
                "num_decoder_layers": 12,
                "vocab_size": 250112,
                "relative_attention_num_buckets": 32,
                "dropout_rate": 0.1,
                "layer_norm_epsilon": 1e-06,
                "feed_forward_proj": "gated-gelu",
                "dense_act_fn": "gelu_new",
                "tie_word_embeddings": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.dense_act_fn, Activation::gelu_new);
        assert_eq!(config.num_decoder_layers, Some(12));
    }

    #[test]
    fn forward_produces_vocabulary_logits() -> Result<(), SummarizerError> {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = T5ForConditionalGeneration::new(vs.root(), &tiny_config());

        let input_ids = Tensor::from_slice(&[2i64, 5, 6, 7, 3, 2, 8, 3, 0, 0]).view([2, 5]);
        let decoder_input_ids = Tensor::from_slice(&[2i64, 9, 3, 2, 10, 0]).view([2, 3]);

        let logits = tch::no_grad(|| model.forward_t(&input_ids, &decoder_input_ids, false))?;

        assert_eq!(logits.size(), vec![2, 3, 30]);
        assert_eq!(logits.kind(), Kind::Float);
        Ok(())
    }

    #[test]
    fn decoder_is_causal() -> Result<(), SummarizerError> {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = T5ForConditionalGeneration::new(vs.root(), &tiny_config());
        let input_ids = Tensor::from_slice(&[2i64, 5, 6, 3]).view([1, 4]);

        let (short, long) = tch::no_grad(|| -> Result<(Tensor, Tensor), SummarizerError> {
            let encoded = model.encode(&input_ids, false)?;
            let short = model.decode(
                &encoded,
                None,
                &Tensor::from_slice(&[2i64, 7]).view([1, 2]),
                false,
            )?;
            let long = model.decode(
                &encoded,
                None,
                &Tensor::from_slice(&[2i64, 7, 11, 12]).view([1, 4]),
                false,
            )?;
            Ok((short, long))
        })?;

        let diff = (short - long.narrow(1, 0, 2))
            .abs()
            .max()
            .double_value(&[]);
        assert!(diff < 1e-5);
        Ok(())
    }
}
