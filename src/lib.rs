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

//! # T5 PEGASUS title generation
//!
//! Fine-tuning and evaluation of Chinese T5 PEGASUS models (T5 v1.1 encoder-decoder pretrained
//! with a PEGASUS-style objective) for generating short titles from long documents, built on
//! [tch-rs](https://github.com/LaurentMazare/tch-rs) bindings to libtorch.
//!
//! The crate contains:
//! - `t5`: the T5 v1.1 encoder-decoder (gated-GeLU feed forward, RMS layer norm, relative position buckets)
//! - `tokenizer`: a WordPiece tokenizer with jieba word segmentation over a BERT vocabulary
//! - `data`: TSV and spreadsheet loaders, padded batch generation
//! - `training`: masked teacher-forced cross-entropy and an Adam fine-tuning loop
//! - `generation`: beam search decoding of titles
//! - `metrics`: ROUGE-1/2/L and sentence BLEU
//! - `evaluation`: epoch-end evaluation with best-BLEU checkpointing and a results table
//! - `pipeline`: end-to-end training and evaluation runs
//!
//! # Quick Start
//!
//! ```no_run
//! use t5_pegasus_summarizer::training::FinetuneConfig;
//! use t5_pegasus_summarizer::{pipeline, Config};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = FinetuneConfig::try_from_file("finetune.json")?;
//! let report = pipeline::train(&config)?;
//! println!("best validation BLEU: {}", report.best_bleu);
//! let test_metrics = pipeline::evaluate(&config, None)?;
//! println!("{test_metrics:?}");
//! # Ok(())
//! # }
//! ```
//!
//! Pretrained weights are expected in the `tch` format. Checkpoints exported as `.npz` can be
//! converted with the `convert-tensor` binary:
//!
//! ```bash
//! cargo run --bin=convert-tensor --release -- model.npz model.ot
//! ```

pub mod common;
pub mod data;
pub mod evaluation;
pub mod generation;
pub mod metrics;
pub mod pipeline;
pub mod t5;
pub mod tokenizer;
pub mod training;

pub use common::error::SummarizerError;
pub use common::Config;
