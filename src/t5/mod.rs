//! # T5 v1.1 encoder-decoder
//!
//! Implementation of the T5 architecture in its v1.1 flavour (gated-GeLU feed forward, untied
//! language model head), as used by the Chinese T5 PEGASUS checkpoints. Configuration files
//! exported either by the Transformers library or by bert4keras are accepted.
//!
//! The model is built on a `tch` variable store and supports both teacher-forced training
//! (`forward_t` with `train = true`) and step-wise decoding (`encode` + `decode`).
//!
//! ```no_run
//! # fn main() -> Result<(), t5_pegasus_summarizer::SummarizerError> {
//! use t5_pegasus_summarizer::t5::{T5Config, T5ForConditionalGeneration};
//! use t5_pegasus_summarizer::Config;
//! use tch::{nn, Device};
//!
//! let config = T5Config::try_from_file("chinese_t5_pegasus_small/config.json")?;
//! let mut vs = nn::VarStore::new(Device::cuda_if_available());
//! let model = T5ForConditionalGeneration::new(vs.root(), &config);
//! vs.load("chinese_t5_pegasus_small/model.ot")?;
//! # Ok(())
//! # }
//! ```

mod attention;
mod encoder;
mod layer_norm;
mod t5_model;

pub use attention::{get_relative_position_bucket, T5Attention};
pub use encoder::{T5Block, T5BlockOutput, T5LayerFF, T5Stack};
pub use layer_norm::T5LayerNorm;
pub use t5_model::{FeedForwardProj, T5Config, T5ForConditionalGeneration};
