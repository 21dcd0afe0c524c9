//! # Fine-tuning
//!
//! Teacher-forced training of the encoder-decoder: the decoder receives the reference title and
//! is trained to predict it shifted by one position, the loss ignoring padded positions.

mod config;
mod loss;
mod trainer;

pub use config::{DataFormat, DeviceOption, FinetuneConfig};
pub use loss::masked_cross_entropy;
pub use trainer::{EpochCallback, NoCallback, Trainer};
