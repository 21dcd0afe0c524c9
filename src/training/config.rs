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

use crate::data::{load_spreadsheet, load_tsv, Sample, Split};
use crate::{Config, SummarizerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tch::Device;

/// Format of the dataset files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// `title\tcontent` per line, one file per split
    Tsv,
    /// Spreadsheet with `正文` / `摘要` columns, split 80/20 by row position
    Spreadsheet,
}

/// Device selection for training and inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOption {
    /// First CUDA device if available, CPU otherwise
    Auto,
    Cpu,
    Cuda,
}

/// # Configuration for fine-tuning and evaluation
/// The default values reproduce the reference training setup for `chinese_t5_pegasus_small`.
/// Any subset of the fields may be overridden from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinetuneConfig {
    /// Model architecture configuration (`config.json`)
    pub config_path: PathBuf,
    /// Pretrained weights converted to the `tch` format
    pub checkpoint_path: PathBuf,
    /// BERT-style vocabulary (`vocab.txt`)
    pub vocab_path: PathBuf,
    pub data_format: DataFormat,
    pub train_path: PathBuf,
    pub valid_path: PathBuf,
    pub test_path: PathBuf,
    /// Weights of the best model seen during training (highest validation BLEU)
    pub best_model_path: PathBuf,
    /// Table of (content, title, predicted title) rows, appended to
    pub results_path: PathBuf,
    /// Maximum number of tokens of a source document, start and end markers included
    pub max_content_len: usize,
    /// Maximum number of tokens of a title, also the maximum number of decoding steps
    pub max_title_len: usize,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Number of beams for decoding, 1 is greedy decoding
    pub beam_size: usize,
    /// Seed for the shuffling of training batches
    pub seed: u64,
    pub lower_case: bool,
    pub device: DeviceOption,
}

impl Config for FinetuneConfig {}

impl Default for FinetuneConfig {
    fn default() -> Self {
        FinetuneConfig {
            config_path: PathBuf::from("./chinese_t5_pegasus_small/config.json"),
            checkpoint_path: PathBuf::from("./chinese_t5_pegasus_small/model.ot"),
            vocab_path: PathBuf::from("./chinese_t5_pegasus_small/vocab.txt"),
            data_format: DataFormat::Tsv,
            train_path: PathBuf::from("./train.tsv"),
            valid_path: PathBuf::from("./dev.tsv"),
            test_path: PathBuf::from("./test.tsv"),
            best_model_path: PathBuf::from("./best_model.ot"),
            results_path: PathBuf::from("./results/results.tsv"),
            max_content_len: 512,
            max_title_len: 16,
            batch_size: 16,
            epochs: 40,
            learning_rate: 2e-4,
            beam_size: 1,
            seed: 42,
            lower_case: true,
            device: DeviceOption::Auto,
        }
    }
}

impl FinetuneConfig {
    pub fn device(&self) -> Device {
        match self.device {
            DeviceOption::Auto => Device::cuda_if_available(),
            DeviceOption::Cpu => Device::Cpu,
            DeviceOption::Cuda => Device::Cuda(0),
        }
    }

    /// Checks value ranges that would otherwise fail deep inside training.
    pub fn validate(&self) -> Result<(), SummarizerError> {
        let check = |valid: bool, message: &str| {
            if valid {
                Ok(())
            } else {
                Err(SummarizerError::InvalidConfigurationError(message.to_string()))
            }
        };
        check(self.batch_size > 0, "batch_size must be positive")?;
        check(self.beam_size > 0, "beam_size must be positive")?;
        check(self.max_content_len > 2, "max_content_len must leave room for content tokens")?;
        check(self.max_title_len > 1, "max_title_len must be at least 2")?;
        check(self.learning_rate > 0.0, "learning_rate must be positive")
    }

    pub fn split_path(&self, split: Split) -> &PathBuf {
        match split {
            Split::Train => &self.train_path,
            Split::Valid => &self.valid_path,
            Split::Test => &self.test_path,
        }
    }

    /// Loads the samples of a dataset split according to `data_format`.
    pub fn load_split(&self, split: Split) -> Result<Vec<Sample>, SummarizerError> {
        let path = self.split_path(split);
        match self.data_format {
            DataFormat::Tsv => load_tsv(path),
            DataFormat::Spreadsheet => load_spreadsheet(path, split),
        }
    }
}
