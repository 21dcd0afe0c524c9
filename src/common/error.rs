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

use rust_tokenizers::error::TokenizerError;
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Malformed data error: {0}")]
    DataError(String),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(String),

    #[error("CSV error: {0}")]
    CsvError(String),
}

impl From<std::io::Error> for SummarizerError {
    fn from(error: std::io::Error) -> Self {
        SummarizerError::IOError(error.to_string())
    }
}

impl From<TokenizerError> for SummarizerError {
    fn from(error: TokenizerError) -> Self {
        SummarizerError::TokenizerError(error.to_string())
    }
}

impl From<TchError> for SummarizerError {
    fn from(error: TchError) -> Self {
        SummarizerError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for SummarizerError {
    fn from(error: serde_json::Error) -> Self {
        SummarizerError::InvalidConfigurationError(error.to_string())
    }
}

impl From<csv::Error> for SummarizerError {
    fn from(error: csv::Error) -> Self {
        SummarizerError::CsvError(error.to_string())
    }
}

impl From<calamine::Error> for SummarizerError {
    fn from(error: calamine::Error) -> Self {
        SummarizerError::SpreadsheetError(error.to_string())
    }
}
