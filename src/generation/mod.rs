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

//! # Title generation
//!
//! Autoregressive decoding of titles from a fine-tuned model. `BeamSearchDecoder` is independent
//! of the model: anything implementing `NextTokenScorer` can be decoded, which
//! `T5ForConditionalGeneration` does by scoring the last position of the decoder output.

mod auto_title;
mod beam_search;

pub use auto_title::{AutoTitle, TitleGenerator};
pub use beam_search::{BeamSearchDecoder, NextTokenScorer};
