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

//! # Text generation metrics
//!
//! ROUGE-1, ROUGE-2, ROUGE-L and sentence-level BLEU over whitespace-tokenized texts. For Chinese
//! titles the tokens are single characters joined by spaces.

mod bleu;
mod rouge;

pub use bleu::{sentence_bleu, SmoothingFunction};
pub use rouge::{rouge_l, rouge_n, Rouge, RougeScore, RougeScores};
