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

//! # Evaluation of generated titles
//!
//! `Evaluator` scores a `TitleGenerator` over a dataset, keeps the best checkpoint when used as a
//! training callback, and records every prediction in a `ResultsTable` written at the end of a run.

mod evaluator;
mod results;

pub use evaluator::{space_characters, Evaluator, Metrics};
pub use results::{ResultRow, ResultsTable};
