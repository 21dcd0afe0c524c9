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

use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;

const PROGRESS_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Progress bar for training and evaluation loops, hidden when stderr is not a terminal.
pub(crate) fn progress_bar<S: Into<Cow<'static, str>>>(len: u64, prefix: S) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.with_prefix(prefix)
}
