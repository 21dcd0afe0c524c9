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

use crate::SummarizerError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// # Utility to deserialize JSON config files
pub trait Config
where
    for<'de> Self: Deserialize<'de>,
{
    /// Loads a `Config` object from a JSON file. The format is expected to be aligned with the [Transformers library](https://github.com/huggingface/transformers) configuration files for each model.
    /// Missing files and parsing failures, including non-optional keys expected by the model
    /// being absent, are returned as errors.
    ///
    /// # Arguments
    ///
    /// * `path` - `Path` to the configuration JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use t5_pegasus_summarizer::t5::T5Config;
    /// use t5_pegasus_summarizer::Config;
    /// use std::path::Path;
    ///
    /// let config_path = Path::new("path/to/config.json");
    /// let config = T5Config::try_from_file(config_path)?;
    /// # Ok::<(), t5_pegasus_summarizer::SummarizerError>(())
    /// ```
    fn try_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SummarizerError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            SummarizerError::IOError(format!("could not open {}: {}", path.display(), e))
        })?;
        let br = BufReader::new(f);
        Ok(serde_json::from_reader(br)?)
    }
}
