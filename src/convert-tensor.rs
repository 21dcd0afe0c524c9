// Copyright 2019-present, Laurent Mazare.
// Copyright 2019-present Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Converts a `.npz` archive of named arrays (e.g. a T5 PEGASUS checkpoint exported with
//! `numpy.savez`, variables named after the `tch` paths of the model) to the `tch` format.

use t5_pegasus_summarizer::SummarizerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn main() -> Result<(), SummarizerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<_> = std::env::args().collect();
    if args.len() != 3 {
        return Err(SummarizerError::ValueError(format!(
            "usage: {} source.npz destination.ot",
            args.first().map_or("convert-tensor", String::as_str)
        )));
    }

    let source_file = &args[1];
    let destination_file = &args[2];
    let tensors = tch::Tensor::read_npz(source_file)?;
    for (name, tensor) in &tensors {
        info!(name = name.as_str(), shape = ?tensor.size(), "converted");
    }
    tch::Tensor::save_multi(&tensors, destination_file)?;
    info!(
        variables = tensors.len(),
        destination = destination_file.as_str(),
        "conversion completed"
    );

    Ok(())
}
