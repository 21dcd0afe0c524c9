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
use tch::Kind;

/// Most negative finite value representable in `kind`, used for additive attention masks.
pub(crate) fn get_min(kind: Kind) -> Result<f64, SummarizerError> {
    Ok(match kind {
        Kind::Half => f64::from(half::f16::MIN),
        Kind::Float => f64::from(f32::MIN),
        Kind::BFloat16 => f64::from(half::bf16::MIN),
        Kind::Double => f64::MIN,
        _ => {
            return Err(SummarizerError::ValueError(format!(
                "Type not supported: attempted to get min value for {kind:?}"
            )))
        }
    })
}
