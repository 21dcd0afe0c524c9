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

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tch::Tensor;

pub fn _gelu(x: &Tensor) -> Tensor {
    x * 0.5 * (1.0 + (x / ((2.0_f64).sqrt())).erf())
}

pub fn _relu(x: &Tensor) -> Tensor {
    x.relu()
}

pub fn _gelu_new(x: &Tensor) -> Tensor {
    x * 0.5 * (((x.pow_tensor_scalar(3.0f64) * 0.044715 + x) * ((2f64 / PI).sqrt())).tanh() + 1.0)
}

pub fn _linear(x: &Tensor) -> Tensor {
    x.shallow_clone()
}

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Serialize, Deserialize, Copy, PartialEq, Eq)]
/// # Activation function used in the feed-forward layers
pub enum Activation {
    /// Gaussian Error Linear Unit ([Hendrycks et al., 2016,](https://arxiv.org/abs/1606.08415))
    gelu,
    /// Rectified Linear Unit
    relu,
    /// Tanh approximation of the Gaussian Error Linear Unit
    gelu_new,
    /// Identity
    linear,
}

pub struct TensorFunction(Box<fn(&Tensor) -> Tensor>);

impl TensorFunction {
    pub fn new(fun: Box<fn(&Tensor) -> Tensor>) -> Self {
        Self(fun)
    }

    pub fn get_fn(&self) -> &fn(&Tensor) -> Tensor {
        &self.0
    }
}

impl std::fmt::Debug for TensorFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TensorFunction")
    }
}

impl Activation {
    pub fn get_function(&self) -> TensorFunction {
        TensorFunction::new(Box::new(match self {
            Activation::gelu => _gelu,
            Activation::relu => _relu,
            Activation::gelu_new => _gelu_new,
            Activation::linear => _linear,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tch::Kind;

    #[test]
    fn linear_activation_is_identity() {
        let input = Tensor::from_slice(&[-1.0f32, 0.0, 2.5]);
        let output = (Activation::linear.get_function().get_fn())(&input);
        assert_eq!(Vec::<f32>::try_from(&output).unwrap(), vec![-1.0, 0.0, 2.5]);
    }

    #[test]
    fn gelu_variants_agree_closely() {
        let input = Tensor::from_slice(&[-2.0f64, -0.5, 0.0, 0.5, 2.0]);
        let exact = (Activation::gelu.get_function().get_fn())(&input);
        let approximate = (Activation::gelu_new.get_function().get_fn())(&input);
        let max_diff = (exact - approximate)
            .abs()
            .max()
            .to_kind(Kind::Double)
            .double_value(&[]);
        assert!(max_diff < 1e-3);
    }
}
