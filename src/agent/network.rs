use burn::module::{Param, ParamId};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::branching::ACTION_COUNT;

/// Size of the observation vector fed to the network (the scalar gap).
pub const STATE_DIM: usize = 1;

/// Action-value network.
///
/// ```text
/// Input:  [batch, 1]   (normalized gap)
/// FC1:    1 -> 24, ReLU
/// FC2:    24 -> 48, ReLU
/// FC3:    48 -> 24, ReLU
/// Out:    24 -> 7   (Q-values, one per branching strategy)
/// ```
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    out: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub state_dim: usize,
    pub actions: usize,
}

impl Default for QNetworkConfig {
    fn default() -> Self {
        QNetworkConfig {
            state_dim: STATE_DIM,
            actions: ACTION_COUNT,
        }
    }
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc1: LinearConfig::new(self.state_dim, 24).init(device),
            fc2: LinearConfig::new(24, 48).init(device),
            fc3: LinearConfig::new(48, 24).init(device),
            out: LinearConfig::new(24, self.actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass: input [batch, 1] -> output [batch, actions] Q-values.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(input));
        let x = self.relu.forward(self.fc2.forward(x));
        let x = self.relu.forward(self.fc3.forward(x));
        self.out.forward(x)
    }
}

/// Polyak blend of every target parameter toward the source:
/// `target ← τ·source + (1−τ)·target`. Never a hard copy.
pub fn soft_update<B: Backend>(target: QNetwork<B>, source: &QNetwork<B>, tau: f64) -> QNetwork<B> {
    QNetwork {
        fc1: soft_update_linear(target.fc1, &source.fc1, tau),
        fc2: soft_update_linear(target.fc2, &source.fc2, tau),
        fc3: soft_update_linear(target.fc3, &source.fc3, tau),
        out: soft_update_linear(target.out, &source.out, tau),
        relu: Relu::new(),
    }
}

fn soft_update_linear<B: Backend>(target: Linear<B>, source: &Linear<B>, tau: f64) -> Linear<B> {
    let weight = soft_update_param(target.weight, &source.weight, tau);
    let bias = match (target.bias, &source.bias) {
        (Some(t), Some(s)) => Some(soft_update_param(t, s, tau)),
        (b, _) => b,
    };
    Linear { weight, bias }
}

pub(crate) fn soft_update_param<B: Backend, const D: usize>(
    target: Param<Tensor<B, D>>,
    source: &Param<Tensor<B, D>>,
    tau: f64,
) -> Param<Tensor<B, D>> {
    let blended = source
        .val()
        .mul_scalar(tau)
        .add(target.val().mul_scalar(1.0 - tau));
    Param::initialized(ParamId::new(), blended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_network_output_shape() {
        let device = Default::default();
        let network = QNetworkConfig::default().init::<TestBackend>(&device);

        let input = Tensor::zeros([4, 1], &device);
        let output = network.forward(input);
        assert_eq!(output.shape().dims, [4, ACTION_COUNT]);
    }

    #[test]
    fn test_network_single_input() {
        let device = Default::default();
        let network = QNetworkConfig::default().init::<TestBackend>(&device);

        let input = Tensor::zeros([1, 1], &device);
        let output = network.forward(input);
        assert_eq!(output.shape().dims, [1, ACTION_COUNT]);
    }

    #[test]
    fn test_soft_update_param_blend() {
        let device = Default::default();
        let target = Param::initialized(
            ParamId::new(),
            Tensor::<TestBackend, 1>::from_data(TensorData::from([0.0f32]), &device),
        );
        let source = Param::initialized(
            ParamId::new(),
            Tensor::<TestBackend, 1>::from_data(TensorData::from([1.0f32]), &device),
        );

        let blended = soft_update_param(target, &source, 0.125);
        let value = blended.val().into_data().to_vec::<f32>().unwrap()[0];
        assert_eq!(value, 0.125);
    }

    #[test]
    fn test_soft_update_moves_toward_source() {
        let device = Default::default();
        let config = QNetworkConfig::default();
        let source = config.init::<TestBackend>(&device);
        let target = config.init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::from_data(TensorData::from([[0.5f32]]), &device);
        let source_q: Vec<f32> = source
            .forward(input.clone())
            .into_data()
            .to_vec()
            .unwrap();

        let mut blended = target;
        for _ in 0..200 {
            blended = soft_update(blended, &source, 0.125);
        }
        let blended_q: Vec<f32> = blended.forward(input).into_data().to_vec().unwrap();
        for (b, s) in blended_q.iter().zip(&source_q) {
            assert!((b - s).abs() < 1e-3, "blended {b} should approach {s}");
        }
    }
}
