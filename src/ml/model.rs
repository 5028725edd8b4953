use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize;
// deriving them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct MlpConfig {
    pub input_features:  usize,
    pub hidden:          Vec<usize>,
    pub output_features: usize,
    #[config(default = true)]
    pub bias:            bool,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpModel<B> {
        let mut width = self.input_features;
        let mut layers = Vec::with_capacity(self.hidden.len());
        for &next in &self.hidden {
            layers.push(LinearConfig::new(width, next).with_bias(self.bias).init(device));
            width = next;
        }
        let head = LinearConfig::new(width, self.output_features)
            .with_bias(self.bias)
            .init(device);
        MlpModel { layers, head }
    }
}

#[derive(Module, Debug)]
pub struct MlpModel<B: Backend> {
    pub layers: Vec<Linear<B>>,
    pub head:   Linear<B>,
}

impl<B: Backend> MlpModel<B> {
    /// x: [batch, input_features] → [batch, output_features]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_observed(x, |_, _| {})
    }

    /// Same as `forward`, calling `on_output(path, output)` after every
    /// Linear with the path the adapter uses for that layer.
    pub fn forward_observed(
        &self,
        x:             Tensor<B, 2>,
        mut on_output: impl FnMut(&str, &Tensor<B, 2>),
    ) -> Tensor<B, 2> {
        let mut x = x;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = layer.forward(x);
            on_output(&format!("layers.{i}"), &out);
            x = burn::tensor::activation::relu(out);
        }
        let out = self.head.forward(x);
        on_output("head", &out);
        out
    }

    /// Every Linear with its dotted path, in forward order.
    pub fn named_linears(&self) -> Vec<(String, &Linear<B>)> {
        let mut named: Vec<(String, &Linear<B>)> = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (format!("layers.{i}"), layer))
            .collect();
        named.push(("head".to_string(), &self.head));
        named
    }
}
