use machine_learning::arch::{Domain, Sequential, activations::ActFn, layers::Layer};

use crate::config::{Architecture, TrainingConfig};

/// Complex channels are stored as a real and an imaginary plane.
pub const COMPLEX_CHANNELS: usize = 2;

/// The hyperparameters every architecture is built from.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    /// The `(n, n, 2)` input shape.
    pub input_shape: [usize; 3],
    /// The domain the network's input lives in.
    pub domain: Domain,
    pub act_fn: Option<ActFn>,
    pub kernel_size: usize,
    pub num_features: usize,
    pub num_layers: usize,
}

impl ModelSpec {
    pub fn from_config(config: &TrainingConfig, side: usize) -> Self {
        Self {
            input_shape: [side, side, COMPLEX_CHANNELS],
            domain: config.input_domain,
            act_fn: config.nonlinearity.act_fn(),
            kernel_size: config.kernel_size,
            num_features: config.num_features.get(),
            num_layers: config.num_layers.get(),
        }
    }

    /// The channel count of every block, from the input up to the last hidden block.
    fn widths(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_layers - 1).map(|i| {
            let in_channels = match i {
                0 => self.input_shape[2],
                _ => self.num_features,
            };
            (in_channels, self.num_features)
        })
    }

    fn last_width(&self) -> usize {
        match self.num_layers {
            1 => self.input_shape[2],
            _ => self.num_features,
        }
    }
}

pub type Builder = fn(&ModelSpec) -> Sequential;

impl Architecture {
    /// The builder of every architecture.
    pub fn builder(self) -> Builder {
        match self {
            Self::Conv => conv_no_residual,
            Self::ConvResidual => conv_residual,
            Self::InterlacerResidual => interlacer_residual,
        }
    }
}

/// Builds the network `architecture` names.
pub fn build_model(architecture: Architecture, spec: &ModelSpec) -> Sequential {
    architecture.builder()(spec)
}

fn conv_stack(spec: &ModelSpec) -> Vec<Layer> {
    let k = spec.kernel_size;

    spec.widths()
        .map(|(input, output)| Layer::conv(input, output, k, spec.act_fn))
        .chain([Layer::conv(spec.last_width(), COMPLEX_CHANNELS, k, None)])
        .collect()
}

/// Plain convolutions from input to output.
pub fn conv_no_residual(spec: &ModelSpec) -> Sequential {
    Sequential::new(conv_stack(spec))
}

/// Convolutions that learn the correction to add to the input.
pub fn conv_residual(spec: &ModelSpec) -> Sequential {
    Sequential::new([Layer::residual(conv_stack(spec))])
}

/// Interlaced layers, each mixing features from both domains, that learn the correction to add to
/// the input.
pub fn interlacer_residual(spec: &ModelSpec) -> Sequential {
    let k = spec.kernel_size;
    let domain = spec.domain;

    let layers: Vec<_> = spec
        .widths()
        .map(|(input, output)| Layer::interlacer(domain, input, output, k, spec.act_fn))
        .chain([Layer::interlacer(
            domain,
            spec.last_width(),
            COMPLEX_CHANNELS,
            k,
            None,
        )])
        .collect();

    Sequential::new([Layer::residual(layers)])
}
