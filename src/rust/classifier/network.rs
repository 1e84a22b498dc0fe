use std::fs;
use std::path::Path;

use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::Deserialize;

use super::error::{ArtifactLoadError, ClassifierError};
use super::scorer::{check_width, finish_probability, FeatureVector, Scorer};
use super::utils::sigmoid;

/// Activation applied element-wise after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => sigmoid(x),
            Self::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerArtifact {
    units: usize,
    activation: Activation,
    kernel: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct NetworkArtifact {
    format_version: u32,
    #[serde(default)]
    name: Option<String>,
    input_dim: usize,
    layers: Vec<LayerArtifact>,
}

/// One fully connected layer: `activation(x · kernel + bias)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    kernel: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    /// `kernel` has shape `(inputs, units)`, `bias` has length `units`.
    pub fn new(kernel: Array2<f32>, bias: Array1<f32>, activation: Activation) -> Self {
        Self {
            kernel,
            bias,
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols()
    }

    fn forward(&self, x: &Array1<f32>) -> Array1<f32> {
        let activation = self.activation;
        let mut out = x.dot(&self.kernel) + &self.bias;
        out.mapv_inplace(|v| activation.apply(v));
        out
    }
}

/// A feed-forward network ending in a single sigmoid unit.
///
/// Holds no mutable state, so one instance can serve any number of concurrent
/// predictions.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    name: String,
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Artifact format version this build understands
    pub const FORMAT_VERSION: u32 = 1;

    /// Builds a network from in-memory layers, checking that they chain from
    /// `input_dim` down to one sigmoid output.
    pub fn new(
        name: impl Into<String>,
        input_dim: usize,
        layers: Vec<DenseLayer>,
    ) -> Result<Self, ClassifierError> {
        Self::validate(input_dim, &layers).map_err(ClassifierError::ValidationError)?;
        Ok(Self {
            name: name.into(),
            input_dim,
            layers,
        })
    }

    /// Loads a dense network artifact from disk.
    ///
    /// # Errors
    /// - `Missing` / `Unreadable` if the file cannot be read
    /// - `Corrupt` if the document does not describe a valid network
    /// - `IncompatibleSchema` if `format_version` is not [`Self::FORMAT_VERSION`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactLoadError> {
        let path = path.as_ref();
        info!("Loading dense network from {:?}", path);
        let bytes = fs::read(path).map_err(|e| ArtifactLoadError::from_io(path, e))?;
        let network = Self::from_slice(&bytes, path)?;
        info!(
            "Network '{}' loaded: layers {:?}",
            network.name,
            network.layer_shapes()
        );
        Ok(network)
    }

    pub(crate) fn from_slice(bytes: &[u8], path: &Path) -> Result<Self, ArtifactLoadError> {
        let artifact: NetworkArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactLoadError::corrupt(path, e.to_string()))?;

        if artifact.format_version != Self::FORMAT_VERSION {
            return Err(ArtifactLoadError::IncompatibleSchema {
                path: path.to_path_buf(),
                found: artifact.format_version,
                expected: Self::FORMAT_VERSION,
            });
        }

        let mut layers = Vec::with_capacity(artifact.layers.len());
        for (i, layer) in artifact.layers.into_iter().enumerate() {
            let rows = layer.kernel.len();
            if let Some(row) = layer.kernel.iter().position(|r| r.len() != layer.units) {
                return Err(ArtifactLoadError::corrupt(
                    path,
                    format!(
                        "layer {}: kernel row {} has {} columns, expected {}",
                        i,
                        row,
                        layer.kernel[row].len(),
                        layer.units
                    ),
                ));
            }
            let flat: Vec<f32> = layer.kernel.into_iter().flatten().collect();
            let kernel = Array2::from_shape_vec((rows, layer.units), flat)
                .map_err(|e| ArtifactLoadError::corrupt(path, format!("layer {}: {}", i, e)))?;
            layers.push(DenseLayer::new(
                kernel,
                Array1::from_vec(layer.bias),
                layer.activation,
            ));
        }

        Self::validate(artifact.input_dim, &layers)
            .map_err(|reason| ArtifactLoadError::corrupt(path, reason))?;

        Ok(Self {
            name: artifact.name.unwrap_or_else(|| "dense".to_string()),
            input_dim: artifact.input_dim,
            layers,
        })
    }

    fn validate(input_dim: usize, layers: &[DenseLayer]) -> Result<(), String> {
        if input_dim == 0 {
            return Err("input_dim must be positive".into());
        }
        let last = layers
            .last()
            .ok_or_else(|| "network must have at least one layer".to_string())?;

        let mut width = input_dim;
        for (i, layer) in layers.iter().enumerate() {
            if layer.inputs() != width {
                return Err(format!(
                    "layer {} expects {} inputs but previous width is {}",
                    i,
                    layer.inputs(),
                    width
                ));
            }
            if layer.bias.len() != layer.units() {
                return Err(format!(
                    "layer {} has {} units but {} biases",
                    i,
                    layer.units(),
                    layer.bias.len()
                ));
            }
            if layer.kernel.iter().chain(layer.bias.iter()).any(|w| !w.is_finite()) {
                return Err(format!("layer {} contains non-finite weights", i));
            }
            width = layer.units();
        }

        if last.units() != 1 || last.activation != Activation::Sigmoid {
            return Err(format!(
                "output layer must be 1 sigmoid unit, found {} {:?} units",
                last.units(),
                last.activation
            ));
        }
        Ok(())
    }

    /// `(inputs, units)` of every layer, input side first
    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        self.layers.iter().map(|l| (l.inputs(), l.units())).collect()
    }
}

impl Scorer for DenseNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &FeatureVector) -> Result<f32, ClassifierError> {
        check_width(features, self.input_dim)?;

        let mut activations = features.clone();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        let raw = activations.get(0).copied().ok_or_else(|| {
            ClassifierError::PredictionError("Network produced no output".into())
        })?;
        debug!("Dense network output: {}", raw);
        finish_probability(raw)
    }
}
