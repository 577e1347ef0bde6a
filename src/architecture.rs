//! Architecture configuration structures
//!
//! This module provides configuration structures for defining a layer chain
//! via JSON configuration files. This enables architecture experimentation
//! without code changes. The same construction preconditions the `Network`
//! factories enforce with assertions are checked here as recoverable errors,
//! so a bad config file is reported instead of aborting the process.

use crate::network::Network;
use crate::utils::rng::SimpleRng;
use serde::Deserialize;
use std::error::Error;
use std::fs;

/// Configuration for a single layer in the chain.
///
/// Defines the layer type and its parameters. Different layer types require
/// different fields:
///
/// - **input**: Requires `depth`, `width`, `height`. Must be the first layer.
/// - **full**: Requires `nnodes` and `std`.
/// - **conv**: Requires `depth`, `width`, `height`, `kernel_size`, and `std`,
///   with optional `padding` (default 0) and `stride` (default 1)
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "conv",
///   "depth": 16,
///   "width": 14,
///   "height": 14,
///   "kernel_size": 3,
///   "padding": 1,
///   "stride": 2,
///   "std": 0.1
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "input", "full", or "conv"
    pub layer_type: String,

    /// Depth (number of slices) for input and conv layers
    pub depth: Option<usize>,
    /// Width for input and conv layers
    pub width: Option<usize>,
    /// Height for input and conv layers
    pub height: Option<usize>,

    /// Node count for full layers
    pub nnodes: Option<usize>,

    /// Kernel side length for conv layers (must be odd)
    pub kernel_size: Option<usize>,
    /// Zero-padding for conv layers (default: 0)
    pub padding: Option<usize>,
    /// Stride for conv layers (default: 1)
    pub stride: Option<usize>,

    /// Weight initialization standard deviation for full and conv layers
    pub std: Option<f64>,
}

/// Configuration for the entire chain.
///
/// Contains a sequence of layer configurations, applied in order. The first
/// must be the input layer and the last one is the output layer.
///
/// # Example
///
/// ```json
/// {
///   "layers": [
///     { "layer_type": "input", "depth": 1, "width": 28, "height": 28 },
///     { "layer_type": "conv", "depth": 16, "width": 14, "height": 14,
///       "kernel_size": 3, "padding": 1, "stride": 2, "std": 0.1 },
///     { "layer_type": "full", "nnodes": 10, "std": 0.1 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    /// Sequence of layer configurations defining the chain
    pub layers: Vec<LayerConfig>,
}

fn invalid_data(message: String) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    ))
}

/// Loads an architecture configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into an
/// `ArchitectureConfig`, then validates it.
///
/// # Returns
///
/// `Ok(ArchitectureConfig)` on success, or an error if the file cannot be
/// read, the JSON is invalid, or the described chain is inconsistent.
///
/// # Examples
///
/// ```no_run
/// use chainnet::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/mnist_cnn.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: &str) -> Result<ArchitectureConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - The chain starts with exactly one input layer and has an output layer
/// - Each layer has the required fields for its type, with positive values
/// - Conv layers have an odd kernel, positive stride, and an output shape
///   whose receptive windows fit the (padded) predecessor
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<(), Box<dyn Error>> {
    if config.layers.is_empty() {
        return Err(invalid_data(
            "Architecture must have at least one layer".to_string(),
        ));
    }
    if config.layers[0].layer_type.to_lowercase() != "input" {
        return Err(invalid_data(
            "Layer 0: the first layer must have layer_type 'input'".to_string(),
        ));
    }
    if config.layers.len() < 2 {
        return Err(invalid_data(
            "Architecture needs at least one trainable layer after the input".to_string(),
        ));
    }

    // (depth, width, height) of the previous layer, threaded through the walk.
    let mut prev_shape = (0usize, 0usize, 0usize);

    for (i, layer) in config.layers.iter().enumerate() {
        let layer_type = layer.layer_type.to_lowercase();

        match layer_type.as_str() {
            "input" => {
                if i != 0 {
                    return Err(invalid_data(format!(
                        "Layer {}: only the first layer may be an input layer",
                        i
                    )));
                }
                let depth = layer
                    .depth
                    .ok_or_else(|| invalid_data(format!("Layer {}: input layer requires 'depth'", i)))?;
                let width = layer
                    .width
                    .ok_or_else(|| invalid_data(format!("Layer {}: input layer requires 'width'", i)))?;
                let height = layer
                    .height
                    .ok_or_else(|| invalid_data(format!("Layer {}: input layer requires 'height'", i)))?;
                if depth == 0 || width == 0 || height == 0 {
                    return Err(invalid_data(format!(
                        "Layer {}: input shape must be positive",
                        i
                    )));
                }
                prev_shape = (depth, width, height);
            }
            "full" => {
                let nnodes = layer
                    .nnodes
                    .ok_or_else(|| invalid_data(format!("Layer {}: full layer requires 'nnodes'", i)))?;
                if nnodes == 0 {
                    return Err(invalid_data(format!(
                        "Layer {}: nnodes must be greater than 0",
                        i
                    )));
                }
                validate_std(layer, i)?;
                prev_shape = (nnodes, 1, 1);
            }
            "conv" => {
                let depth = layer
                    .depth
                    .ok_or_else(|| invalid_data(format!("Layer {}: conv layer requires 'depth'", i)))?;
                let width = layer
                    .width
                    .ok_or_else(|| invalid_data(format!("Layer {}: conv layer requires 'width'", i)))?;
                let height = layer
                    .height
                    .ok_or_else(|| invalid_data(format!("Layer {}: conv layer requires 'height'", i)))?;
                let kernel_size = layer.kernel_size.ok_or_else(|| {
                    invalid_data(format!("Layer {}: conv layer requires 'kernel_size'", i))
                })?;
                let padding = layer.padding.unwrap_or(0);
                let stride = layer.stride.unwrap_or(1);

                if depth == 0 || width == 0 || height == 0 {
                    return Err(invalid_data(format!(
                        "Layer {}: conv shape must be positive",
                        i
                    )));
                }
                if kernel_size % 2 != 1 {
                    return Err(invalid_data(format!(
                        "Layer {}: kernel_size must be odd, got {}",
                        i, kernel_size
                    )));
                }
                if stride == 0 {
                    return Err(invalid_data(format!(
                        "Layer {}: stride must be greater than 0",
                        i
                    )));
                }
                validate_std(layer, i)?;

                let (_, prev_width, prev_height) = prev_shape;
                if (width - 1) * stride + kernel_size > prev_width + 2 * padding {
                    return Err(invalid_data(format!(
                        "Layer {}: output width {} does not fit predecessor width {} (kernel={}, padding={}, stride={})",
                        i, width, prev_width, kernel_size, padding, stride
                    )));
                }
                if (height - 1) * stride + kernel_size > prev_height + 2 * padding {
                    return Err(invalid_data(format!(
                        "Layer {}: output height {} does not fit predecessor height {} (kernel={}, padding={}, stride={})",
                        i, height, prev_height, kernel_size, padding, stride
                    )));
                }

                prev_shape = (depth, width, height);
            }
            _ => {
                return Err(invalid_data(format!(
                    "Layer {}: Invalid layer type '{}'. Must be one of: input, full, conv",
                    i, layer.layer_type
                )));
            }
        }
    }

    Ok(())
}

fn validate_std(layer: &LayerConfig, index: usize) -> Result<(), Box<dyn Error>> {
    let std = layer.std.ok_or_else(|| {
        invalid_data(format!(
            "Layer {}: {} layer requires 'std'",
            index, layer.layer_type
        ))
    })?;
    if std < 0.0 {
        return Err(invalid_data(format!(
            "Layer {}: std must be non-negative",
            index
        )));
    }
    Ok(())
}

/// Builds a `Network` from an architecture configuration.
///
/// Validates the configuration, then constructs the chain in order using the
/// provided RNG for weight initialization, so the same seed yields the same
/// network.
///
/// # Errors
///
/// Returns an error if the configuration is invalid. Construction itself
/// cannot fail once validation passes.
///
/// # Examples
///
/// ```no_run
/// use chainnet::architecture::{build_network, load_architecture};
/// use chainnet::utils::rng::SimpleRng;
///
/// let config = load_architecture("config/architectures/mnist_cnn.json").unwrap();
/// let mut rng = SimpleRng::new(42);
/// let net = build_network(&config, &mut rng).unwrap();
/// assert_eq!(net.num_layers(), config.layers.len());
/// ```
pub fn build_network(
    config: &ArchitectureConfig,
    rng: &mut SimpleRng,
) -> Result<Network, Box<dyn Error>> {
    validate_architecture(config)?;

    let input = &config.layers[0];
    let mut net = Network::with_input(
        input.depth.unwrap(),
        input.width.unwrap(),
        input.height.unwrap(),
    );

    for layer in &config.layers[1..] {
        match layer.layer_type.to_lowercase().as_str() {
            "full" => {
                net.add_full(layer.nnodes.unwrap(), layer.std.unwrap(), rng);
            }
            "conv" => {
                net.add_conv(
                    layer.depth.unwrap(),
                    layer.width.unwrap(),
                    layer.height.unwrap(),
                    layer.kernel_size.unwrap(),
                    layer.padding.unwrap_or(0),
                    layer.stride.unwrap_or(1),
                    layer.std.unwrap(),
                    rng,
                );
            }
            _ => unreachable!("validate_architecture rejects unknown layer types"),
        }
    }

    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_layer(depth: usize, width: usize, height: usize) -> LayerConfig {
        LayerConfig {
            layer_type: "input".to_string(),
            depth: Some(depth),
            width: Some(width),
            height: Some(height),
            nnodes: None,
            kernel_size: None,
            padding: None,
            stride: None,
            std: None,
        }
    }

    fn full_layer(nnodes: usize) -> LayerConfig {
        LayerConfig {
            layer_type: "full".to_string(),
            depth: None,
            width: None,
            height: None,
            nnodes: Some(nnodes),
            kernel_size: None,
            padding: None,
            stride: None,
            std: Some(0.1),
        }
    }

    #[test]
    fn test_validate_minimal_chain() {
        let config = ArchitectureConfig {
            layers: vec![input_layer(1, 4, 4), full_layer(2)],
        };
        assert!(validate_architecture(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let config = ArchitectureConfig { layers: vec![] };
        assert!(validate_architecture(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_input_elsewhere() {
        let config = ArchitectureConfig {
            layers: vec![input_layer(1, 4, 4), full_layer(2), input_layer(1, 2, 2)],
        };
        let err = validate_architecture(&config).unwrap_err();
        assert!(err.to_string().contains("only the first layer"));
    }

    #[test]
    fn test_validate_rejects_missing_std() {
        let mut layer = full_layer(2);
        layer.std = None;
        let config = ArchitectureConfig {
            layers: vec![input_layer(1, 4, 4), layer],
        };
        let err = validate_architecture(&config).unwrap_err();
        assert!(err.to_string().contains("requires 'std'"));
    }

    #[test]
    fn test_validate_rejects_bad_conv_fit() {
        let conv = LayerConfig {
            layer_type: "conv".to_string(),
            depth: Some(2),
            width: Some(4),
            height: Some(4),
            nnodes: None,
            kernel_size: Some(3),
            padding: Some(0),
            stride: Some(1),
            std: Some(0.1),
        };
        let config = ArchitectureConfig {
            layers: vec![input_layer(1, 4, 4), conv],
        };
        let err = validate_architecture(&config).unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_build_network_shapes() {
        let conv = LayerConfig {
            layer_type: "conv".to_string(),
            depth: Some(2),
            width: Some(4),
            height: Some(4),
            nnodes: None,
            kernel_size: Some(3),
            padding: Some(1),
            stride: Some(1),
            std: Some(0.1),
        };
        let config = ArchitectureConfig {
            layers: vec![input_layer(1, 4, 4), conv, full_layer(3)],
        };

        let mut rng = SimpleRng::new(42);
        let net = build_network(&config, &mut rng).unwrap();

        assert_eq!(net.num_layers(), 3);
        assert_eq!(net.layer(1).shape(), (2, 4, 4));
        assert_eq!(net.layer(2).shape(), (3, 1, 1));
    }
}
