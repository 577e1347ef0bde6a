//! Layer chain engine: construction, forward, backward, and update passes.
//!
//! A network is a strictly linear chain of layers owned by a single arena.
//! Layer 0 is always the input layer; every other layer computes its outputs
//! from the layer immediately before it. Neighbors are identified by position
//! (a layer's predecessor is index - 1), so the chain cannot become cyclic and
//! a predecessor can never be re-linked after construction.
//!
//! Training follows the classic pattern:
//!
//! 1. `set_inputs` runs the forward pass through the whole chain.
//! 2. `learn_outputs` runs the backward pass, accumulating gradient sums into
//!    per-layer update buffers.
//! 3. `update` applies the accumulated sums to the parameters and resets the
//!    buffers. Calling it every N backward passes (with the rate divided by N)
//!    gives minibatch training; calling it every pass gives plain SGD.

use std::io::{self, Write};

use crate::utils::activations::{relu, relu_derivative, softmax_inplace, tanh_derivative};
use crate::utils::rng::SimpleRng;

/// Kind tag and kind-specific parameters for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Raw input values; no parameters.
    Input,
    /// Fully-connected: one weight row and one bias per output node.
    /// Hidden layers activate with tanh, the output layer with softmax.
    Full,
    /// Convolutional: one square kernel per (output depth, input depth) pair
    /// and one bias per output depth slice. Activates with ReLU.
    Conv {
        kernel_size: usize,
        padding: usize,
        stride: usize,
    },
}

/// One node of the chain: shape, activation buffers, and (if trainable)
/// parameters with their gradient accumulators.
///
/// Buffer sizes are fixed at construction:
/// - `outputs`, `gradients`, `errors` hold one value per node
///   (`nnodes = depth * width * height`).
/// - `weights`/`biases` sizes depend on the kind; `weight_updates` and
///   `bias_updates` mirror them and accumulate gradient sums across backward
///   passes until `Network::update` flushes them.
pub struct Layer {
    kind: LayerKind,
    depth: usize,
    width: usize,
    height: usize,
    nnodes: usize,
    outputs: Vec<f64>,
    gradients: Vec<f64>,
    errors: Vec<f64>,
    biases: Vec<f64>,
    bias_updates: Vec<f64>,
    weights: Vec<f64>,
    weight_updates: Vec<f64>,
}

impl Layer {
    fn new(
        kind: LayerKind,
        depth: usize,
        width: usize,
        height: usize,
        nbiases: usize,
        nweights: usize,
    ) -> Self {
        let nnodes = depth * width * height;
        Self {
            kind,
            depth,
            width,
            height,
            nnodes,
            outputs: vec![0.0; nnodes],
            gradients: vec![0.0; nnodes],
            errors: vec![0.0; nnodes],
            biases: vec![0.0; nbiases],
            bias_updates: vec![0.0; nbiases],
            weights: vec![0.0; nweights],
            weight_updates: vec![0.0; nweights],
        }
    }

    /// Get the layer kind.
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Get the layer shape as (depth, width, height).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.depth, self.width, self.height)
    }

    /// Get the flattened output count (depth * width * height).
    pub fn nnodes(&self) -> usize {
        self.nnodes
    }

    /// Get the last computed activations (all zeros before any forward pass).
    pub fn outputs(&self) -> &[f64] {
        &self.outputs
    }

    /// Get the error signal from the most recent backward pass.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Get the weight parameters (row-major for fully-connected layers,
    /// kernel-major for convolutional layers).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Get the bias parameters.
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// Get the accumulated weight-gradient sums awaiting the next update.
    pub fn weight_updates(&self) -> &[f64] {
        &self.weight_updates
    }

    /// Get the accumulated bias-gradient sums awaiting the next update.
    pub fn bias_updates(&self) -> &[f64] {
        &self.bias_updates
    }

    /// Get the total number of trainable parameters (weights + biases).
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

/// A linear chain of layers, owned as an ordered arena.
///
/// Construction is append-only: `with_input` creates the chain with its input
/// layer and `add_full`/`add_conv` attach a new layer after the current tail,
/// sizing its parameters from the tail's shape. The last layer appended is the
/// output layer.
///
/// # Example
///
/// ```
/// use chainnet::network::Network;
/// use chainnet::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let mut net = Network::with_input(1, 28, 28);
/// net.add_conv(16, 14, 14, 3, 1, 2, 0.1, &mut rng);
/// net.add_full(10, 0.1, &mut rng);
///
/// let image = vec![0.0; 28 * 28];
/// net.set_inputs(&image);
/// let mut probs = vec![0.0; 10];
/// net.get_outputs(net.output_id(), &mut probs);
/// ```
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Create a chain holding only its input layer of the given shape.
    pub fn with_input(depth: usize, width: usize, height: usize) -> Self {
        assert!(
            depth > 0 && width > 0 && height > 0,
            "input shape must be positive"
        );
        Self {
            layers: vec![Layer::new(LayerKind::Input, depth, width, height, 0, 0)],
        }
    }

    /// Append a fully-connected layer of `nnodes` outputs after the current
    /// tail and return its id.
    ///
    /// Weights are drawn from the approximately-normal initializer scaled by
    /// `std`; biases start at zero.
    pub fn add_full(&mut self, nnodes: usize, std: f64, rng: &mut SimpleRng) -> usize {
        assert!(nnodes > 0, "fully-connected layer needs at least one node");
        let prev_nodes = self.tail().nnodes;

        let mut layer = Layer::new(LayerKind::Full, nnodes, 1, 1, nnodes, nnodes * prev_nodes);
        for weight in layer.weights.iter_mut() {
            *weight = std * rng.gen_normal_f64();
        }

        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// Append a convolutional layer after the current tail and return its id.
    ///
    /// The output shape is caller-specified and validated against the
    /// predecessor: every output position's receptive window, shifted by the
    /// padding, must fall inside the padded input for both axes, i.e.
    /// `(out - 1) * stride + kernel_size <= prev + 2 * padding`. The kernel
    /// must be square with odd side length so it has a center tap.
    #[allow(clippy::too_many_arguments)]
    pub fn add_conv(
        &mut self,
        depth: usize,
        width: usize,
        height: usize,
        kernel_size: usize,
        padding: usize,
        stride: usize,
        std: f64,
        rng: &mut SimpleRng,
    ) -> usize {
        assert!(depth > 0 && width > 0 && height > 0, "conv shape must be positive");
        assert!(kernel_size % 2 == 1, "kernel size must be odd");
        assert!(stride > 0, "stride must be greater than 0");

        let prev = self.tail();
        assert!(
            (width - 1) * stride + kernel_size <= prev.width + 2 * padding,
            "conv output width {} does not fit predecessor width {} (kernel={}, padding={}, stride={})",
            width, prev.width, kernel_size, padding, stride
        );
        assert!(
            (height - 1) * stride + kernel_size <= prev.height + 2 * padding,
            "conv output height {} does not fit predecessor height {} (kernel={}, padding={}, stride={})",
            height, prev.height, kernel_size, padding, stride
        );

        let nweights = depth * prev.depth * kernel_size * kernel_size;
        let mut layer = Layer::new(
            LayerKind::Conv {
                kernel_size,
                padding,
                stride,
            },
            depth,
            width,
            height,
            depth,
            nweights,
        );
        for weight in layer.weights.iter_mut() {
            *weight = std * rng.gen_normal_f64();
        }

        self.layers.push(layer);
        self.layers.len() - 1
    }

    fn tail(&self) -> &Layer {
        // with_input guarantees at least the input layer exists.
        self.layers.last().unwrap()
    }

    /// Get the number of layers in the chain (including the input layer).
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Get the id of the output layer (the chain tail).
    pub fn output_id(&self) -> usize {
        self.layers.len() - 1
    }

    /// Get a layer by id. Panics if `lid` is out of range.
    pub fn layer(&self, lid: usize) -> &Layer {
        &self.layers[lid]
    }

    /// Set the input values and run the forward pass through the whole chain.
    ///
    /// `values` must have exactly as many entries as the input layer has
    /// nodes. Every layer's `outputs` (and `gradients`) are overwritten.
    pub fn set_inputs(&mut self, values: &[f64]) {
        let input = &mut self.layers[0];
        assert_eq!(
            values.len(),
            input.nnodes,
            "input length must match the input layer's node count"
        );
        input.outputs.copy_from_slice(values);

        let n = self.layers.len();
        for i in 1..n {
            let (before, rest) = self.layers.split_at_mut(i);
            let prev = &before[i - 1];
            let layer = &mut rest[0];
            match layer.kind {
                LayerKind::Full => feed_forward_full(prev, layer, i == n - 1),
                LayerKind::Conv { .. } => feed_forward_conv(prev, layer),
                LayerKind::Input => unreachable!("input layer cannot follow another layer"),
            }
        }
    }

    /// Copy a layer's current outputs into caller-provided storage.
    pub fn get_outputs(&self, lid: usize, out: &mut [f64]) {
        let layer = &self.layers[lid];
        assert_eq!(
            out.len(),
            layer.nnodes,
            "output buffer length must match the layer's node count"
        );
        out.copy_from_slice(&layer.outputs);
    }

    /// Get the mean squared error over a layer's error buffer.
    ///
    /// Only meaningful immediately after `learn_outputs`.
    pub fn error_total(&self, lid: usize) -> f64 {
        let layer = &self.layers[lid];
        let total: f64 = layer.errors.iter().map(|e| e * e).sum();
        total / layer.nnodes as f64
    }

    /// Run the backward pass from the output layer with the given targets,
    /// accumulating gradient sums into every trainable layer's update buffers.
    ///
    /// The output layer's error is `output - target`. Error buffers are
    /// rebuilt from scratch on every call; update buffers are added to, so
    /// deferring `update` across several calls accumulates a minibatch.
    pub fn learn_outputs(&mut self, targets: &[f64]) {
        let n = self.layers.len();
        assert!(n > 1, "cannot learn on a chain with no trainable layers");

        let output = &mut self.layers[n - 1];
        assert_eq!(
            targets.len(),
            output.nnodes,
            "target length must match the output layer's node count"
        );
        for i in 0..output.nnodes {
            output.errors[i] = output.outputs[i] - targets[i];
        }

        for i in (1..n).rev() {
            let (before, rest) = self.layers.split_at_mut(i);
            let prev = &mut before[i - 1];
            let layer = &mut rest[0];

            // The predecessor's error is rebuilt fresh on every pass.
            prev.errors.fill(0.0);

            match layer.kind {
                LayerKind::Full => feed_back_full(prev, layer),
                LayerKind::Conv { .. } => feed_back_conv(prev, layer),
                LayerKind::Input => unreachable!("input layer cannot follow another layer"),
            }
        }
    }

    /// Apply the accumulated gradient sums to every trainable layer's
    /// parameters (`parameter -= rate * sum`) and reset the accumulators.
    ///
    /// Accumulators are sums over backward passes, not means; minibatch
    /// callers should divide the rate by the batch size.
    pub fn update(&mut self, rate: f64) {
        for layer in self.layers.iter_mut().rev() {
            for (bias, u) in layer.biases.iter_mut().zip(layer.bias_updates.iter_mut()) {
                *bias -= rate * *u;
                *u = 0.0;
            }
            for (weight, u) in layer.weights.iter_mut().zip(layer.weight_updates.iter_mut()) {
                *weight -= rate * *u;
                *u = 0.0;
            }
        }
    }

    /// Write a human-readable dump of every layer to `w`.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (lid, layer) in self.layers.iter().enumerate() {
            if lid == 0 {
                writeln!(
                    w,
                    "Layer{} shape=({},{},{}), nodes={}",
                    lid, layer.depth, layer.width, layer.height, layer.nnodes
                )?;
            } else {
                writeln!(
                    w,
                    "Layer{} (prev=Layer{}) shape=({},{},{}), nodes={}",
                    lid,
                    lid - 1,
                    layer.depth,
                    layer.width,
                    layer.height,
                    layer.nnodes
                )?;
            }

            let mut i = 0;
            for z in 0..layer.depth {
                writeln!(w, "  {}:", z)?;
                for _y in 0..layer.height {
                    write!(w, "    [")?;
                    for _x in 0..layer.width {
                        write!(w, " {:.4}", layer.outputs[i])?;
                        i += 1;
                    }
                    writeln!(w, "]")?;
                }
            }

            match layer.kind {
                LayerKind::Input => {}
                LayerKind::Full => {
                    write!(w, "  biases = [")?;
                    for bias in &layer.biases {
                        write!(w, " {:.4}", bias)?;
                    }
                    writeln!(w, "]")?;
                    writeln!(w, "  weights = [")?;
                    let prev_nodes = layer.weights.len() / layer.nnodes;
                    for row in layer.weights.chunks(prev_nodes) {
                        write!(w, "    [")?;
                        for weight in row {
                            write!(w, " {:.4}", weight)?;
                        }
                        writeln!(w, "]")?;
                    }
                    writeln!(w, "  ]")?;
                }
                LayerKind::Conv {
                    kernel_size,
                    padding,
                    stride,
                } => {
                    writeln!(
                        w,
                        "  kernel={}, padding={}, stride={}",
                        kernel_size, padding, stride
                    )?;
                    let per_slice = layer.weights.len() / layer.depth;
                    for (z, kernels) in layer.weights.chunks(per_slice).enumerate() {
                        write!(w, "  {}: bias={:.4}, weights = [", z, layer.biases[z])?;
                        for weight in kernels {
                            write!(w, " {:.4}", weight)?;
                        }
                        writeln!(w, "]")?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Forward pass for a fully-connected layer.
///
/// Computes `bias[i] + weights[i] . prev.outputs` per node, then activates:
/// softmax for the output layer (with all gradients conventionally set to 1,
/// pairing with the `output - target` error for a cross-entropy-style step),
/// tanh everywhere else.
fn feed_forward_full(prev: &Layer, layer: &mut Layer, is_output: bool) {
    let mut k = 0;
    for i in 0..layer.nnodes {
        let mut x = layer.biases[i];
        for j in 0..prev.nnodes {
            x += prev.outputs[j] * layer.weights[k];
            k += 1;
        }
        layer.outputs[i] = x;
    }

    if is_output {
        softmax_inplace(&mut layer.outputs);
        // Deliberate: the softmax/cross-entropy pairing folds the activation
        // derivative into the error term, so the local gradient stays 1.
        layer.gradients.fill(1.0);
    } else {
        for i in 0..layer.nnodes {
            let y = layer.outputs[i].tanh();
            layer.outputs[i] = y;
            layer.gradients[i] = tanh_derivative(y);
        }
    }
}

/// Backward pass for a fully-connected layer.
///
/// For each node, `dnet = error * gradient`; propagates `weight * dnet` into
/// the predecessor's errors and accumulates `dnet * prev_output` /
/// `dnet` into the weight/bias update buffers.
fn feed_back_full(prev: &mut Layer, layer: &mut Layer) {
    let mut k = 0;
    for i in 0..layer.nnodes {
        let dnet = layer.errors[i] * layer.gradients[i];
        for j in 0..prev.nnodes {
            prev.errors[j] += layer.weights[k] * dnet;
            layer.weight_updates[k] += dnet * prev.outputs[j];
            k += 1;
        }
        layer.bias_updates[i] += dnet;
    }
}

/// Forward pass for a convolutional layer.
///
/// For each output position (z1, y1, x1), sums the kernel taps over every
/// input depth slice. Source coordinates start at `stride * out - padding`;
/// taps that fall outside the input are skipped, which is exactly the
/// zero-padding contribution. Activates with ReLU.
fn feed_forward_conv(prev: &Layer, layer: &mut Layer) {
    let LayerKind::Conv {
        kernel_size,
        padding,
        stride,
    } = layer.kind
    else {
        unreachable!("feed_forward_conv on a non-conv layer");
    };

    let mut i = 0;
    for z1 in 0..layer.depth {
        let qbase = z1 * prev.depth * kernel_size * kernel_size;
        for y1 in 0..layer.height {
            let y0 = (stride * y1) as isize - padding as isize;
            for x1 in 0..layer.width {
                let x0 = (stride * x1) as isize - padding as isize;

                let mut v = layer.biases[z1];
                for z0 in 0..prev.depth {
                    let pbase = z0 * prev.width * prev.height;
                    let kbase = qbase + z0 * kernel_size * kernel_size;
                    for dy in 0..kernel_size {
                        let y = y0 + dy as isize;
                        if 0 <= y && y < prev.height as isize {
                            let p = pbase + y as usize * prev.width;
                            let q = kbase + dy * kernel_size;
                            for dx in 0..kernel_size {
                                let x = x0 + dx as isize;
                                if 0 <= x && x < prev.width as isize {
                                    v += prev.outputs[p + x as usize] * layer.weights[q + dx];
                                }
                            }
                        }
                    }
                }

                let y = relu(v);
                layer.outputs[i] = y;
                layer.gradients[i] = relu_derivative(y);
                i += 1;
            }
        }
    }
    debug_assert_eq!(i, layer.nnodes);
}

/// Backward pass for a convolutional layer.
///
/// Mirrors the forward index mapping exactly: only taps with valid source
/// coordinates contribute, both to the error propagated into the predecessor
/// and to the weight-gradient accumulation.
fn feed_back_conv(prev: &mut Layer, layer: &mut Layer) {
    let LayerKind::Conv {
        kernel_size,
        padding,
        stride,
    } = layer.kind
    else {
        unreachable!("feed_back_conv on a non-conv layer");
    };

    let mut i = 0;
    for z1 in 0..layer.depth {
        let qbase = z1 * prev.depth * kernel_size * kernel_size;
        for y1 in 0..layer.height {
            let y0 = (stride * y1) as isize - padding as isize;
            for x1 in 0..layer.width {
                let x0 = (stride * x1) as isize - padding as isize;

                let dnet = layer.errors[i] * layer.gradients[i];
                for z0 in 0..prev.depth {
                    let pbase = z0 * prev.width * prev.height;
                    let kbase = qbase + z0 * kernel_size * kernel_size;
                    for dy in 0..kernel_size {
                        let y = y0 + dy as isize;
                        if 0 <= y && y < prev.height as isize {
                            let p = pbase + y as usize * prev.width;
                            let q = kbase + dy * kernel_size;
                            for dx in 0..kernel_size {
                                let x = x0 + dx as isize;
                                if 0 <= x && x < prev.width as isize {
                                    prev.errors[p + x as usize] += layer.weights[q + dx] * dnet;
                                    layer.weight_updates[q + dx] +=
                                        dnet * prev.outputs[p + x as usize];
                                }
                            }
                        }
                    }
                }
                layer.bias_updates[z1] += dnet;
                i += 1;
            }
        }
    }
    debug_assert_eq!(i, layer.nnodes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_layer_shapes_and_counts() {
        let mut rng = SimpleRng::new(42);
        let mut net = Network::with_input(1, 2, 2);
        let lid = net.add_full(3, 0.1, &mut rng);

        assert_eq!(lid, 1);
        assert_eq!(net.num_layers(), 2);
        assert_eq!(net.output_id(), 1);

        let layer = net.layer(lid);
        assert_eq!(layer.shape(), (3, 1, 1));
        assert_eq!(layer.nnodes(), 3);
        assert_eq!(layer.weights().len(), 3 * 4);
        assert_eq!(layer.biases().len(), 3);
        assert_eq!(layer.parameter_count(), 12 + 3);
    }

    #[test]
    fn test_conv_layer_weight_count() {
        let mut rng = SimpleRng::new(42);
        let mut net = Network::with_input(3, 8, 8);
        let lid = net.add_conv(4, 8, 8, 3, 1, 1, 0.1, &mut rng);

        let layer = net.layer(lid);
        // One 3x3 kernel per (output depth, input depth) pair.
        assert_eq!(layer.weights().len(), 4 * 3 * 3 * 3);
        assert_eq!(layer.biases().len(), 4);
        assert_eq!(layer.kind(), LayerKind::Conv { kernel_size: 3, padding: 1, stride: 1 });
    }

    #[test]
    fn test_biases_start_at_zero_weights_scale_with_std() {
        let mut rng = SimpleRng::new(7);
        let mut net = Network::with_input(1, 1, 1);
        net.add_full(4, 0.0, &mut rng);
        let zeroed = net.layer(1);
        assert!(zeroed.weights().iter().all(|&w| w == 0.0));
        assert!(zeroed.biases().iter().all(|&b| b == 0.0));

        let mut rng = SimpleRng::new(7);
        let mut net = Network::with_input(1, 1, 1);
        net.add_full(4, 0.5, &mut rng);
        assert!(net.layer(1).weights().iter().any(|&w| w != 0.0));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let mut rng1 = SimpleRng::new(12345);
        let mut net1 = Network::with_input(1, 4, 4);
        net1.add_conv(2, 4, 4, 3, 1, 1, 0.1, &mut rng1);

        let mut rng2 = SimpleRng::new(12345);
        let mut net2 = Network::with_input(1, 4, 4);
        net2.add_conv(2, 4, 4, 3, 1, 1, 0.1, &mut rng2);

        assert_eq!(net1.layer(1).weights(), net2.layer(1).weights());
    }

    #[test]
    #[should_panic(expected = "kernel size must be odd")]
    fn test_conv_even_kernel_rejected() {
        let mut rng = SimpleRng::new(42);
        let mut net = Network::with_input(1, 8, 8);
        net.add_conv(1, 7, 7, 2, 0, 1, 0.1, &mut rng);
    }

    #[test]
    #[should_panic(expected = "does not fit predecessor width")]
    fn test_conv_oversized_output_rejected() {
        let mut rng = SimpleRng::new(42);
        // (8-1)*1 + 3 = 10 > 8 + 2*0
        let mut net = Network::with_input(1, 8, 8);
        net.add_conv(1, 8, 8, 3, 0, 1, 0.1, &mut rng);
    }

    #[test]
    #[should_panic(expected = "input length must match")]
    fn test_set_inputs_length_mismatch() {
        let mut net = Network::with_input(1, 2, 2);
        net.set_inputs(&[1.0, 2.0]);
    }

    #[test]
    fn test_full_forward_known_values() {
        let mut rng = SimpleRng::new(1);
        let mut net = Network::with_input(1, 1, 2);
        net.add_full(2, 0.0, &mut rng);
        net.add_full(2, 0.0, &mut rng);

        // Hidden weights [[1, 0], [0, -1]], output weights zero.
        net.layers[1].weights.copy_from_slice(&[1.0, 0.0, 0.0, -1.0]);

        net.set_inputs(&[0.5, 0.25]);

        let hidden = net.layer(1).outputs();
        assert!((hidden[0] - 0.5f64.tanh()).abs() < 1e-12);
        assert!((hidden[1] - (-0.25f64).tanh()).abs() < 1e-12);

        // Output layer: zero logits -> uniform softmax.
        let out = net.layer(2).outputs();
        assert!((out[0] - 0.5).abs() < 1e-12);
        assert!((out[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_conv_boundary_single_pixel_influence() {
        let mut rng = SimpleRng::new(1);
        let mut net = Network::with_input(1, 3, 3);
        net.add_conv(1, 3, 3, 3, 1, 1, 0.0, &mut rng);

        // All-ones kernel: each output counts the live taps in its window.
        for w in net.layers[1].weights.iter_mut() {
            *w = 1.0;
        }

        let mut input = vec![0.0; 9];
        input[0] = 1.0; // pixel at (x=0, y=0)
        net.set_inputs(&input);

        // With padding=1, the window of output (x1,y1) covers inputs
        // [x1-1, x1+1] x [y1-1, y1+1]; only the four corner-adjacent outputs
        // see (0,0).
        let out = net.layer(1).outputs();
        for y1 in 0..3 {
            for x1 in 0..3 {
                let expected = if x1 <= 1 && y1 <= 1 { 1.0 } else { 0.0 };
                assert_eq!(out[y1 * 3 + x1], expected, "output ({},{})", x1, y1);
            }
        }
    }

    #[test]
    fn test_conv_stride_two_indexing() {
        let mut rng = SimpleRng::new(1);
        let mut net = Network::with_input(1, 4, 4);
        net.add_conv(1, 2, 2, 3, 1, 2, 0.0, &mut rng);

        // Center-tap-only kernel: output (x1,y1) = input(2*x1, 2*y1).
        net.layers[1].weights[4] = 1.0;

        let input: Vec<f64> = (0..16).map(|v| v as f64).collect();
        net.set_inputs(&input);

        let out = net.layer(1).outputs();
        assert_eq!(out, &[0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn test_gradient_check_full_chain() {
        // Finite-difference check of the accumulated gradients against the
        // cross-entropy loss -sum(t * ln(y)), which the softmax output
        // pairing differentiates exactly.
        let mut rng = SimpleRng::new(99);
        let mut net = Network::with_input(1, 2, 2);
        net.add_conv(2, 2, 2, 3, 1, 1, 0.3, &mut rng);
        net.add_full(4, 0.3, &mut rng);
        net.add_full(3, 0.3, &mut rng);

        let input = [0.2, -0.4, 0.7, 0.1];
        let target = [0.0, 1.0, 0.0];

        net.set_inputs(&input);
        net.learn_outputs(&target);

        let loss = |net: &mut Network| -> f64 {
            net.set_inputs(&input);
            let out = net.layer(3).outputs();
            -(target[0] * out[0].ln() + target[1] * out[1].ln() + target[2] * out[2].ln())
        };

        let eps = 1e-6;
        for lid in 1..net.num_layers() {
            for wi in 0..net.layer(lid).weights().len() {
                let analytic = net.layer(lid).weight_updates()[wi];

                let orig = net.layers[lid].weights[wi];
                net.layers[lid].weights[wi] = orig + eps;
                let loss_hi = loss(&mut net);
                net.layers[lid].weights[wi] = orig - eps;
                let loss_lo = loss(&mut net);
                net.layers[lid].weights[wi] = orig;

                let numeric = (loss_hi - loss_lo) / (2.0 * eps);
                assert!(
                    (analytic - numeric).abs() < 1e-4,
                    "layer {} weight {}: analytic {} vs numeric {}",
                    lid,
                    wi,
                    analytic,
                    numeric
                );
            }
            for bi in 0..net.layer(lid).biases().len() {
                let analytic = net.layer(lid).bias_updates()[bi];

                let orig = net.layers[lid].biases[bi];
                net.layers[lid].biases[bi] = orig + eps;
                let loss_hi = loss(&mut net);
                net.layers[lid].biases[bi] = orig - eps;
                let loss_lo = loss(&mut net);
                net.layers[lid].biases[bi] = orig;

                let numeric = (loss_hi - loss_lo) / (2.0 * eps);
                assert!(
                    (analytic - numeric).abs() < 1e-4,
                    "layer {} bias {}: analytic {} vs numeric {}",
                    lid,
                    bi,
                    analytic,
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_dump_writes_every_layer() {
        let mut rng = SimpleRng::new(3);
        let mut net = Network::with_input(1, 2, 2);
        net.add_conv(1, 2, 2, 3, 1, 1, 0.1, &mut rng);
        net.add_full(2, 0.1, &mut rng);

        let mut buf = Vec::new();
        net.dump(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Layer0 shape=(1,2,2), nodes=4"));
        assert!(text.contains("Layer1 (prev=Layer0)"));
        assert!(text.contains("kernel=3, padding=1, stride=1"));
        assert!(text.contains("Layer2 (prev=Layer1)"));
        assert!(text.contains("biases = ["));
    }
}
