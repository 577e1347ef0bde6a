// mnist_cnn.rs
// Trains the layer chain engine on MNIST with plain single-sample SGD and
// minibatch gradient accumulation.
//
// Usage:
//   mnist_cnn train-images train-labels test-images test-labels
//
// The chain topology comes from config/architectures/mnist_cnn.json and the
// hyperparameters from config/training/mnist_cnn.json.
//
// Output:
//   - logs/training_loss_cnn.txt (samples,error)
//   - prints test accuracy

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::process;
use std::time::Instant;

use chainnet::architecture::{build_network, load_architecture};
use chainnet::config::load_config;
use chainnet::mnist::IdxFile;
use chainnet::network::Network;
use chainnet::utils::SimpleRng;

const ARCHITECTURE_PATH: &str = "config/architectures/mnist_cnn.json";
const TRAINING_PATH: &str = "config/training/mnist_cnn.json";

fn load_idx(path: &str) -> IdxFile {
    IdxFile::open(path).unwrap_or_else(|err| {
        eprintln!("Could not read {}: {}", path, err);
        process::exit(1);
    })
}

// Index of the largest output (the predicted class).
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (j, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = j;
        }
    }
    best
}

fn test_accuracy(net: &mut Network, images: &IdxFile, labels: &IdxFile) -> f64 {
    let ntests = images.num_records();
    let mut inputs = vec![0.0f64; net.layer(0).nnodes()];
    let mut outputs = vec![0.0f64; net.layer(net.output_id()).nnodes()];

    let mut ncorrect = 0usize;
    for i in 0..ntests {
        images.record_normalized(i, &mut inputs);
        net.set_inputs(&inputs);
        net.get_outputs(net.output_id(), &mut outputs);
        if argmax(&outputs) == labels.label(i) as usize {
            ncorrect += 1;
        }
    }

    100.0 * ncorrect as f64 / ntests as f64
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "usage: {} train-images train-labels test-images test-labels",
            args[0]
        );
        process::exit(100);
    }

    let arch = load_architecture(ARCHITECTURE_PATH).unwrap_or_else(|err| {
        eprintln!("Could not load {}: {}", ARCHITECTURE_PATH, err);
        process::exit(1);
    });
    let config = load_config(TRAINING_PATH).unwrap_or_else(|err| {
        eprintln!("Could not load {}: {}", TRAINING_PATH, err);
        process::exit(1);
    });

    // Fixed seed so runs reproduce; the RNG drives both the weight
    // initialization and the sample selection below.
    let mut rng = SimpleRng::new(config.seed.unwrap_or(0));
    let mut net = build_network(&arch, &mut rng).unwrap_or_else(|err| {
        eprintln!("Could not build network: {}", err);
        process::exit(1);
    });

    println!("Loading MNIST...");
    let images_train = load_idx(&args[1]);
    let labels_train = load_idx(&args[2]);

    let num_inputs = net.layer(0).nnodes();
    let num_outputs = net.layer(net.output_id()).nnodes();
    if images_train.record_len() != num_inputs {
        eprintln!(
            "Image size {} does not match the input layer ({} nodes)",
            images_train.record_len(),
            num_inputs
        );
        process::exit(1);
    }

    let train_size = images_train.num_records();
    println!(
        "Training: samples={} epochs={} batch={} rate={}",
        train_size, config.epochs, config.batch_size, config.learning_rate
    );

    fs::create_dir_all("./logs").ok();
    let log_file = File::create("./logs/training_loss_cnn.txt").unwrap_or_else(|_| {
        eprintln!("Could not create logs/training_loss_cnn.txt");
        process::exit(1);
    });
    let mut log = BufWriter::new(log_file);

    let mut inputs = vec![0.0f64; num_inputs];
    let mut targets = vec![0.0f64; num_outputs];

    let start_time = Instant::now();
    let mut etotal = 0.0f64;

    for i in 0..config.epochs * train_size {
        // Pick a random sample from the training data.
        let index = rng.gen_usize(train_size);
        images_train.record_normalized(index, &mut inputs);
        net.set_inputs(&inputs);

        let label = labels_train.label(index) as usize;
        for (j, target) in targets.iter_mut().enumerate() {
            *target = if j == label { 1.0 } else { 0.0 };
        }
        net.learn_outputs(&targets);
        etotal += net.error_total(net.output_id());

        if i % config.batch_size == 0 {
            // Minibatch: the accumulators hold sums, so scale the rate down.
            net.update(config.learning_rate / config.batch_size as f64);
        }
        if i % 1000 == 0 {
            eprintln!("i={}, error={:.4}", i, etotal / 1000.0);
            writeln!(log, "{},{}", i, etotal / 1000.0).ok();
            etotal = 0.0;
        }
    }

    let secs = start_time.elapsed().as_secs_f64();
    println!("Training finished in {:.1}s", secs);

    println!("Testing...");
    let images_test = load_idx(&args[3]);
    let labels_test = load_idx(&args[4]);
    let acc = test_accuracy(&mut net, &images_test, &labels_test);
    println!("Test Accuracy: {:.2}%", acc);
}
