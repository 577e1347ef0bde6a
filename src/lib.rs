//! chainnet
//!
//! A minimal trainable feed-forward network engine. Networks are strictly
//! linear chains of input, fully-connected, and convolutional layers, trained
//! by stochastic gradient descent with optional minibatch gradient
//! accumulation.
//!
//! # Modules
//!
//! - `network`: the layer chain and its forward/backward/update passes
//! - `architecture`: chain construction from JSON configuration
//! - `config`: training hyperparameters from JSON configuration
//! - `mnist`: IDX dataset file reading
//! - `utils`: shared utilities (RNG, activation functions)

pub mod architecture;
pub mod config;
pub mod mnist;
pub mod network;
pub mod utils;
