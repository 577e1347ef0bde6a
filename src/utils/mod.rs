//! Shared utilities for the network engine
//!
//! This module provides common utilities like random number generation
//! and activation functions used by the layer chain and the drivers.

pub mod activations;
pub mod rng;

pub use rng::SimpleRng;
