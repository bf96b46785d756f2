//! Processing kernels behind the built-in stages.
//!
//! The signal path routes audio through these; it does not tune them
//! per-sample. Everything here is allocation-free once constructed.
//!
//! - [`Biquad`] / [`Coefficients`] - RBJ cookbook second-order sections
//! - [`DynamicsKernel`] - feed-forward peak limiter/compressor

pub mod biquad;
pub mod dynamics;

pub use biquad::{Biquad, Coefficients, bandwidth_to_q};
pub use dynamics::DynamicsKernel;
