//! Directional light shadow fitting.

mod fit;

pub use fit::{bias_matrix, fit_directional_shadow, ShadowFit};
