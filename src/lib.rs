//! Sampling of arbitrary, possibly unnormalized densities.
//!
//! A [`distributions::DensityFunction`] declares which of its variables it can integrate in
//! closed form ([`integrator::AnalyticIntegrator`]) and which it can draw by inversion
//! ([`direct::DirectSampler`]). Everything else is generated by the adaptive cell sampler in
//! [`foam`]. [`selector::SamplerSelector`] picks between the two.

pub mod config;
pub mod core;
pub mod direct;
pub mod distributions;
pub mod error;
pub mod foam;
pub mod integrator;
pub mod johnson;
pub mod parameter;
pub mod selector;
pub mod stats;
