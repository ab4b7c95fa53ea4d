//! Upstream adapters.

pub mod reference_rates;

pub use reference_rates::ReferenceRateClient;
