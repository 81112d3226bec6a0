//! Resolve which environment a pipeline run deploys to, and where that environment lives.
//!
//! A run is described by a [trigger::TriggerContext]. It is matched against a
//! [profile::ProfileTable] loaded once from configuration, and the infrastructure
//! coordinates of the selected environment are read through a [secrets::SecretLookup].
//! The outcome is a single immutable [resolver::ResolutionResult] for every later step.

pub mod audit;
pub mod auth;
pub mod config;
pub mod keyvault;
pub mod output;
pub mod pattern;
pub mod profile;
pub mod resolver;
pub mod secrets;
pub mod trigger;
