//! # Repository Layer
//!
//! This module contains repository implementations that encapsulate SeaORM operations
//! for database entities.

pub mod provider;

pub use provider::{NewProvider, ProviderFilter, ProviderRepository};
