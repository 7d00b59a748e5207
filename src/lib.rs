//! # Zoro Lite Library
//!
//! Admin service for registering provider credentials, listing and revoking
//! them, and dispatching source calls to local handlers or a companion
//! backend.

pub mod action_token;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notices;
pub mod registration;
pub mod repositories;
pub mod server;
pub mod sources;
pub mod telemetry;
pub use migration;
