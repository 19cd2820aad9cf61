//! Library exports for the chirpy service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod route;
pub mod state;
pub mod validation;
