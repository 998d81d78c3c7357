// src/lib.rs

//! Handle availability checker library

pub mod auth;
pub mod error;
pub mod handler;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
