// src/lib.rs

//! SAT Technical Bulletin Monitor Library

pub mod deploy;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
