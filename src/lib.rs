//! Electronic-nose time-series analysis engine.
//!
//! Pipeline: raw multi-channel recordings → per-channel baseline
//! calibration → user-labeled feature vectors → PCA projection →
//! optional SVM decision surface. All state is in-memory and
//! single-session; the `app` module exposes the action protocol a
//! presentation adapter drives.

pub mod analysis;
pub mod app;
pub mod calibrate;
pub mod color;
pub mod data;
pub mod error;
pub mod export;
pub mod labels;
pub mod state;

pub use error::{NoseError, Result};
