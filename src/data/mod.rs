//! Data layer: core tabular types and file loading.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Table (typed columns)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ DatasetStore  │  raw + corrected Table per uploaded file
//!   └──────────────┘
//! ```

pub mod loader;
pub mod model;
