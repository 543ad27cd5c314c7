use thiserror::Error;

/// Error taxonomy of the analysis engine.
///
/// Every variant is local and recoverable: an action that fails leaves
/// shared state exactly as it was, and the `Display` text doubles as the
/// status message shown to the user.
#[derive(Debug, Error)]
pub enum NoseError {
    // -- Ingestion --
    #[error("Could not parse '{file}': {reason}")]
    ParseFailure { file: String, reason: String },

    #[error("A dataset named '{name}' is already loaded")]
    DuplicateName { name: String },

    #[error("No dataset named '{name}'")]
    UnknownDataset { name: String },

    #[error("No active dataset; upload and select a file first")]
    NoActiveDataset,

    // -- Calibration --
    #[error("Invalid baseline window {start}..{end} for {rows} rows (need 0 <= start < end <= rows)")]
    InvalidRange {
        start: usize,
        end: usize,
        rows: usize,
    },

    #[error("Linear baseline fit needs at least {needed} in-range points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },

    // -- Labeling --
    #[error("Index {index} is already in the current selection")]
    DuplicateIndex { index: usize },

    #[error("No points selected; click points on the time series first")]
    EmptySelection,

    #[error("Label name must not be empty")]
    EmptyLabel,

    // -- Projection --
    #[error("Labeled samples have inconsistent dimensions: expected {expected} features, found {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("A {dims}D projection needs at least {dims} labeled samples, got {got}")]
    InsufficientSamples { dims: usize, got: usize },

    #[error("No projection available; generate one first")]
    NoProjection,

    // -- Classification --
    #[error("Decision boundary needs at least 2 distinct labels, got {got}")]
    TooFewClasses { got: usize },

    #[error("Invalid classifier parameters: {reason}")]
    InvalidKernelParams { reason: String },

    #[error("Classifier training failed: {reason}")]
    TrainingFailed { reason: String },

    // -- Export --
    #[error("Export failed: {0}")]
    ExportFailed(#[from] csv::Error),

    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NoseError>;
