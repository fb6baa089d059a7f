use thiserror::Error;

/// Internal contract violations. These abort a pass outright; user-facing
/// rule violations travel as `Diagnostic` values instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("malformed syntax tree: {0}")]
    MalformedTree(String),

    #[error("failed to decode AST JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
