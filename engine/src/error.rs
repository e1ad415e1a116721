//! Error taxonomy for the enumeration pipeline.
//!
//! Only configuration errors and cancellation are meant to surface to the
//! caller of `PipelineRuntime::run`; resolver, graph and data-source failures
//! are logged and degraded to an empty/no-op result so the run keeps making
//! forward progress.

/// Result alias using the crate's `EngineError` as the error type.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug)]
pub struct ConfigErrorStruct {
    msg: String,
}

#[derive(Debug)]
pub struct ResolverErrorStruct {
    msg: String,
}

#[derive(Debug)]
pub struct GraphErrorStruct {
    msg: String,
}

/// Unified error type for the enumeration engine.
#[derive(Debug)]
pub enum EngineError {
    /// Configuration failed validation; fatal, refuse to start.
    Config(ConfigErrorStruct),
    /// A resolver call failed. Carried for logging only; never propagated
    /// out of the pipeline.
    Resolver(ResolverErrorStruct),
    /// A graph upsert failed. Carried for logging only; the item is
    /// considered lost.
    Graph(GraphErrorStruct),
    /// The run's context was cancelled.
    Cancelled,
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(ConfigErrorStruct { msg: msg.into() })
    }

    pub fn resolver(msg: impl Into<String>) -> Self {
        EngineError::Resolver(ResolverErrorStruct { msg: msg.into() })
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        EngineError::Graph(GraphErrorStruct { msg: msg.into() })
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Config(e) => write!(f, "Configuration Error: {}", e.msg),
            EngineError::Resolver(e) => write!(f, "Resolver Error: {}", e.msg),
            EngineError::Graph(e) => write!(f, "Graph Error: {}", e.msg),
            EngineError::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<hickory_resolver::ResolveError> for EngineError {
    fn from(value: hickory_resolver::ResolveError) -> Self {
        EngineError::resolver(value.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(value: reqwest::Error) -> Self {
        EngineError::resolver(format!("data source request failed: {value}"))
    }
}
