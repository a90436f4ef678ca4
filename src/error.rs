use crate::store::Namespace;
use thiserror::Error;

/// Errors produced while coordinating a distributed multiplication.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid run configuration (empty membership, zero chunk height, ...)
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Operand or partial result dimensions are incompatible
    #[error("shape mismatch in {context}: {message}")]
    ShapeMismatch {
        context: &'static str,
        message: String,
    },

    /// Assembly was handed a set of partial results with a gap or a duplicate
    #[error("partial result for ordinal {ordinal} is {problem} (expected {expected} partials)")]
    MissingPartial {
        ordinal: usize,
        expected: usize,
        problem: &'static str,
    },

    /// A required store entry did not become visible before the deadline
    #[error("{namespace}[{key}] not visible after {waited:.3} seconds")]
    NotReady {
        namespace: Namespace,
        key: usize,
        waited: f64,
    },

    /// The store (or another external collaborator) failed
    #[error("dependency failure during {operation}: {message}")]
    Dependency {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn shape(context: &'static str, message: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            context,
            message: message.into(),
        }
    }

    pub fn dependency(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Dependency {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn dependency_with_source<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Dependency {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// The protocol stage a node was in when its run aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RoleResolution,
    Dispatch,
    Computation,
    Assembly,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::RoleResolution => "role resolution",
            Stage::Dispatch => "dispatch",
            Stage::Computation => "computation",
            Stage::Assembly => "assembly",
        };
        write!(f, "{}", name)
    }
}

/// A fatal error tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl RunError {
    pub fn new(stage: Stage, source: Error) -> Self {
        RunError { stage, source }
    }
}

/// Attach a [Stage] to the error of a fallible step.
pub(crate) trait StageExt<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, RunError>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, RunError> {
        self.map_err(|e| RunError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_names_stage() {
        let err = RunError::new(Stage::Assembly, Error::shape("merge", "3 != 4"));
        assert_eq!(
            err.to_string(),
            "assembly failed: shape mismatch in merge: 3 != 4"
        );
    }

    #[test]
    fn not_ready_message() {
        let err = Error::NotReady {
            namespace: Namespace::ChunkTable,
            key: 3,
            waited: 1.5,
        };
        assert_eq!(err.to_string(), "chunk-table[3] not visible after 1.500 seconds");
    }
}
