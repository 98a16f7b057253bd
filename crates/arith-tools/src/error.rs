//! Error Types for Arithmetic Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArithError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} overflowed")]
    Overflow(&'static str),
}

impl From<ArithError> for AgentError {
    fn from(err: ArithError) -> Self {
        Self::ToolExecution(err.to_string())
    }
}
