//! Pure arithmetic behind the tools.
//!
//! Results are always finite: JSON has no representation for infinities or
//! NaN, so those surface as errors instead.

use serde::{Deserialize, Serialize};

use crate::error::{ArithError, Result};

/// The two operands every arithmetic tool takes
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operands {
    pub a: f64,
    pub b: f64,
}

/// Supported binary operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Multiply,
    Divide,
}

impl Operation {
    /// All operations, in the order they are offered to the model
    pub const ALL: [Self; 3] = [Self::Add, Self::Multiply, Self::Divide];

    /// Tool name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Add => "Add two numbers",
            Self::Multiply => "Multiply two numbers",
            Self::Divide => "Divide two numbers",
        }
    }

    pub fn apply(self, operands: Operands) -> Result<f64> {
        let Operands { a, b } = operands;
        match self {
            Self::Add => add(a, b),
            Self::Multiply => multiply(a, b),
            Self::Divide => divide(a, b),
        }
    }
}

fn finite(value: f64, op: &'static str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArithError::Overflow(op))
    }
}

pub fn add(a: f64, b: f64) -> Result<f64> {
    finite(a + b, "add")
}

pub fn multiply(a: f64, b: f64) -> Result<f64> {
    finite(a * b, "multiply")
}

/// `a / b`; a zero divisor is an error rather than an infinity
pub fn divide(a: f64, b: f64) -> Result<f64> {
    if b == 0.0 {
        return Err(ArithError::DivisionByZero);
    }
    finite(a / b, "divide")
}
