//! Arithmetic Tools
//!
//! `add`, `multiply` and `divide` exposed to the model.

use async_trait::async_trait;
use serde_json::json;

use agent_core::{
    ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::ops::{Operands, Operation};

/// Tool applying one binary [`Operation`] to `a` and `b`
#[derive(Clone, Copy, Debug)]
pub struct ArithmeticTool {
    op: Operation,
}

impl ArithmeticTool {
    #[must_use]
    pub const fn new(op: Operation) -> Self {
        Self { op }
    }

    #[must_use]
    pub const fn add() -> Self {
        Self::new(Operation::Add)
    }

    #[must_use]
    pub const fn multiply() -> Self {
        Self::new(Operation::Multiply)
    }

    #[must_use]
    pub const fn divide() -> Self {
        Self::new(Operation::Divide)
    }
}

#[async_trait]
impl Tool for ArithmeticTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.op.name().into(),
            description: self.op.description().into(),
            parameters: vec![
                ParameterSchema::number("a", "First number"),
                ParameterSchema::number("b", "Second number"),
            ],
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let operands: Operands = call.parse_arguments()?;
        let value = self.op.apply(operands)?;

        tracing::debug!(op = self.op.name(), a = operands.a, b = operands.b, value, "Computed");

        Ok(ToolResult::success(self.op.name(), value.to_string()).with_data(json!(value)))
    }
}
