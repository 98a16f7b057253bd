//! # arith-tools
//!
//! The arithmetic toolset for the tool-calling agent: `add`, `multiply` and
//! `divide` over two JSON numbers, plus the system prompts that go with it.
//!
//! ```text
//! user: "Multiply 10 and 4."
//!   └─▶ assistant: multiply({"a":10,"b":4})
//!         └─▶ tool: 40
//!               └─▶ assistant: "10 multiplied by 4 is 40."
//! ```

pub mod error;
pub mod ops;
pub mod svckit;

pub use error::{ArithError, Result};
pub use ops::{Operands, Operation};

use agent_core::ToolRegistry;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::ArithmeticTool;
}

/// System prompt for the arithmetic agent
pub const ARITHMETIC_PROMPT: &str =
    "You are a helpful assistant tasked with performing arithmetic on a set of inputs.";

/// Same prompt, in Chinese
pub const ARITHMETIC_PROMPT_ZH: &str =
    "你是一名乐于助人的助手，任务是对一组输入数据进行算术运算。";

/// Language of the system prompt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromptLanguage {
    #[default]
    English,
    Chinese,
}

impl PromptLanguage {
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::English => ARITHMETIC_PROMPT,
            Self::Chinese => ARITHMETIC_PROMPT_ZH,
        }
    }
}

/// Registry holding `add`, `multiply` and `divide`, in that order
#[must_use]
pub fn arithmetic_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for op in Operation::ALL {
        registry.register(tools::ArithmeticTool::new(op));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AgentError, ToolCall};
    use serde_json::json;

    #[test]
    fn test_registry_contents() {
        let registry = arithmetic_registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["add", "multiply", "divide"]);
        assert!(registry.get("subtract").is_none());
    }

    #[tokio::test]
    async fn test_registry_execution() {
        let registry = arithmetic_registry();

        let call = ToolCall::new("add", json!({"a": 10, "b": 4})).with_id("c1");
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.output, "14");
        assert_eq!(result.id.as_deref(), Some("c1"));

        let missing = ToolCall::new("divide", json!({"a": 10}));
        let err = registry.execute(&missing).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
    }

    #[test]
    fn test_prompts() {
        assert_eq!(PromptLanguage::default().system_prompt(), ARITHMETIC_PROMPT);
        assert!(PromptLanguage::Chinese.system_prompt().contains("算术"));
    }
}
