//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool` for the arithmetic agent.

mod arithmetic;

pub use arithmetic::ArithmeticTool;
