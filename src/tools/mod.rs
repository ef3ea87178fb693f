//! Client functions and tool selection.

pub mod selection;
pub mod tool;

pub use selection::{select_tools, ToolSelection};
pub use tool::{ClientFunction, ClientFunctions, FunctionTool};
