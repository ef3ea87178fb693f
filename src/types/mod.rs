//! Core data model: threads, messages, runs, plans.

pub mod assistant;
pub mod message;
pub mod plan;
pub mod run;
pub mod thread;

pub use assistant::*;
pub use message::*;
pub use plan::*;
pub use run::*;
pub use thread::*;
