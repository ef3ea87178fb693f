//! Run loop: controller state machine, frame dispatch, required actions
//! and the approval rendezvous.

pub mod actions;
pub mod approvals;
pub mod controller;
pub mod dispatcher;
pub mod runner;

pub use actions::ToolActionResolver;
pub use approvals::{ApprovalDecision, ApprovalGate, ToolApproval};
pub use controller::{ControllerState, ControllerStatus, RunController, RunTicket};
pub use dispatcher::{DispatchOutcome, RunEventDispatcher};
pub use runner::{drive_leg, run_to_completion, LegOutcome};
