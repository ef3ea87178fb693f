//! Drives a run across every stream leg until it completes.

use futures::StreamExt;
use tracing::debug;

use super::actions::ToolActionResolver;
use super::controller::RunTicket;
use super::dispatcher::{DispatchOutcome, RunEventDispatcher};
use crate::error::Result;
use crate::stream::RunEventStream;
use crate::types::Run;

/// How one stream leg ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LegOutcome {
    /// A completed frame arrived, or the server closed the stream.
    Completed,
    RequiresAction(Run),
}

/// Apply frames from `stream` until the leg ends. Dropping the stream on
/// cancellation closes the underlying connection.
pub async fn drive_leg(
    mut stream: RunEventStream,
    dispatcher: &mut RunEventDispatcher<'_>,
    ticket: &RunTicket,
) -> Result<LegOutcome> {
    loop {
        let Some(frame) = ticket.guard(async { Ok(stream.next().await) }).await? else {
            debug!("run stream closed");
            return Ok(LegOutcome::Completed);
        };
        match dispatcher.apply(frame?)? {
            DispatchOutcome::Continue => {}
            DispatchOutcome::Completed => return Ok(LegOutcome::Completed),
            DispatchOutcome::RequiresAction(run) => return Ok(LegOutcome::RequiresAction(run)),
        }
    }
}

/// Run legs back to back: each required action is resolved only after the
/// previous leg has fully ended.
pub async fn run_to_completion(
    thread_id: &str,
    first: RunEventStream,
    dispatcher: &mut RunEventDispatcher<'_>,
    resolver: &mut ToolActionResolver<'_>,
    ticket: &RunTicket,
) -> Result<()> {
    let mut stream = first;
    loop {
        match drive_leg(stream, dispatcher, ticket).await? {
            LegOutcome::Completed => return Ok(()),
            LegOutcome::RequiresAction(run) => {
                stream = resolver.resume(thread_id, run).await?;
            }
        }
    }
}
