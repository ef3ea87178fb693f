//! Event stream client: opens a streaming POST and yields typed frames.

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::RequestBuilder;
use reqwest_eventsource::{retry::Never, Error as EventSourceError, Event, EventSource};
use tracing::debug;

use super::events::RunStreamEvent;
use crate::api::http::status_to_error;
use crate::error::{Result, ThreadRunError};

/// Stream of decoded frames for one leg of a run.
pub type RunEventStream = BoxStream<'static, Result<RunStreamEvent>>;

/// Open a run stream from a prepared request.
///
/// The connection is never retried: a dropped stream ends the leg and the
/// caller decides what to do. A non-2xx status or a content type other than
/// `text/event-stream` yields a single error before any frame. The stream
/// has no idle timeout.
pub fn open_event_stream(request: RequestBuilder) -> Result<RunEventStream> {
    let mut source = EventSource::new(request).map_err(|e| {
        ThreadRunError::Configuration(format!("run stream request is not replayable: {e}"))
    })?;
    source.set_retry_policy(Box::new(Never));

    let stream = async_stream::stream! {
        while let Some(item) = source.next().await {
            match item {
                Ok(Event::Open) => {
                    debug!("run stream opened");
                }
                Ok(Event::Message(message)) => {
                    match RunStreamEvent::decode(&message.event, &message.data) {
                        Ok(event) => yield Ok(event),
                        Err(err) => {
                            yield Err(err);
                            break;
                        }
                    }
                }
                Err(EventSourceError::StreamEnded) => break,
                Err(err) => {
                    yield Err(map_stream_error(err).await);
                    break;
                }
            }
        }
        source.close();
    };

    Ok(Box::pin(stream))
}

async fn map_stream_error(err: EventSourceError) -> ThreadRunError {
    match err {
        EventSourceError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            status_to_error(status.as_u16(), &body)
        }
        EventSourceError::InvalidContentType(content_type, _) => ThreadRunError::Stream(format!(
            "expected text/event-stream, got {}",
            content_type.to_str().unwrap_or("<non-ascii>")
        )),
        EventSourceError::Transport(e) => ThreadRunError::Network(e),
        other => ThreadRunError::Stream(other.to_string()),
    }
}
