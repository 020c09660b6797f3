//! `/sse-endpoint` ticker.
//!
//! An independent periodic producer: each subscriber gets its own interval
//! and never touches the connection registry. The stream ends when the server
//! shuts down.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

use crate::server::AppState;

/// Current time as fractional Unix seconds.
#[allow(clippy::cast_precision_loss)]
pub fn unix_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A stream of timestamp events every `period` until `shutdown` fires.
///
/// The first event comes one full period after subscribing.
pub fn ticker(
    period: Duration,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let first = tokio::time::Instant::now() + period;
    IntervalStream::new(tokio::time::interval_at(first, period))
        .map(|_| Ok(Event::default().data(unix_seconds().to_string())))
        .take_until(shutdown.cancelled_owned())
}

/// GET /sse-endpoint
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(ticker(state.config.sse_interval(), state.shutdown.token()))
}
