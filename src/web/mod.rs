//! HTTP layer: health route and the `/log` SSE stream.
//!
//! Thin adaptation of hub subscriptions onto `text/event-stream` responses.
//! All lifecycle logic lives in the hub; this layer only subscribes on
//! request, forwards queued lines as SSE events, and unsubscribes when the
//! client goes away and the response stream is dropped.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Error;
use crate::hub::{Hub, ObserverId};

/// Build the application router.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/log", get(stream_log))
        .with_state(hub)
}

/// Bind the listener and serve until `shutdown` is cancelled.
pub async fn serve(hub: Arc<Hub>, port: u16, shutdown: CancellationToken) -> Result<(), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router(hub))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn home() -> &'static str {
    info!("home page request");
    "Hello World!"
}

/// Open an SSE stream: the recent history is replayed first, then each
/// newly appended line arrives as its own `data:` event.
async fn stream_log(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    info!("new /log request");
    let (id, rx) = hub.subscribe();
    let stream = LogStream {
        rx: ReceiverStream::new(rx),
        _guard: Unsubscriber { hub, id },
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

/// Unsubscribes the observer when the response stream is dropped, which is
/// how a client disconnect reaches the hub.
struct Unsubscriber {
    hub: Arc<Hub>,
    id: ObserverId,
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        info!(id = self.id, "sse client disconnected");
        self.hub.unsubscribe(self.id);
    }
}

/// Adapts an observer's line queue into a stream of SSE events.
struct LogStream {
    rx: ReceiverStream<String>,
    _guard: Unsubscriber,
}

impl Stream for LogStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|line| line.map(|line| Ok(Event::default().data(line))))
    }
}
