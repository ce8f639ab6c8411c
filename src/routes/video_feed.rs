use crate::{
    server::SharedState,
    stream::{PartWriter, Subscription},
};
use axum::{
    body::Body,
    extract::State,
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use tracing::instrument;

#[instrument(skip(state, uri), fields(path = %uri.path()))]
pub async fn video_feed(State(state): State<SharedState>, uri: Uri) -> Response {
    let writer = PartWriter::new();
    let content_type = writer.content_type();

    let subscription = Subscription::new(state.broadcaster.clone(), state.metrics.clone());
    tracing::info!(
        subscribers = state.broadcaster.subscriber_count(),
        "Downstream client subscribed"
    );

    let body = Body::from_stream(subscription.into_stream(writer));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONNECTION, "close".to_string()),
        ],
        body,
    )
        .into_response()
}
