use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use wordnok_service::metric;

use crate::store::Store;

mod entries;
mod error;

pub use error::ResponseError;

use entries::{get_entry, put_entry};

pub async fn healthcheck() -> &'static str {
    metric!(counter("healthcheck") += 1);
    "ok"
}

pub fn create_app(store: Arc<Store>) -> Router {
    // outermost first: the hub has to exist before the http layer starts a transaction
    let layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction());
    Router::new()
        .route("/entries/{key}", get(get_entry).put(put_entry))
        // values are as large as the lookup results they hold
        .layer(DefaultBodyLimit::disable())
        .with_state(store)
        .layer(layer)
        // added after `layer`, so health probes skip sentry
        .route("/healthcheck", get(healthcheck))
}
