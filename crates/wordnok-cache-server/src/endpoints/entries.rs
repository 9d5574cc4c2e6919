use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use wordnok_service::metric;

use crate::endpoints::ResponseError;
use crate::store::Store;

pub async fn get_entry(
    State(store): State<Arc<Store>>,
    Path(key): Path<String>,
) -> Result<String, ResponseError> {
    match store.get(&key).await {
        Some(value) => {
            metric!(counter("entries.get") += 1, "status" => "hit");
            Ok(value)
        }
        None => {
            metric!(counter("entries.get") += 1, "status" => "miss");
            Err(ResponseError::not_found("entry"))
        }
    }
}

pub async fn put_entry(
    State(store): State<Arc<Store>>,
    Path(key): Path<String>,
    value: String,
) -> Result<StatusCode, ResponseError> {
    metric!(counter("entries.put") += 1);
    metric!(histogram("entries.put.size") = value.len() as u64);

    store
        .put(&key, &value)
        .await
        .with_context(|| format!("failed to store entry {key}"))?;

    tracing::trace!("Stored entry {}", key);
    Ok(StatusCode::NO_CONTENT)
}
