//! JSON endpoints under `/api`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, SubmitError};
use crate::models::{NewNewsItem, NewSubscriber, NewsItem, Subscriber};
use crate::routes::AppState;
use crate::subscribe::validate_email;

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn create_subscriber(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSubscriber>, JsonRejection>,
) -> Result<Json<Subscriber>, ApiError> {
    let body = parse_body(payload)?;

    validate_email(&body.email).map_err(|e| match e {
        SubmitError::Validation(message) => ApiError::BadRequest(message.to_string()),
        other => ApiError::BadRequest(other.to_string()),
    })?;

    let subscriber = state.db.add_subscriber(&body.email).await?;
    info!("New subscriber {}", subscriber.id);
    Ok(Json(subscriber))
}

pub async fn list_news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let items = state.db.get_all_news(state.news_limit).await?;
    Ok(Json(items))
}

pub async fn create_news(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewNewsItem>, JsonRejection>,
) -> Result<Json<NewsItem>, ApiError> {
    let body = parse_body(payload)?;
    body.validate().map_err(ApiError::BadRequest)?;

    let item = state.db.create_news_item(&body).await?;
    info!("Created news item {}", item.id);
    Ok(Json(item))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": state.clock.now().to_rfc3339(),
    }))
}
