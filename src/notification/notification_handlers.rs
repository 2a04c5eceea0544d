use crate::{
    broadcast::topic_for,
    error::Result,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use uuid::Uuid;
use validator::Validate;

use super::{
    notification_dto::{
        AffectedResponse, NotificationListResponse, NotificationQuery, SendNotificationRequest,
        UnreadCountResponse,
    },
    notification_models::{NotificationRecord, RecipientId},
};

/// Send a notification to a recipient
#[utoipa::path(
    post,
    path = "/api/users/{recipient_id}/notifications",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID")
    ),
    request_body = SendNotificationRequest,
    responses(
        (status = 201, description = "Notification stored", body = NotificationRecord),
        (status = 400, description = "Invalid input"),
        (status = 500, description = "Notification could not be stored")
    ),
    tag = "notifications"
)]
pub async fn send_notification(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let kind = payload.kind().to_string();
    let record = state
        .dispatcher
        .send(recipient_id, &kind, payload.payload)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// List a recipient's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/users/{recipient_id}/notifications",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID"),
        NotificationQuery
    ),
    responses(
        (status = 200, description = "Page of notifications", body = NotificationListResponse)
    ),
    tag = "notifications"
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationListResponse>> {
    let page = query.page.unwrap_or(1);
    let limit = state.config.page_size(query.limit);

    let notifications = state.store.list(recipient_id, page, limit).await?;
    let unread_count = state.store.unread_count(recipient_id).await?;

    Ok(Json(NotificationListResponse::from_page(notifications, unread_count)))
}

/// Count a recipient's unread notifications
#[utoipa::path(
    get,
    path = "/api/users/{recipient_id}/notifications/unread-count",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID")
    ),
    responses(
        (status = 200, description = "Unread count", body = UnreadCountResponse)
    ),
    tag = "notifications"
)]
pub async fn get_unread_count(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
) -> Result<Json<UnreadCountResponse>> {
    let unread_count = state.store.unread_count(recipient_id).await?;

    Ok(Json(UnreadCountResponse { unread_count }))
}

/// Mark all of a recipient's notifications as read
#[utoipa::path(
    post,
    path = "/api/users/{recipient_id}/notifications/read-all",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID")
    ),
    responses(
        (status = 200, description = "Notifications marked as read", body = AffectedResponse)
    ),
    tag = "notifications"
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
) -> Result<Json<AffectedResponse>> {
    let affected = state.store.mark_all_read(recipient_id).await?;

    Ok(Json(AffectedResponse { affected }))
}

/// Delete all of a recipient's notifications
#[utoipa::path(
    delete,
    path = "/api/users/{recipient_id}/notifications/destroy-all",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID")
    ),
    responses(
        (status = 200, description = "Notifications deleted", body = AffectedResponse)
    ),
    tag = "notifications"
)]
pub async fn delete_all_notifications(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
) -> Result<Json<AffectedResponse>> {
    let affected = state.store.delete_all(recipient_id).await?;

    Ok(Json(AffectedResponse { affected }))
}

/// Subscribe to a recipient's notifications via Server-Sent Events
#[utoipa::path(
    get,
    path = "/api/users/{recipient_id}/notifications/stream",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID")
    ),
    responses(
        (status = 200, description = "SSE stream of notifications")
    ),
    tag = "notifications"
)]
pub async fn notification_stream(
    State(state): State<AppState>,
    Path(recipient_id): Path<RecipientId>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = state
        .notification_bus
        .subscribe(topic_for(recipient_id))
        .filter_map(|message| {
            let json = serde_json::to_string(&message).ok()?;
            Some(Ok(Event::default().event("notification").data(json)))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Get one of a recipient's notifications
#[utoipa::path(
    get,
    path = "/api/users/{recipient_id}/notifications/{id}",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID"),
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification", body = NotificationRecord),
        (status = 404, description = "Notification not found for this recipient")
    ),
    tag = "notifications"
)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path((recipient_id, notification_id)): Path<(RecipientId, Uuid)>,
) -> Result<Json<NotificationRecord>> {
    let notification = state.store.get_for_recipient(recipient_id, notification_id).await?;

    Ok(Json(notification))
}

/// Mark notification as read
#[utoipa::path(
    post,
    path = "/api/users/{recipient_id}/notifications/{id}/read",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID"),
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = NotificationRecord),
        (status = 404, description = "Notification not found for this recipient")
    ),
    tag = "notifications"
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path((recipient_id, notification_id)): Path<(RecipientId, Uuid)>,
) -> Result<Json<NotificationRecord>> {
    let notification = state
        .store
        .mark_read_for_recipient(recipient_id, notification_id)
        .await?;

    Ok(Json(notification))
}

/// Delete a notification
#[utoipa::path(
    delete,
    path = "/api/users/{recipient_id}/notifications/{id}",
    params(
        ("recipient_id" = i64, Path, description = "Recipient user ID"),
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found for this recipient")
    ),
    tag = "notifications"
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path((recipient_id, notification_id)): Path<(RecipientId, Uuid)>,
) -> Result<StatusCode> {
    state
        .store
        .delete_for_recipient(recipient_id, notification_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
