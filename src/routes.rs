use crate::{
    broadcast::BroadcastMessage,
    health,
    notification::{
        notification_dto::{
            AffectedResponse, NotificationListResponse, SendNotificationRequest, UnreadCountResponse,
        },
        notification_handlers as handlers,
        notification_service::DeliverySnapshot,
        NotificationRecord,
    },
    state::AppState,
    websocket::{self, types::WsMessage},
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::send_notification,
        handlers::get_notifications,
        handlers::get_unread_count,
        handlers::mark_all_notifications_read,
        handlers::delete_all_notifications,
        handlers::notification_stream,
        handlers::get_notification,
        handlers::mark_notification_read,
        handlers::delete_notification,
        health::health_check,
    ),
    components(
        schemas(
            SendNotificationRequest,
            NotificationRecord,
            NotificationListResponse,
            UnreadCountResponse,
            AffectedResponse,
            BroadcastMessage,
            WsMessage,
            DeliverySnapshot,
            health::HealthResponse,
            health::HealthStatus,
        )
    ),
    tags(
        (name = "notifications", description = "Notification endpoints"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/users/:recipient_id/notifications",
            get(handlers::get_notifications).post(handlers::send_notification),
        )
        .route(
            "/users/:recipient_id/notifications/unread-count",
            get(handlers::get_unread_count),
        )
        .route(
            "/users/:recipient_id/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/users/:recipient_id/notifications/destroy-all",
            delete(handlers::delete_all_notifications),
        )
        .route(
            "/users/:recipient_id/notifications/stream",
            get(handlers::notification_stream),
        )
        .route("/users/:recipient_id/notifications/ws", get(websocket::ws_handler))
        .route(
            "/users/:recipient_id/notifications/:id",
            get(handlers::get_notification).delete(handlers::delete_notification),
        )
        .route(
            "/users/:recipient_id/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route("/health", get(health::health_check));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
