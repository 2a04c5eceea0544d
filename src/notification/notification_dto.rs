use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::notification_models::{NotificationPage, NotificationRecord, Payload, DEFAULT_KIND};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendNotificationRequest {
    /// Defaults to "system"
    #[validate(length(min = 1, max = 64))]
    pub kind: Option<String>,
    #[schema(value_type = Object)]
    #[serde(default)]
    pub payload: Payload,
}

impl SendNotificationRequest {
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_KIND)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<NotificationRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub unread_count: u64,
}

impl NotificationListResponse {
    pub fn from_page(page: NotificationPage, unread_count: u64) -> Self {
        let total_pages = if page.limit == 0 {
            0
        } else {
            page.total.div_ceil(page.limit as u64) as u32
        };

        Self {
            data: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
            unread_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

/// Number of records touched by a bulk operation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AffectedResponse {
    pub affected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_defaults_to_system() {
        let req: SendNotificationRequest = serde_json::from_value(json!({"payload": {"msg": "hi"}})).unwrap();
        assert_eq!(req.kind(), "system");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_kind_is_invalid() {
        let req: SendNotificationRequest = serde_json::from_value(json!({"kind": "", "payload": {}})).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_overlong_kind_is_invalid() {
        let req: SendNotificationRequest =
            serde_json::from_value(json!({"kind": "x".repeat(65), "payload": {}})).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = NotificationPage {
            items: Vec::new(),
            total: 41,
            page: 1,
            limit: 20,
        };
        let response = NotificationListResponse::from_page(page, 3);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.unread_count, 3);
    }
}
