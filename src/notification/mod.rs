pub mod memory_repository;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;
pub mod notification_service;
pub mod notification_store;

pub use memory_repository::InMemoryNotificationBackend;
pub use notification_models::{NotificationRecord, RecipientId};
pub use notification_repository::{NotificationBackend, PgNotificationBackend};
pub use notification_service::NotificationDispatcher;
pub use notification_store::NotificationStore;
