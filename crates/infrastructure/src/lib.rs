//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_sink;
mod http_webhook_notification_sink;
mod in_memory_permission_context_cache;
mod postgres_approval_request_repository;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_authorization_repository;
mod queued_notification_publisher;
mod redis_permission_context_cache;
mod system_clock;

pub use console_notification_sink::ConsoleNotificationSink;
pub use http_webhook_notification_sink::HttpWebhookNotificationSink;
pub use in_memory_permission_context_cache::InMemoryPermissionContextCache;
pub use postgres_approval_request_repository::PostgresApprovalRequestRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use queued_notification_publisher::QueuedNotificationPublisher;
pub use redis_permission_context_cache::RedisPermissionContextCache;
pub use system_clock::SystemClock;
