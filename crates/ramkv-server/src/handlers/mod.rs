//! HTTP handlers for the ramkv REST API, organized by the pinned contract.

pub mod admin;
pub mod health;
pub mod helpers;
pub mod metrics;
pub mod users;

pub use admin::compact;
pub use health::health_check;
pub use metrics::prometheus_metrics;
pub use users::{get_user, list_users, upsert_user};
