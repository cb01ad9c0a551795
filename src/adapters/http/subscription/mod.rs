//! HTTP adapter for subscription lifecycle endpoints.
//!
//! - `POST /api/subscriptions` - start a subscription (201)
//! - `POST /api/subscriptions/extend` - extend a subscription
//! - `POST /api/subscriptions/regenerate` - new invite after leaving the group
//! - `POST /api/subscriptions/validate-phone` - syntactic phone check
//! - `GET /api/admin/subscribers` - joined and pending subscribers
//! - `DELETE /api/admin/subscribers/:platform_id` - force removal (204)
//! - `POST /api/admin/sweep` - run a sweep now (409 if one is running)
//! - `POST /api/admin/resolve` - bulk contact resolution

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, GateAppState, GateSettings};
pub use routes::app_router;
