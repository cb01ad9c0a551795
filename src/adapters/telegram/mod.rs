//! Telegram adapters.
//!
//! - `TelegramPlatform` - Bot API implementation of `MembershipPlatform`
//! - `ContactResolverClient` - phone-to-account lookup via the resolver sidecar
//! - `RetryingPlatform` - flood-wait retry decorator
//! - `Update` - inbound webhook payloads
//! - `MockMembershipPlatform` - configurable fake for tests

mod bot_api;
mod mock_platform;
mod resolver;
mod retrying;
mod updates;

pub use bot_api::{TelegramConfig, TelegramPlatform, ALLOWED_UPDATES};
pub use mock_platform::{MethodCall, MockMembershipPlatform, SentMessage};
pub use resolver::ContactResolverClient;
pub use retrying::RetryingPlatform;
pub use updates::{InboundEvent, Update};
