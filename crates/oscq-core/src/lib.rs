//! Core types: OSC messages, delivery filters, broadcast events, connection records

pub mod connection;
pub mod error;
pub mod event;
pub mod filter;
pub mod message;
pub mod tracing;

pub use connection::{AnnouncedService, ConnectionInfo};
pub use error::{HandlerError, MessageError};
pub use event::{BoxFuture, BroadcastEvent, SubscriptionId};
pub use filter::MessageFilter;
pub use message::{
    AVATAR_CHANGED_ADDRESS, Argument, AvatarChangedMessage, CHATBOX_INPUT_ADDRESS, ChatMessage,
    Message, PARAMETER_CHANGED_ADDRESS, ParameterChangedMessage,
};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
