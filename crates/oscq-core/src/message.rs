//! OSC message data model.
//!
//! A [`Message`] is an address plus an ordered list of [`Argument`]s. The
//! specialised messages ([`ParameterChangedMessage`], [`ChatMessage`],
//! [`AvatarChangedMessage`]) are views over a plain message with a fixed
//! address convention:
//!
//! ```text
//! /avatar/parameters/<name>   <value>
//! /avatar/change              <avatar id>
//! /chatbox/input              <text> <bypass keyboard> <play notification>
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// Address prefix of every parameter change.
pub const PARAMETER_CHANGED_ADDRESS: &str = "/avatar/parameters/";

/// Address on which the peer announces an avatar switch.
pub const AVATAR_CHANGED_ADDRESS: &str = "/avatar/change";

/// Address of the chatbox input.
pub const CHATBOX_INPUT_ADDRESS: &str = "/chatbox/input";

/// A single OSC argument.
///
/// `Unknown` stands for a tag the decoder does not understand. It carries no
/// payload and is skipped when a message is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    /// `T` / `F`, no payload bytes on the wire.
    Bool(bool),
    /// `i`, 32-bit big-endian signed integer.
    Int(i32),
    /// `f`, 32-bit big-endian IEEE-754 float. `I` decodes to positive infinity.
    Float(f32),
    /// `s` / `S`, null-terminated string.
    String(String),
    /// Unrecognised tag or absent value.
    Unknown,
}

impl Argument {
    /// Returns true for [`Argument::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the boolean value, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an int.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float value, if this is a float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Unknown => f.write_str("<unknown>"),
        }
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Argument {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Into::into)
    }
}

/// A generic OSC message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Slash-delimited address, e.g. `/avatar/parameters/Foo`.
    pub address: String,
    /// Arguments in declaration order.
    pub arguments: Vec<Argument>,
}

impl Message {
    /// Creates a new message.
    pub fn new(address: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            address: address.into(),
            arguments,
        }
    }

    /// The message returned by the decoder for malformed input.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the address is empty and there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.arguments.is_empty()
    }

    /// Returns the first argument, if any.
    pub fn first_argument(&self) -> Option<&Argument> {
        self.arguments.first()
    }

    /// Returns true if this is a parameter change.
    pub fn is_parameter_change(&self) -> bool {
        self.address.starts_with(PARAMETER_CHANGED_ADDRESS)
    }

    /// Returns true if this is an avatar change.
    ///
    /// This is a prefix match, so `/avatar/changed-something` qualifies too.
    pub fn is_avatar_change(&self) -> bool {
        self.address.starts_with(AVATAR_CHANGED_ADDRESS)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        for arg in &self.arguments {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A parameter change: `/avatar/parameters/<name> <value>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChangedMessage {
    name: String,
    value: Argument,
    message: Message,
}

impl ParameterChangedMessage {
    /// Creates a parameter change for `name` with the given value.
    pub fn new(name: impl Into<String>, value: impl Into<Argument>) -> Self {
        let name = name.into();
        let value = value.into();
        let message = Message::new(
            format!("{}{}", PARAMETER_CHANGED_ADDRESS, name),
            vec![value.clone()],
        );
        Self {
            name,
            value,
            message,
        }
    }

    /// Parameter name with the address prefix stripped.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first argument of the underlying message.
    pub fn value(&self) -> &Argument {
        &self.value
    }

    /// Full address, including the parameter prefix.
    pub fn address(&self) -> &str {
        &self.message.address
    }

    /// The underlying message.
    pub fn message(&self) -> &Message {
        &self.message
    }
}

impl TryFrom<Message> for ParameterChangedMessage {
    type Error = MessageError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let name = message
            .address
            .strip_prefix(PARAMETER_CHANGED_ADDRESS)
            .ok_or_else(|| MessageError::not_a_parameter(&message.address))?
            .to_string();

        let value = match message.arguments.first() {
            Some(arg) if !arg.is_unknown() => arg.clone(),
            _ => return Err(MessageError::missing_argument(&message.address)),
        };

        Ok(Self {
            name,
            value,
            message,
        })
    }
}

impl From<ParameterChangedMessage> for Message {
    fn from(value: ParameterChangedMessage) -> Self {
        value.message
    }
}

/// A chatbox message: `/chatbox/input <text> <bypass keyboard> <play notification>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Text to show in the chatbox.
    pub text: String,
    /// Send immediately instead of opening the keyboard.
    pub bypass_keyboard: bool,
    /// Play the notification sound.
    pub play_notification: bool,
}

impl ChatMessage {
    /// Creates a chat message that bypasses the keyboard without a notification.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bypass_keyboard: true,
            play_notification: false,
        }
    }

    /// Builder: set whether the keyboard is bypassed.
    pub fn with_bypass_keyboard(mut self, bypass: bool) -> Self {
        self.bypass_keyboard = bypass;
        self
    }

    /// Builder: set whether the notification sound plays.
    pub fn with_notification(mut self, notify: bool) -> Self {
        self.play_notification = notify;
        self
    }

    /// Builds the wire message.
    pub fn to_message(&self) -> Message {
        Message::new(
            CHATBOX_INPUT_ADDRESS,
            vec![
                Argument::String(self.text.clone()),
                Argument::Bool(self.bypass_keyboard),
                Argument::Bool(self.play_notification),
            ],
        )
    }
}

impl From<ChatMessage> for Message {
    fn from(value: ChatMessage) -> Self {
        value.to_message()
    }
}

/// An avatar change notification: `/avatar/change <avatar id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarChangedMessage {
    avatar_id: String,
    message: Message,
}

impl AvatarChangedMessage {
    /// Identifier of the new avatar, empty if the peer sent none.
    pub fn avatar_id(&self) -> &str {
        &self.avatar_id
    }

    /// The underlying message.
    pub fn message(&self) -> &Message {
        &self.message
    }
}

impl From<Message> for AvatarChangedMessage {
    fn from(message: Message) -> Self {
        let avatar_id = message
            .first_argument()
            .and_then(Argument::as_str)
            .unwrap_or_default()
            .to_string();
        Self { avatar_id, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_from_message() {
        let message = Message::new("/avatar/parameters/Foo", vec![Argument::Float(0.5)]);
        let param = ParameterChangedMessage::try_from(message).unwrap();

        assert_eq!(param.name(), "Foo");
        assert_eq!(param.value(), &Argument::Float(0.5));
        assert_eq!(param.address(), "/avatar/parameters/Foo");
    }

    #[test]
    fn parameter_rejects_foreign_address() {
        let message = Message::new("/chatbox/input", vec![Argument::Bool(true)]);
        let err = ParameterChangedMessage::try_from(message).unwrap_err();
        assert!(matches!(err, MessageError::NotAParameter { .. }));
    }

    #[test]
    fn parameter_rejects_missing_value() {
        let empty = Message::new("/avatar/parameters/Foo", vec![]);
        assert!(matches!(
            ParameterChangedMessage::try_from(empty),
            Err(MessageError::MissingArgument { .. })
        ));

        let absent = Message::new("/avatar/parameters/Foo", vec![Argument::Unknown]);
        assert!(matches!(
            ParameterChangedMessage::try_from(absent),
            Err(MessageError::MissingArgument { .. })
        ));
    }

    #[test]
    fn parameter_new_builds_address() {
        let param = ParameterChangedMessage::new("Foo", true);
        let message: Message = param.into();
        assert_eq!(message.address, "/avatar/parameters/Foo");
        assert_eq!(message.arguments, vec![Argument::Bool(true)]);
    }

    #[test]
    fn chat_message_arguments() {
        let message = ChatMessage::new("hello").with_notification(true).to_message();
        assert_eq!(message.address, CHATBOX_INPUT_ADDRESS);
        assert_eq!(
            message.arguments,
            vec![
                Argument::String("hello".to_string()),
                Argument::Bool(true),
                Argument::Bool(true),
            ]
        );
    }

    #[test]
    fn avatar_id_defaults_to_empty() {
        let with_id = AvatarChangedMessage::from(Message::new(
            AVATAR_CHANGED_ADDRESS,
            vec![Argument::from("avtr_123")],
        ));
        assert_eq!(with_id.avatar_id(), "avtr_123");

        let without = AvatarChangedMessage::from(Message::new(AVATAR_CHANGED_ADDRESS, vec![]));
        assert_eq!(without.avatar_id(), "");
    }

    #[test]
    fn avatar_change_is_prefix_match() {
        assert!(Message::new("/avatar/change", vec![]).is_avatar_change());
        assert!(Message::new("/avatar/changed-something", vec![]).is_avatar_change());
        assert!(!Message::new("/avatar/parameters/X", vec![]).is_avatar_change());
    }

    #[test]
    fn argument_display() {
        let message = Message::new(
            "/x",
            vec![Argument::Int(3), Argument::from("a"), Argument::Unknown],
        );
        assert_eq!(message.to_string(), "/x 3 \"a\" <unknown>");
    }

    #[test]
    fn argument_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Argument::Bool(true),
            Argument::Int(2),
            Argument::from("s"),
        ])
        .unwrap();
        assert_eq!(json, r#"[true,2,"s"]"#);
    }
}
