//! Delivery filter for inbound messages.

use regex::Regex;

use crate::message::{Message, ParameterChangedMessage};

/// Decides which inbound messages are delivered to subscribers.
///
/// A parameter change has to satisfy the address pattern (against its full
/// address) and the parameter pattern (against its bare name).
#[derive(Debug, Clone)]
pub struct MessageFilter {
    /// Deliver plain messages.
    pub receive_messages: bool,
    /// Deliver parameter changes.
    pub receive_parameter_changes: bool,
    address_pattern: Option<Regex>,
    parameter_pattern: Option<Regex>,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            receive_messages: true,
            receive_parameter_changes: true,
            address_pattern: None,
            parameter_pattern: None,
        }
    }
}

impl MessageFilter {
    /// Creates a filter that delivers everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter that delivers nothing; no receive loop is started for it.
    pub fn disabled() -> Self {
        Self {
            receive_messages: false,
            receive_parameter_changes: false,
            ..Self::default()
        }
    }

    /// Sets the address pattern.
    pub fn set_address_pattern(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.address_pattern = Some(Regex::new(pattern)?);
        Ok(())
    }

    /// Sets the parameter-name pattern.
    pub fn set_parameter_pattern(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.parameter_pattern = Some(Regex::new(pattern)?);
        Ok(())
    }

    /// Builder: set the address pattern.
    pub fn with_address_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.set_address_pattern(pattern)?;
        Ok(self)
    }

    /// Builder: set the parameter-name pattern.
    pub fn with_parameter_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.set_parameter_pattern(pattern)?;
        Ok(self)
    }

    /// Builder: toggle plain message delivery.
    pub fn with_receive_messages(mut self, receive: bool) -> Self {
        self.receive_messages = receive;
        self
    }

    /// Builder: toggle parameter change delivery.
    pub fn with_receive_parameter_changes(mut self, receive: bool) -> Self {
        self.receive_parameter_changes = receive;
        self
    }

    /// The configured address pattern.
    pub fn address_pattern(&self) -> Option<&Regex> {
        self.address_pattern.as_ref()
    }

    /// The configured parameter-name pattern.
    pub fn parameter_pattern(&self) -> Option<&Regex> {
        self.parameter_pattern.as_ref()
    }

    /// Returns true if any delivery category is enabled.
    pub fn receives_anything(&self) -> bool {
        self.receive_messages || self.receive_parameter_changes
    }

    /// True if no address pattern is set or it matches the full address.
    pub fn matches_address(&self, message: &Message) -> bool {
        self.address_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&message.address))
    }

    /// True if no parameter pattern is set or it matches the bare name.
    pub fn matches_parameter(&self, message: &ParameterChangedMessage) -> bool {
        self.parameter_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(message.name()))
    }
}
