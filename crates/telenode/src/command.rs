use log::{info, warn};

use crate::topic::Topic;

// The only command with a meaning.
const RESTART: &str = "restart";

/// A raw message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    /// Topic the message was received on.
    pub channel: String,
    /// Raw message body.
    pub body: String,
}

impl CommandMessage {
    /// Creates a [`CommandMessage`].
    #[must_use]
    #[inline]
    pub fn new(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
        }
    }
}

/// An interpreted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Restart the node immediately.
    Restart,
    /// Anything else. It has been logged and discarded.
    Unrecognized,
}

/// Interprets the messages received on the control channel.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    control: Topic,
}

impl CommandHandler {
    /// Creates a [`CommandHandler`] listening on the `control` topic.
    #[must_use]
    pub const fn new(control: Topic) -> Self {
        Self { control }
    }

    /// Returns the control topic.
    #[must_use]
    #[inline]
    pub const fn control(&self) -> &Topic {
        &self.control
    }

    /// Interprets a [`CommandMessage`].
    ///
    /// Only an exact `restart` body, surrounding whitespace aside, received
    /// on the control topic is recognized.
    pub fn handle(&self, message: &CommandMessage) -> Command {
        if message.channel != self.control.as_str() {
            warn!(
                "Ignoring message on `{}`, not the control channel",
                message.channel
            );
            return Command::Unrecognized;
        }

        if message.body.trim() == RESTART {
            info!("Restart command received");
            Command::Restart
        } else {
            warn!("Unrecognized command `{}` discarded", message.body);
            Command::Unrecognized
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::topic::Topic;

    use super::{Command, CommandHandler, CommandMessage};

    const CONTROL: &str = "iot-cybot/node1/cmd";

    fn handler() -> CommandHandler {
        CommandHandler::new(Topic::new(CONTROL))
    }

    #[test]
    fn restart_command() {
        let handler = handler();

        assert_eq!(
            handler.handle(&CommandMessage::new(CONTROL, "restart")),
            Command::Restart
        );
        assert_eq!(
            handler.handle(&CommandMessage::new(CONTROL, " restart\n")),
            Command::Restart
        );
    }

    #[test]
    fn unrecognized_commands() {
        let handler = handler();

        for body in ["", "Restart", "reboot", "restart now", "{\"cmd\":\"restart\"}"] {
            assert_eq!(
                handler.handle(&CommandMessage::new(CONTROL, body)),
                Command::Unrecognized,
                "body `{body}`"
            );
        }
    }

    #[test]
    fn other_channels_are_ignored() {
        assert_eq!(
            handler().handle(&CommandMessage::new("iot-cybot/node2/cmd", "restart")),
            Command::Unrecognized
        );
    }
}
