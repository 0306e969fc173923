//! Textual control channel.
//!
//! Writers send `start` or `stop`. Matching is exact and case-sensitive once
//! a trailing line terminator is removed, so `echo start > ...` style input
//! works. Input of [`MAX_COMMAND_LEN`] bytes or more is rejected before it is
//! looked at; anything else that is not a command is ignored.

use serde::{Deserialize, Serialize};

/// Inputs of this many bytes or more are rejected.
pub const MAX_COMMAND_LEN: usize = 32;

/// A recognised control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse raw control input.
    ///
    /// Returns `Ok(None)` for input that is not a command.
    pub fn parse(input: &[u8]) -> Result<Option<Self>, ControlError> {
        if input.len() >= MAX_COMMAND_LEN {
            return Err(ControlError::InvalidArgument { len: input.len() });
        }

        let token = input
            .strip_suffix(b"\n")
            .map(|rest| rest.strip_suffix(b"\r").unwrap_or(rest))
            .unwrap_or(input);

        Ok(match token {
            b"start" => Some(Command::Start),
            b"stop" => Some(Command::Stop),
            _ => None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
        }
    }
}

/// Lifecycle of the capture pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Running => write!(f, "running"),
        }
    }
}

/// Errors surfaced by the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The input was too long to be a command
    InvalidArgument { len: usize },
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::InvalidArgument { len } => write!(
                f,
                "Invalid argument: control input of {len} bytes (limit {})",
                MAX_COMMAND_LEN - 1
            ),
        }
    }
}

impl std::error::Error for ControlError {}
