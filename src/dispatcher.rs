use std::str::FromStr;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::commands::executable::Executable;
use crate::commands::{Command, CommandName, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

#[derive(Debug, ThisError, PartialEq)]
pub enum DispatchError {
    #[error("invalid command: {0}")]
    UnknownCommand(String),
}

#[derive(Debug, ThisError, PartialEq)]
pub enum RequestError {
    #[error("invalid request, expected array, got {0}")]
    NotAnArray(Frame),
    #[error("invalid request, array length must be greater than zero")]
    Empty,
    #[error("invalid request, command name must be a string, got {0}")]
    InvalidCommandName(Frame),
}

/// A client request split into its command name and arguments.
///
/// Clients send commands to the server as RESP arrays. The command name is upper-cased so it
/// can be looked up in the command table and compared against write commands.
#[derive(Debug, PartialEq)]
pub struct Request {
    pub name: String,
    pub args: Vec<Frame>,
}

impl TryFrom<Frame> for Request {
    type Error = RequestError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            frame => return Err(RequestError::NotAnArray(frame)),
        };

        let mut parts = frames.into_iter();
        let name = match parts.next() {
            None => return Err(RequestError::Empty),
            Some(Frame::Simple(s)) => s,
            Some(Frame::Bulk(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(s) => s,
                Err(_) => return Err(RequestError::InvalidCommandName(Frame::Bulk(bytes))),
            },
            Some(frame) => return Err(RequestError::InvalidCommandName(frame)),
        };

        Ok(Self {
            name: name.to_uppercase(),
            args: parts.collect(),
        })
    }
}

/// Routes commands to their handlers. Handlers run against the store the dispatcher was built
/// with; live connections and log replay share the same dispatcher so both follow one path.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
}

impl Dispatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Executes the command `name` with `args`.
    ///
    /// Invalid arguments produce an error reply, not an `Err`: only a command name missing from
    /// the command table fails the dispatch.
    pub fn handle(&self, name: &str, args: Vec<Frame>) -> Result<Frame, DispatchError> {
        let name = CommandName::from_str(name)
            .map_err(|_| DispatchError::UnknownCommand(name.to_string()))?;

        let mut parser = CommandParser::new(args);
        let res = match Command::parse(name, &mut parser) {
            Ok(cmd) => cmd.exec(&self.store),
            Err(err) => {
                debug!(command = ?name, error = %err, "invalid command arguments");
                err.into_frame(name)
            }
        };

        Ok(res)
    }

    pub fn handle_request(&self, request: Request) -> Result<Frame, DispatchError> {
        self.handle(&request.name, request.args)
    }
}

/// Tells whether `name` refers to a command that mutates the store.
pub fn is_write_command(name: &str) -> bool {
    CommandName::from_str(name).is_ok_and(CommandName::is_write)
}
