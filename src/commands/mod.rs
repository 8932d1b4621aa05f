pub mod command;
pub mod details;
pub mod executable;
pub mod get;
pub mod hget;
pub mod hgetall;
pub mod hset;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error as ThisError;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use command::Command as Command_;
use get::Get;
use hget::Hget;
use hgetall::Hgetall;
use hset::Hset;
use ping::Ping;
use set::Set;

/// The fixed set of commands the server understands. Lookup by name is ASCII case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CommandName {
    Command,
    Ping,
    Set,
    Get,
    Hset,
    Hget,
    Hgetall,
}

impl CommandName {
    pub fn details(self) -> &'static Details {
        match self {
            CommandName::Command => &command::DETAILS,
            CommandName::Ping => &ping::DETAILS,
            CommandName::Set => &set::DETAILS,
            CommandName::Get => &get::DETAILS,
            CommandName::Hset => &hset::DETAILS,
            CommandName::Hget => &hget::DETAILS,
            CommandName::Hgetall => &hgetall::DETAILS,
        }
    }

    /// Write commands mutate the store and must be recorded in the append-only log.
    pub fn is_write(self) -> bool {
        self.details().is_write()
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Get(Get),
    Hget(Hget),
    Hgetall(Hgetall),
    Hset(Hset),
    Set(Set),

    Command(Command_),
    Ping(Ping),
}

impl Command {
    /// Parses the arguments of the command `name`. The parser must hold the arguments only; the
    /// command name itself has already been consumed by the caller.
    pub(crate) fn parse(
        name: CommandName,
        parser: &mut CommandParser,
    ) -> Result<Self, CommandParserError> {
        match name {
            CommandName::Command => Command_::try_from(parser).map(Command::Command),
            CommandName::Ping => Ping::try_from(parser).map(Command::Ping),
            CommandName::Set => Set::try_from(parser).map(Command::Set),
            CommandName::Get => Get::try_from(parser).map(Command::Get),
            CommandName::Hset => Hset::try_from(parser).map(Command::Hset),
            CommandName::Hget => Hget::try_from(parser).map(Command::Hget),
            CommandName::Hgetall => Hgetall::try_from(parser).map(Command::Hgetall),
        }
    }
}

impl Executable for Command {
    fn exec(self, store: &Store) -> Frame {
        match self {
            Command::Command(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Hget(cmd) => cmd.exec(store),
            Command::Hgetall(cmd) => cmd.exec(store),
            Command::Hset(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

pub(crate) struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    pub(crate) fn new(args: Vec<Frame>) -> Self {
        Self {
            parts: args.into_iter(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.next_frame()? {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Like [`CommandParser::next_string`], but a fully consumed parser yields `None`.
    fn next_optional_string(&mut self) -> Result<Option<String>, CommandParserError> {
        match self.next_string() {
            Ok(s) => Ok(Some(s)),
            Err(CommandParserError::EndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fails if any argument was left unread.
    fn finish(&mut self) -> Result<(), CommandParserError> {
        match self.parts.next() {
            None => Ok(()),
            Some(_) => Err(CommandParserError::TrailingArguments),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("invalid argument at index {index}")]
    InvalidCommandArgument { index: usize },
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
    #[error("protocol error; unexpected trailing arguments")]
    TrailingArguments,
}

impl CommandParserError {
    /// Renders the error as the reply sent to the client for command `name`.
    pub fn into_frame(self, name: CommandName) -> Frame {
        match self {
            CommandParserError::EndOfStream | CommandParserError::TrailingArguments => {
                Frame::Error(format!(
                    "ERR wrong number of arguments for '{}' command",
                    name.details().name
                ))
            }
            err => Frame::Error(format!("ERR {}", err)),
        }
    }
}
