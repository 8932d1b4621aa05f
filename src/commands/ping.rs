use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "ping",
    arity: -1,
    flags: Some(&["fast"]),
    first_key: 0,
    last_key: 0,
    step: 0,
    acl_categories: &["@fast", "@connection"],
    tips: None,
    key_specifications: None,
    subcommands: None,
};

/// Returns PONG if no argument is provided, otherwise return a copy of the argument.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping {
    pub payload: Option<String>,
}

impl Executable for Ping {
    fn exec(self, _store: &Store) -> Frame {
        Frame::Simple(self.payload.unwrap_or_else(|| "PONG".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let payload = parser.next_optional_string()?;
        parser.finish()?;

        Ok(Self { payload })
    }
}
