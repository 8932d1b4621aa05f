use strum::IntoEnumIterator;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandName, CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "command",
    arity: -1,
    flags: Some(&["loading", "stale"]),
    first_key: 0,
    last_key: 0,
    step: 0,
    acl_categories: &["@slow", "@connection"],
    tips: Some(&["nondeterministic_output_order"]),
    key_specifications: None,
    subcommands: None,
};

/// Returns details about every command, or their documentation with the `DOCS` subcommand.
/// Documentation is not tracked, so `DOCS` always replies with an empty map.
///
/// Ref: <https://redis.io/docs/latest/commands/command/>
#[derive(Debug, PartialEq)]
pub enum Command {
    List,
    Docs,
}

impl Executable for Command {
    fn exec(self, _store: &Store) -> Frame {
        match self {
            Command::List => Frame::Array(
                CommandName::iter()
                    .map(|name| name.details().to_frame())
                    .collect(),
            ),
            Command::Docs => Frame::Map,
        }
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let sub_command = parser.next_optional_string()?;
        parser.finish()?;

        match sub_command {
            None => Ok(Command::List),
            Some(sub_command) if sub_command.eq_ignore_ascii_case("docs") => Ok(Command::Docs),
            Some(_) => Err(CommandParserError::InvalidCommandArgument { index: 1 }),
        }
    }
}
