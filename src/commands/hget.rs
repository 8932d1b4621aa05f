use bytes::Bytes;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "hget",
    arity: 3,
    flags: Some(&["readonly", "fast"]),
    first_key: 1,
    last_key: 1,
    step: 1,
    acl_categories: &["@read", "@hash", "@fast"],
    tips: None,
    key_specifications: None,
    subcommands: None,
};

/// Returns the value associated with `field` in the hash stored at `key`, or `nil` when either
/// the hash or the field is missing.
///
/// Ref: <https://redis.io/docs/latest/commands/hget/>
#[derive(Debug, PartialEq)]
pub struct Hget {
    pub key: Bytes,
    pub field: Bytes,
}

impl Executable for Hget {
    fn exec(self, store: &Store) -> Frame {
        store
            .hget(&self.key, &self.field)
            .map_or(Frame::Null, Frame::Bulk)
    }
}

impl TryFrom<&mut CommandParser> for Hget {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let field = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key, field })
    }
}
