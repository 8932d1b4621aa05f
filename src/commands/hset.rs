use bytes::Bytes;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "hset",
    arity: 4,
    flags: Some(&["write", "denyoom", "fast"]),
    first_key: 1,
    last_key: 1,
    step: 1,
    acl_categories: &["@write", "@hash", "@fast"],
    tips: None,
    key_specifications: None,
    subcommands: None,
};

/// Sets `field` in the hash stored at `key` to `value`. A new hash is created if `key` does not
/// exist. Only a single field/value pair is accepted per call.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
#[derive(Debug, PartialEq)]
pub struct Hset {
    pub key: Bytes,
    pub field: Bytes,
    pub value: Bytes,
}

impl Executable for Hset {
    fn exec(self, store: &Store) -> Frame {
        store.hset(self.key, self.field, self.value);

        Frame::Simple("OK".to_string())
    }
}

impl TryFrom<&mut CommandParser> for Hset {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let field = parser.next_bytes()?;
        let value = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key, field, value })
    }
}
