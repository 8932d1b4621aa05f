use bytes::Bytes;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "get",
    arity: 2,
    flags: Some(&["readonly", "fast"]),
    first_key: 1,
    last_key: 1,
    step: 1,
    acl_categories: &["@read", "@string", "@fast"],
    tips: None,
    key_specifications: None,
    subcommands: None,
};

/// Get the value of `key`. If the key does not exist the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: Bytes,
}

impl Executable for Get {
    fn exec(self, store: &Store) -> Frame {
        match store.get(&self.key) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key })
    }
}
