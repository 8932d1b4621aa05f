use bytes::Bytes;

use crate::commands::details::Details;
use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

pub const DETAILS: Details = Details {
    name: "hgetall",
    arity: 2,
    flags: Some(&["readonly"]),
    first_key: 1,
    last_key: 1,
    step: 1,
    acl_categories: &["@read", "@hash", "@slow"],
    tips: Some(&["nondeterministic_output_order"]),
    key_specifications: None,
    subcommands: None,
};

/// Returns all fields and values of the hash stored at `key`, flattened as
/// `field1, value1, field2, value2, ...`. The order is unspecified and may change between calls.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
#[derive(Debug, PartialEq)]
pub struct Hgetall {
    pub key: Bytes,
}

impl Executable for Hgetall {
    fn exec(self, store: &Store) -> Frame {
        let Some(pairs) = store.hgetall(&self.key) else {
            return Frame::Null;
        };

        let frames = pairs
            .into_iter()
            .flat_map(|(field, value)| [Frame::Bulk(field), Frame::Bulk(value)])
            .collect();

        Frame::Array(frames)
    }
}

impl TryFrom<&mut CommandParser> for Hgetall {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        parser.finish()?;

        Ok(Self { key })
    }
}
