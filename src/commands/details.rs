use crate::frame::Frame;

/// Static description of a command, as reported by `COMMAND`.
///
/// Fields are serialized in the order Redis uses for `COMMAND INFO` replies. Optional fields that
/// are not tracked yet are rendered as nulls.
///
/// Ref: <https://redis.io/docs/latest/commands/command/>
#[derive(Debug, PartialEq)]
pub struct Details {
    pub name: &'static str,
    /// Positive values are an exact argument count including the command name, negative values a
    /// minimum.
    pub arity: i64,
    pub flags: Option<&'static [&'static str]>,
    pub first_key: i64,
    pub last_key: i64,
    pub step: i64,
    pub acl_categories: &'static [&'static str],
    pub tips: Option<&'static [&'static str]>,
    pub key_specifications: Option<&'static [&'static str]>,
    pub subcommands: Option<&'static [Details]>,
}

impl Details {
    pub fn is_write(&self) -> bool {
        self.acl_categories.contains(&"@write")
    }

    pub fn to_frame(&self) -> Frame {
        Frame::Array(vec![
            Frame::Simple(self.name.to_string()),
            Frame::Integer(self.arity),
            optional_strings(self.flags),
            Frame::Integer(self.first_key),
            Frame::Integer(self.last_key),
            Frame::Integer(self.step),
            strings(self.acl_categories),
            optional_strings(self.tips),
            optional_strings(self.key_specifications),
            self.subcommands
                .map_or(Frame::Null, |subcommands| {
                    Frame::Array(subcommands.iter().map(Details::to_frame).collect())
                }),
        ])
    }
}

fn strings(values: &[&str]) -> Frame {
    Frame::Array(
        values
            .iter()
            .map(|value| Frame::Simple(value.to_string()))
            .collect(),
    )
}

fn optional_strings(values: Option<&[&str]>) -> Frame {
    values.map_or(Frame::Null, strings)
}
