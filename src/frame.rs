// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, BufMut, Bytes};
use std::io::Cursor;
use thiserror::Error as ThisError;
use tracing::warn;

static CRLF: &[u8; 2] = b"\r\n";

/// Deepest nesting of arrays and maps accepted within a single frame.
pub const MAX_NESTING_DEPTH: usize = 512;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("protocol error; invalid length {0:?}")]
    InvalidLength(String),
    #[error("protocol error; invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("protocol error; invalid frame format")]
    InvalidUtf8,
    #[error("protocol error; expected CRLF after bulk string payload")]
    MissingCrlf,
    #[error("protocol error; aggregates nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Frame>),
    /// Absence of a value. Null bulk strings and null arrays both decode to this variant.
    Null,
    /// Maps are not supported yet, any map is rendered as an empty one.
    Map,
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    // `depth` counts the arrays and maps enclosing the frame being parsed.
    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = match DataType::try_from(first_byte) {
            Ok(data_type) => data_type,
            Err(byte) => {
                // Unknown types are skipped one byte at a time rather than failing the stream.
                warn!(byte, "unknown frame data type");
                return Ok(Frame::Null);
            }
        };

        match data_type {
            DataType::SimpleString => {
                let string = get_line_string(src)?;
                Ok(Frame::Simple(string))
            }
            DataType::SimpleError => {
                let string = get_line_string(src)?;
                Ok(Frame::Error(string))
            }
            DataType::Integer => {
                let string = get_line_string(src)?;
                let integer = string
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidInteger(string))?;

                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::Null);
                };

                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }

                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                src.advance(length);

                if &src.chunk()[..CRLF.len()] != CRLF {
                    return Err(Error::MissingCrlf);
                }
                src.advance(CRLF.len());

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::Null);
                };

                // Every element takes at least three bytes, so the remaining buffer bounds the
                // allocation for a hostile length prefix.
                if length > 0 && depth >= MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
                }

                let mut frames = Vec::with_capacity(length.min(src.remaining() / 3));
                for _ in 0..length {
                    frames.push(Self::parse_nested(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            DataType::Map => {
                let Some(length) = get_length(src)? else {
                    return Ok(Frame::Null);
                };

                if length > 0 && depth >= MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
                }

                for _ in 0..length.saturating_mul(2) {
                    Self::parse_nested(src, depth + 1)?;
                }

                Ok(Frame::Map)
            }
            DataType::Null => {
                // Advance the cursor to the end of the frame.
                let _ = get_line(src)?;

                Ok(Frame::Null)
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.put_u8(u8::from(DataType::Integer));
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
            // RESP2 clients only understand the null bulk string, so it stands in for every
            // kind of missing value.
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Map => dst.put_slice(b"%0\r\n"),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Map => write!(f, "%0"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let line_end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&buf[start..line_end])
}

fn get_line_string(src: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let line = get_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|_| Error::InvalidUtf8)
}

/// Reads a length prefix. Negative lengths denote a null value and yield `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let line = get_line_string(src)?;
    let length = line
        .parse::<i64>()
        .map_err(|_| Error::InvalidLength(line.clone()))?;

    if length < 0 {
        return Ok(None);
    }

    usize::try_from(length)
        .map(Some)
        .map_err(|_| Error::InvalidLength(line))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    BulkString,   // '$'
    SimpleError,  // '-'
    Integer,      // ':'
    Array,        // '*'
    Map,          // '%'
    // RESP3 null, accepted on input only. Replies always use the RESP2 null bulk string.
    Null, // '_'
}

impl TryFrom<u8> for DataType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            b'%' => Ok(Self::Map),
            b'_' => Ok(Self::Null),
            _ => Err(byte),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
            DataType::Map => b'%',
            DataType::Null => b'_',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<Frame, Error> {
        let mut cursor = Cursor::new(data);
        Frame::parse(&mut cursor)
    }

    #[test]
    fn parse_simple_string_frame() {
        let frame = parse(b"+OK\r\n");

        assert!(matches!(frame, Ok(Frame::Simple(ref s)) if s == "OK"));
    }

    #[test]
    fn parse_simple_error_frame() {
        let frame = parse(b"-Error message\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Error(ref s)) if s == "Error message"
        ));
    }

    fn parse_integer_frame(data: &[u8], expected: i64) {
        let frame = parse(data);

        assert!(matches!(frame, Ok(Frame::Integer(i)) if i == expected));
    }

    #[test]
    fn parse_integer_frame_positive() {
        parse_integer_frame(b":1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_frame_negative() {
        parse_integer_frame(b":-1000\r\n", -1000);
    }

    #[test]
    fn parse_integer_frame_zero() {
        parse_integer_frame(b":0\r\n", 0);
    }

    #[test]
    fn parse_integer_frame_positive_signed() {
        parse_integer_frame(b":+1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_frame_not_a_number() {
        let frame = parse(b":12a\r\n");

        assert_eq!(frame, Err(Error::InvalidInteger("12a".to_string())));
    }

    #[test]
    fn parse_bulk_string_frame() {
        let frame = parse(b"$6\r\nfoobar\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::from("foobar"))));
    }

    #[test]
    fn parse_bulk_string_frame_with_crlf_in_payload() {
        let frame = parse(b"$8\r\nfoo\r\nbar\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::from("foo\r\nbar"))));
    }

    #[test]
    fn parse_bulk_string_frame_empty() {
        let frame = parse(b"$0\r\n\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::new())));
    }

    #[test]
    fn parse_bulk_string_frame_null() {
        let frame = parse(b"$-1\r\n");

        assert_eq!(frame, Ok(Frame::Null));
    }

    #[test]
    fn parse_bulk_string_frame_incomplete_payload() {
        let frame = parse(b"$6\r\nfoo");

        assert_eq!(frame, Err(Error::Incomplete));
    }

    #[test]
    fn parse_bulk_string_frame_missing_crlf() {
        let frame = parse(b"$3\r\nfoobar\r\n");

        assert_eq!(frame, Err(Error::MissingCrlf));
    }

    #[test]
    fn parse_bulk_string_frame_invalid_length() {
        let frame = parse(b"$abc\r\nfoo\r\n");

        assert_eq!(frame, Err(Error::InvalidLength("abc".to_string())));
    }

    #[test]
    fn parse_array_frame_empty() {
        let frame = parse(b"*0\r\n");

        assert_eq!(frame, Ok(Frame::Array(vec![])));
    }

    #[test]
    fn parse_array_frame() {
        let frame = parse(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Bulk(Bytes::from("world")),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_nested() {
        let frame = parse(b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Array(vec![
                    Frame::Integer(1),
                    Frame::Integer(2),
                    Frame::Integer(3)
                ]),
                Frame::Array(vec![
                    Frame::Simple("Hello".to_string()),
                    Frame::Error("World".to_string())
                ]),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_null() {
        let frame = parse(b"*-1\r\n");

        assert_eq!(frame, Ok(Frame::Null));
    }

    #[test]
    fn parse_array_frame_null_in_the_middle() {
        let frame = parse(b"*3\r\n$5\r\nhello\r\n$-1\r\n$5\r\nworld\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Null,
                Frame::Bulk(Bytes::from("world")),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_incomplete() {
        let frame = parse(b"*2\r\n$5\r\nhello\r\n");

        assert_eq!(frame, Err(Error::Incomplete));
    }

    #[test]
    fn parse_map_frame() {
        let frame = parse(b"%1\r\n+key\r\n:1\r\n");

        assert_eq!(frame, Ok(Frame::Map));
    }

    #[test]
    fn parse_resp3_null_frame() {
        let frame = parse(b"_\r\n");

        assert_eq!(frame, Ok(Frame::Null));
    }

    fn nested_arrays(depth: usize) -> Vec<u8> {
        let mut data = b"*1\r\n".repeat(depth);
        data.extend_from_slice(b":1\r\n");
        data
    }

    #[test]
    fn parse_array_frame_at_max_nesting_depth() {
        let mut frame = parse(&nested_arrays(MAX_NESTING_DEPTH)).unwrap();

        let mut depth = 0;
        while let Frame::Array(mut frames) = frame {
            frame = frames.remove(0);
            depth += 1;
        }

        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert_eq!(frame, Frame::Integer(1));
    }

    #[test]
    fn parse_array_frame_too_deep() {
        assert_eq!(
            parse(&nested_arrays(MAX_NESTING_DEPTH + 1)),
            Err(Error::NestingTooDeep(MAX_NESTING_DEPTH))
        );
    }

    #[test]
    fn parse_deeply_nested_input_fails_without_exhausting_the_stack() {
        // 800 KB of nesting, parsed on a thread with the 2 MiB stack tokio gives its workers.
        let data = nested_arrays(200_000);
        let res = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || parse(&data))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(res, Err(Error::NestingTooDeep(MAX_NESTING_DEPTH)));

        // The limit is checked before the buffer is complete.
        let partial = b"*1\r\n".repeat(MAX_NESTING_DEPTH + 1);
        assert_eq!(
            parse(&partial),
            Err(Error::NestingTooDeep(MAX_NESTING_DEPTH))
        );
    }

    #[test]
    fn parse_map_frame_too_deep() {
        let mut data = b"%1\r\n".repeat(MAX_NESTING_DEPTH + 1);
        data.extend_from_slice(b"+k\r\n+v\r\n");

        assert_eq!(parse(&data), Err(Error::NestingTooDeep(MAX_NESTING_DEPTH)));
    }

    #[test]
    fn parse_unknown_type_consumes_one_byte() {
        let data = b"?+OK\r\n";
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(Frame::parse(&mut cursor), Ok(Frame::Null));
        assert_eq!(cursor.position(), 1);
        assert_eq!(
            Frame::parse(&mut cursor),
            Ok(Frame::Simple("OK".to_string()))
        );
    }

    #[test]
    fn serialize_frames() {
        assert_eq!(Frame::Simple("OK".to_string()).serialize(), b"+OK\r\n");
        assert_eq!(Frame::Error("ERR bad".to_string()).serialize(), b"-ERR bad\r\n");
        assert_eq!(Frame::Integer(-42).serialize(), b":-42\r\n");
        assert_eq!(Frame::Bulk(Bytes::from("hey")).serialize(), b"$3\r\nhey\r\n");
        assert_eq!(Frame::Bulk(Bytes::new()).serialize(), b"$0\r\n\r\n");
        assert_eq!(Frame::Null.serialize(), b"$-1\r\n");
        assert_eq!(Frame::Map.serialize(), b"%0\r\n");
        assert_eq!(Frame::Array(vec![]).serialize(), b"*0\r\n");
    }

    #[test]
    fn serialize_request_array() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("SET")),
            Frame::Bulk(Bytes::from("key1")),
            Frame::Bulk(Bytes::from("value1")),
        ]);

        assert_eq!(
            frame.serialize(),
            b"*3\r\n$3\r\nSET\r\n$4\r\nkey1\r\n$6\r\nvalue1\r\n"
        );
    }

    #[test]
    fn serialized_frames_parse_back() {
        let frames = vec![
            Frame::Simple("hello world".to_string()),
            Frame::Error("ERR something".to_string()),
            Frame::Integer(i64::MIN),
            Frame::Bulk(Bytes::from_static(b"\x00\xffbinary\r\n")),
            Frame::Null,
            Frame::Map,
            Frame::Array(vec![
                Frame::Integer(7),
                Frame::Array(vec![Frame::Bulk(Bytes::new()), Frame::Array(vec![])]),
            ]),
        ];

        for frame in frames {
            let bytes = frame.serialize();
            assert_eq!(parse(&bytes), Ok(frame));
        }
    }
}
