// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    /// Invalid message encoding.
    #[error("{0}")]
    Other(crate::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Boolean(bool),
    Double(f64),
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    /// Builds the request a client sends for `name args...`: an array of bulk strings.
    pub fn command<S: AsRef<str>>(name: &str, args: &[S]) -> Frame {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(Frame::Bulk(Bytes::copy_from_slice(name.as_bytes())));
        for arg in args {
            parts.push(Frame::Bulk(Bytes::copy_from_slice(arg.as_ref().as_bytes())));
        }
        Frame::Array(parts)
    }

    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => Ok(Frame::Simple(get_line(src)?)),
            // Big numbers have no native representation, they are kept as their decimal text.
            DataType::BigNumber => Ok(Frame::Simple(get_line(src)?)),
            DataType::SimpleError => Ok(Frame::Error(get_line(src)?)),
            DataType::Integer => {
                let integer = get_line(src)?
                    .parse::<i64>()
                    .map_err(|e| Error::Other(Box::new(e)))?;

                Ok(Frame::Integer(integer))
            }
            DataType::Boolean => match get_frame_bytes(src)? {
                b"t" => Ok(Frame::Boolean(true)),
                b"f" => Ok(Frame::Boolean(false)),
                _ => Err("protocol error; invalid boolean".into()),
            },
            DataType::Double => {
                let line = get_line(src)?;
                let double = match line.as_str() {
                    "inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    s => s.parse::<f64>().map_err(|e| Error::Other(Box::new(e)))?,
                };

                Ok(Frame::Double(double))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => Ok(Frame::Bulk(get_sized_bytes(src, length)?)),
            },
            // =<length>\r\n<encoding>:<data>\r\n
            DataType::VerbatimString => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let mut data = get_sized_bytes(src, length)?;
                    // The three byte encoding and its colon are not part of the value.
                    if data.len() >= 4 && data[3] == b':' {
                        data.advance(4);
                    }
                    Ok(Frame::Bulk(data))
                }
            },
            // !<length>\r\n<error>\r\n
            DataType::BulkError => match get_length(src)? {
                // NOTE: the protocol does not specify a way to represent a null bulk error
                None => Ok(Frame::Null),
                Some(length) => {
                    let msg = get_sized_bytes(src, length)?;
                    let msg = String::from_utf8(msg.to_vec())?;
                    Ok(Frame::Error(msg))
                }
            },
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array | DataType::Set | DataType::Push => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(length) => {
                    let mut frames = Vec::with_capacity(reserve(src, length));
                    for _ in 0..length {
                        frames.push(Self::parse(src)?);
                    }
                    Ok(Frame::Array(frames))
                }
            },
            // %<number-of-entries>\r\n<key-1><value-1>...<key-n><value-n>
            //
            // Maps are flattened into the same alternating layout RESP2 uses for hashes.
            DataType::Map => match get_length(src)? {
                None => Ok(Frame::Null),
                Some(entries) => {
                    let length = entries
                        .checked_mul(2)
                        .ok_or_else(|| format!("protocol error; invalid map length {}", entries))?;
                    let mut frames = Vec::with_capacity(reserve(src, length));
                    for _ in 0..length {
                        frames.push(Self::parse(src)?);
                    }
                    Ok(Frame::Array(frames))
                }
            },
            DataType::Null => {
                // Advance the cursor to the end of the frame.
                let _ = get_frame_bytes(src)?;

                Ok(Frame::Null)
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Integer(i) => {
                let i = i.to_string();
                let mut bytes = Vec::with_capacity(1 + i.len() + CRLF.len());
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(i.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Bulk(bytes) => {
                let length_str = bytes.len().to_string();
                let mut result = Vec::with_capacity(
                    1 + length_str.len() + CRLF.len() + bytes.len() + CRLF.len(),
                );
                result.push(u8::from(DataType::BulkString));
                result.extend_from_slice(length_str.as_bytes());
                result.extend_from_slice(CRLF);
                result.extend_from_slice(bytes);
                result.extend_from_slice(CRLF);
                result
            }
            Frame::Null => {
                let mut bytes = Vec::with_capacity(3);
                bytes.push(u8::from(DataType::Null));
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Boolean(b) => {
                let mut bytes = Vec::with_capacity(4);
                bytes.push(u8::from(DataType::Boolean));
                bytes.push(if *b { b't' } else { b'f' });
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Double(d) => {
                let d = d.to_string();
                let mut bytes = Vec::with_capacity(1 + d.len() + CRLF.len());
                bytes.push(u8::from(DataType::Double));
                bytes.extend_from_slice(d.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Array(arr) => {
                let length_str = arr.len().to_string();
                let mut bytes = Vec::with_capacity(1 + length_str.len() + CRLF.len());
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(length_str.as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    bytes.extend(frame.serialize());
                }
                bytes
            }
        }
    }

    /// Short name of the frame type, used in decoding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Null => "null",
            Frame::Boolean(_) => "boolean",
            Frame::Double(_) => "double",
            Frame::Array(_) => "array",
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "_"),
            Frame::Boolean(b) => write!(f, "#{}", if *b { 't' } else { 'f' }),
            Frame::Double(d) => write!(f, ",{}", d),
            Frame::Array(arr) => {
                write!(f, "*{}[", arr.len())?;
                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", frame)?;
                }
                write!(f, "]")
            }
        }
    }
}

fn get_frame_bytes<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    if start > end {
        return Err(Error::Incomplete);
    }

    let frame_end_position = src.get_ref()[start..end]
        .windows(2)
        .position(|window| window == CRLF)
        .ok_or(Error::Incomplete)
        .map(|index| start + index)?;

    src.set_position((frame_end_position + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..frame_end_position])
}

fn get_line(src: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let bytes = get_frame_bytes(src)?.to_vec();
    Ok(String::from_utf8(bytes)?)
}

/// Reads a length header. `-1` is the RESP2 null marker and maps to `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let length = get_line(src)?
        .parse::<isize>()
        .map_err(|e| Error::Other(Box::new(e)))?;

    match length {
        -1 => Ok(None),
        length if length < 0 => Err(format!("protocol error; invalid length {}", length).into()),
        length => Ok(Some(length as usize)),
    }
}

/// Reads exactly `length` bytes followed by CRLF. The payload may itself contain CRLF.
fn get_sized_bytes(src: &mut Cursor<&[u8]>, length: usize) -> Result<Bytes, Error> {
    let start = src.position() as usize;
    let end = start
        .checked_add(length)
        .ok_or_else(|| format!("protocol error; invalid length {}", length))?;

    if src.get_ref().len() < end + CRLF.len() {
        return Err(Error::Incomplete);
    }

    if &src.get_ref()[end..end + CRLF.len()] != CRLF {
        return Err("protocol error; bulk data is not terminated by CRLF".into());
    }

    let data = Bytes::copy_from_slice(&src.get_ref()[start..end]);
    src.set_position((end + CRLF.len()) as u64);

    Ok(data)
}

/// Every element takes at least one byte, so a declared count never reserves more slots than
/// there are bytes left to read.
fn reserve(src: &Cursor<&[u8]>, length: usize) -> usize {
    length.min(src.remaining())
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString,   // '+'
    BulkString,     // '$'
    VerbatimString, // '='
    SimpleError,    // '-'
    BulkError,      // '!'
    Boolean,        // '#'
    Integer,        // ':'
    Double,         // ','
    BigNumber,      // '('
    Array,          // '*'
    Map,            // '%'
    Set,            // '~'
    Push,           // '>'
    // Due to historical reasons, RESP2 features two specially crafted values for representing null
    // values of bulk strings and arrays. This duality has always been a redundancy that added zero
    // semantical value to the protocol itself. The null type, introduced in RESP3, aims to fix
    // this wrong.
    Null, // '_'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'!' => Ok(Self::BulkError),
            b'*' => Ok(Self::Array),
            b'_' => Ok(Self::Null),
            b'#' => Ok(Self::Boolean),
            b',' => Ok(Self::Double),
            b'(' => Ok(Self::BigNumber),
            b'=' => Ok(Self::VerbatimString),
            b'%' => Ok(Self::Map),
            b'~' => Ok(Self::Set),
            b'>' => Ok(Self::Push),
            _ => Err(Error::InvalidDataType(byte)),
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
            DataType::BulkError => b'!',
            DataType::Array => b'*',
            DataType::Null => b'_',
            DataType::Boolean => b'#',
            DataType::Double => b',',
            DataType::BigNumber => b'(',
            DataType::VerbatimString => b'=',
            DataType::Map => b'%',
            DataType::Set => b'~',
            DataType::Push => b'>',
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "protocol error; invalid frame format".into()
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Other(src.into())
    }
}
