use std::fmt;

use bytes::Bytes;
use itertools::Itertools;
use strum_macros::Display;
use thiserror::Error as ThisError;

use crate::frame::Frame;

/// A reply from the store, decoded into the shapes the renderer knows how to display.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Nil,
    Text(String),
    Integer(i64),
    StringList(Vec<String>),
    HashFields(Vec<HashField>),
    SortedSetMembers(Vec<SortedSetMember>),
    /// Anything that has no dedicated shape, rendered as a structured dump.
    Other(Frame),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortedSetMember {
    pub score: Scalar,
    pub member: Scalar,
}

/// A dynamically typed scalar; scores arrive as text in RESP2 and as doubles in RESP3.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Double(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Double(d) => write!(f, "{}", d),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum DecodeError {
    #[error("unexpected reply type {actual} for {command}, expected {expected}")]
    UnexpectedReply {
        command: String,
        expected: Decoding,
        actual: &'static str,
    },
}

/// How the reply of a given command is interpreted.
///
/// The choice is driven by the command name, not by the shape of the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Decoding {
    Text,
    Integer,
    #[strum(serialize = "string list")]
    StringList,
    Hash,
    #[strum(serialize = "sorted set")]
    SortedSet,
    /// Map whatever came back onto the closest shape.
    Raw,
}

impl Decoding {
    pub fn for_command<S: AsRef<str>>(name: &str, args: &[S]) -> Decoding {
        match name.to_uppercase().as_str() {
            "GET" | "GETSET" | "GETDEL" | "GETEX" | "GETRANGE" | "HGET" | "TYPE" | "INFO"
            | "PING" | "ECHO" | "LINDEX" | "RPOPLPUSH" | "LMOVE" | "ZSCORE" | "INCRBYFLOAT"
            | "HINCRBYFLOAT" | "RANDOMKEY" | "DUMP" => Decoding::Text,

            // key [count]: a count turns the single value into a list.
            "LPOP" | "RPOP" | "SPOP" | "SRANDMEMBER" => {
                if args.len() > 1 {
                    Decoding::StringList
                } else {
                    Decoding::Text
                }
            }

            "EXISTS" | "TTL" | "PTTL" | "DBSIZE" | "LLEN" | "STRLEN" | "HLEN" | "HEXISTS"
            | "HSTRLEN" | "SCARD" | "SISMEMBER" | "ZCARD" | "ZCOUNT" | "ZLEXCOUNT" | "ZRANK"
            | "ZREVRANK" | "PFCOUNT" | "BITCOUNT" | "BITPOS" | "GETBIT" | "SETBIT" | "TOUCH"
            | "INCR" | "INCRBY" | "DECR" | "DECRBY" | "DEL" | "UNLINK" | "EXPIRE"
            | "EXPIREAT" | "PEXPIRE" | "PEXPIREAT" | "PERSIST" | "HSET" | "HSETNX" | "HDEL"
            | "HINCRBY" | "LPUSH" | "RPUSH" | "LINSERT" | "SADD" | "SREM" | "SMOVE"
            | "SINTERSTORE" | "SUNIONSTORE" | "SDIFFSTORE" | "ZADD" | "ZREM"
            | "ZREMRANGEBYRANK" | "ZREMRANGEBYSCORE" | "ZREMRANGEBYLEX" | "ZUNIONSTORE"
            | "ZINTERSTORE" | "PFADD" | "PUBLISH" | "RENAMENX" | "MOVE" | "SETNX" | "MSETNX"
            | "APPEND" | "SETRANGE" | "BITOP" | "GEOADD" | "LASTSAVE" => Decoding::Integer,

            "LRANGE" | "SMEMBERS" | "SINTER" | "SUNION" | "SDIFF" | "KEYS" | "HKEYS"
            | "HVALS" => Decoding::StringList,

            "HGETALL" => Decoding::Hash,

            "ZRANGE" | "ZREVRANGE" | "ZRANGEBYSCORE" | "ZREVRANGEBYSCORE" => {
                let with_scores = args
                    .iter()
                    .any(|arg| arg.as_ref().eq_ignore_ascii_case("WITHSCORES"));
                if with_scores {
                    Decoding::SortedSet
                } else {
                    Decoding::StringList
                }
            }

            "SET" | "MGET" | "HMGET" | "SCAN" | "HSCAN" | "SSCAN" | "ZSCAN" | "CONFIG"
            | "COMMAND" | "SORT" | "TIME" | "SLOWLOG" | "MEMORY" | "XRANGE" | "XREVRANGE"
            | "XINFO" | "GEOPOS" | "GEODIST" | "EVAL" | "EVALSHA" | "OBJECT" | "CLIENT" => {
                Decoding::Raw
            }

            _ => Decoding::Text,
        }
    }

    pub fn decode(self, command: &str, frame: Frame) -> Result<Response, DecodeError> {
        let unexpected = |frame: &Frame| DecodeError::UnexpectedReply {
            command: command.to_string(),
            expected: self,
            actual: frame.kind(),
        };

        // A null reply means the same thing whatever shape was expected.
        if frame == Frame::Null {
            return Ok(Response::Nil);
        }

        match self {
            Decoding::Text => match frame {
                Frame::Simple(s) => Ok(Response::Text(s)),
                Frame::Bulk(bytes) => Ok(Response::Text(lossy(&bytes))),
                frame => Err(unexpected(&frame)),
            },
            Decoding::Integer => match frame {
                Frame::Integer(i) => Ok(Response::Integer(i)),
                Frame::Simple(ref s) => s
                    .parse()
                    .map(Response::Integer)
                    .map_err(|_| unexpected(&frame)),
                Frame::Bulk(ref bytes) => lossy(bytes)
                    .parse()
                    .map(Response::Integer)
                    .map_err(|_| unexpected(&frame)),
                frame => Err(unexpected(&frame)),
            },
            Decoding::StringList => match frame {
                Frame::Array(frames) => frames
                    .into_iter()
                    .map(|frame| text(frame).map_err(|frame| unexpected(&frame)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Response::StringList),
                frame => Err(unexpected(&frame)),
            },
            Decoding::Hash => match frame {
                Frame::Array(frames) => frames
                    .into_iter()
                    .map(|frame| text(frame).map_err(|frame| unexpected(&frame)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|values| {
                        // A trailing element without a partner is dropped.
                        values
                            .into_iter()
                            .tuples()
                            .map(|(key, value)| HashField { key, value })
                            .collect()
                    })
                    .map(Response::HashFields),
                frame => Err(unexpected(&frame)),
            },
            Decoding::SortedSet => match frame {
                Frame::Array(frames) => frames
                    .into_iter()
                    .map(|frame| scalar(frame).map_err(|frame| unexpected(&frame)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|values| {
                        // WITHSCORES replies alternate member, score.
                        values
                            .into_iter()
                            .tuples()
                            .map(|(member, score)| SortedSetMember { score, member })
                            .collect()
                    })
                    .map(Response::SortedSetMembers),
                frame => Err(unexpected(&frame)),
            },
            Decoding::Raw => Ok(match frame {
                Frame::Simple(s) => Response::Text(s),
                Frame::Bulk(bytes) => Response::Text(lossy(&bytes)),
                Frame::Integer(i) => Response::Integer(i),
                frame => Response::Other(frame),
            }),
        }
    }
}

fn lossy(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Element of a list reply as text. The frame is handed back when it has no text form.
fn text(frame: Frame) -> Result<String, Frame> {
    match frame {
        Frame::Simple(s) => Ok(s),
        Frame::Bulk(bytes) => Ok(lossy(&bytes)),
        Frame::Integer(i) => Ok(i.to_string()),
        Frame::Double(d) => Ok(d.to_string()),
        frame => Err(frame),
    }
}

fn scalar(frame: Frame) -> Result<Scalar, Frame> {
    match frame {
        Frame::Simple(s) => Ok(Scalar::Text(s)),
        Frame::Bulk(bytes) => Ok(Scalar::Text(lossy(&bytes))),
        Frame::Integer(i) => Ok(Scalar::Integer(i)),
        Frame::Double(d) => Ok(Scalar::Double(d)),
        frame => Err(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    fn decode(line: &[&str], frame: Frame) -> Result<Response, DecodeError> {
        let (name, args) = line.split_first().unwrap();
        Decoding::for_command(name, args).decode(name, frame)
    }

    #[test]
    fn strategy_is_picked_by_command_name() {
        let none: [&str; 0] = [];

        assert_eq!(Decoding::for_command("get", &none), Decoding::Text);
        assert_eq!(Decoding::for_command("DBSIZE", &none), Decoding::Integer);
        assert_eq!(Decoding::for_command("KEYS", &none), Decoding::StringList);
        assert_eq!(Decoding::for_command("HGETALL", &none), Decoding::Hash);
        assert_eq!(Decoding::for_command("SET", &none), Decoding::Raw);
        assert_eq!(Decoding::for_command("WHATEVER", &none), Decoding::Text);
    }

    #[test]
    fn zrange_needs_withscores_to_be_a_sorted_set() {
        assert_eq!(
            Decoding::for_command("ZRANGE", &["z", "0", "-1"]),
            Decoding::StringList
        );
        assert_eq!(
            Decoding::for_command("ZRANGE", &["z", "0", "-1", "withscores"]),
            Decoding::SortedSet
        );
    }

    #[test]
    fn pops_with_a_count_are_lists() {
        for name in ["LPOP", "rpop", "SPOP", "SRANDMEMBER"] {
            assert_eq!(Decoding::for_command(name, &["k"]), Decoding::Text);
            assert_eq!(Decoding::for_command(name, &["k", "2"]), Decoding::StringList);
        }

        assert_eq!(
            decode(&["SPOP", "s", "2"], Frame::Array(vec![bulk("a"), bulk("b")])),
            Ok(Response::StringList(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            decode(&["LPOP", "l"], bulk("a")),
            Ok(Response::Text("a".to_string()))
        );
    }

    #[test]
    fn null_reply_is_nil() {
        assert_eq!(decode(&["GET", "missing"], Frame::Null), Ok(Response::Nil));
        assert_eq!(decode(&["LRANGE", "l", "0", "1"], Frame::Null), Ok(Response::Nil));
    }

    #[test]
    fn text_decoding_rejects_other_shapes() {
        let err = decode(&["INCRX", "counter"], Frame::Integer(3)).unwrap_err();

        assert_eq!(
            err.to_string(),
            "unexpected reply type integer for INCRX, expected text"
        );
    }

    #[test]
    fn integer_decoding() {
        assert_eq!(decode(&["TTL", "k"], Frame::Integer(-2)), Ok(Response::Integer(-2)));
        assert!(decode(&["TTL", "k"], bulk("soon")).is_err());
    }

    #[test]
    fn list_decoding_preserves_order() {
        let reply = Frame::Array(vec![bulk("a"), bulk("b")]);

        assert_eq!(
            decode(&["LRANGE", "mylist", "0", "-1"], reply),
            Ok(Response::StringList(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn hash_decoding_pairs_adjacent_elements_and_drops_the_odd_one() {
        let reply = Frame::Array(vec![bulk("f1"), bulk("v1"), bulk("f2"), bulk("v2"), bulk("f3")]);

        assert_eq!(
            decode(&["HGETALL", "h"], reply),
            Ok(Response::HashFields(vec![
                HashField {
                    key: "f1".to_string(),
                    value: "v1".to_string()
                },
                HashField {
                    key: "f2".to_string(),
                    value: "v2".to_string()
                },
            ]))
        );
    }

    #[test]
    fn sorted_set_decoding_reads_member_then_score() {
        let reply = Frame::Array(vec![bulk("alice"), bulk("1.5"), bulk("bob"), Frame::Double(2.0)]);

        assert_eq!(
            decode(&["ZRANGE", "z", "0", "-1", "WITHSCORES"], reply),
            Ok(Response::SortedSetMembers(vec![
                SortedSetMember {
                    score: Scalar::Text("1.5".to_string()),
                    member: Scalar::Text("alice".to_string()),
                },
                SortedSetMember {
                    score: Scalar::Double(2.0),
                    member: Scalar::Text("bob".to_string()),
                },
            ]))
        );
    }

    #[test]
    fn raw_decoding_keeps_nested_replies() {
        assert_eq!(
            decode(&["SET", "k", "v"], Frame::Simple("OK".to_string())),
            Ok(Response::Text("OK".to_string()))
        );

        let reply = Frame::Array(vec![bulk("0"), Frame::Array(vec![bulk("k1")])]);
        assert_eq!(
            decode(&["SCAN", "0"], reply.clone()),
            Ok(Response::Other(reply))
        );
    }
}
