use std::str::FromStr;

use strum_macros::{Display, EnumString, VariantNames};

use crate::frame::Frame;

/// A command line typed by the user: an upper-cased name and its positional arguments.
///
/// Arguments are whitespace separated, there is no quoting, so a value containing whitespace
/// cannot be expressed as a single argument.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Splits `line` on runs of whitespace. Never fails; a blank line yields an empty command.
    pub fn parse(line: &str) -> Command {
        let mut parts = line.split_whitespace();

        let name = match parts.next() {
            Some(name) => name.to_uppercase(),
            None => return Command::default(),
        };

        Command {
            name,
            args: parts.map(String::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_write(&self) -> bool {
        is_write_command(&self.name)
    }
}

impl From<&Command> for Frame {
    fn from(command: &Command) -> Frame {
        Frame::command(&command.name, &command.args)
    }
}

/// Commands that mutate server state and are refused unless the session is writable.
///
/// Anything not listed here, including commands the client does not know about, is treated
/// as a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum WriteCommand {
    // Strings
    Set,
    Setnx,
    Setex,
    Psetex,
    Mset,
    Msetnx,
    Getset,
    Append,
    Setrange,
    Incr,
    Incrby,
    Incrbyfloat,
    Decr,
    Decrby,

    // Keys
    Del,
    Unlink,
    Expire,
    Expireat,
    Pexpire,
    Pexpireat,
    Persist,

    // Hashes
    Hset,
    Hsetnx,
    Hmset,
    Hincrby,
    Hincrbyfloat,
    Hdel,

    // Lists
    Lpush,
    Rpush,
    Lpop,
    Rpop,
    Linsert,
    Lset,
    Ltrim,
    Rpoplpush,

    // Sets
    Sadd,
    Srem,
    Spop,
    Smove,
    Sinterstore,
    Sunionstore,
    Sdiffstore,

    // Sorted sets
    Zadd,
    Zincrby,
    Zrem,
    Zremrangebyrank,
    Zremrangebyscore,
    Zremrangebylex,
    Zunionstore,
    Zinterstore,

    // HyperLogLog
    Pfadd,
    Pfmerge,

    // Server and keyspace
    Publish,
    Rename,
    Renamenx,
    Migrate,
    Move,
    Restore,
    Dump,
    Flushdb,
    Flushall,
    Sort,
    Bitop,
    Geoadd,
}

/// Case-insensitive membership test against [`WriteCommand`].
pub fn is_write_command(name: &str) -> bool {
    WriteCommand::from_str(name).is_ok()
}

pub fn is_read_command(name: &str) -> bool {
    !is_write_command(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantNames as _;

    #[test]
    fn parse_uppercases_the_name_only() {
        let command = Command::parse("lrange MyList 0 -1");

        assert_eq!(command.name, "LRANGE");
        assert_eq!(command.args, vec!["MyList", "0", "-1"]);
    }

    #[test]
    fn parse_collapses_whitespace_runs() {
        let command = Command::parse("  set\tfoo   \"hello   world\"  ");

        assert_eq!(command.name, "SET");
        assert_eq!(command.args, vec!["foo", "\"hello", "world\""]);
    }

    #[test]
    fn parse_blank_lines_yield_an_empty_command() {
        for line in ["", " ", "\t\t", "  \r\n "] {
            let command = Command::parse(line);

            assert!(command.is_empty(), "{:?} should be empty", line);
            assert!(command.args.is_empty());
        }
    }

    #[test]
    fn write_commands_match_in_any_case() {
        assert_eq!(WriteCommand::VARIANTS.len(), 64);

        for name in WriteCommand::VARIANTS {
            assert!(is_write_command(name), "{}", name);
            assert!(is_write_command(&name.to_lowercase()), "{}", name);

            let mixed: String = name
                .chars()
                .enumerate()
                .map(|(i, c)| if i % 2 == 0 { c.to_ascii_lowercase() } else { c })
                .collect();
            assert!(is_write_command(&mixed), "{}", mixed);
            assert!(!is_read_command(&mixed));
        }
    }

    #[test]
    fn variants_serialize_to_command_names() {
        assert_eq!(WriteCommand::Incrbyfloat.to_string(), "INCRBYFLOAT");
        assert_eq!(WriteCommand::Zremrangebylex.to_string(), "ZREMRANGEBYLEX");
        assert_eq!(WriteCommand::from_str("geoadd"), Ok(WriteCommand::Geoadd));
    }

    #[test]
    fn unknown_and_read_commands_are_reads() {
        for name in ["", "GET", "hgetall", "LRANGE", "SETX", "FOOBAR", "SET "] {
            assert!(!is_write_command(name), "{:?}", name);
            assert!(is_read_command(name));
        }
    }

    #[test]
    fn command_converts_to_request_frame() {
        let frame = Frame::from(&Command::parse("get foo"));

        assert_eq!(frame, Frame::command("GET", &["foo"]));
    }
}
