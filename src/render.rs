//! Terminal rendering of [`Response`] values.
//!
//! Output is meant for humans. With colors enabled every semantic category is wrapped in ANSI
//! escapes, so colored output must not be parsed by other programs.

use std::fmt;
use std::io::{self, Write};

use crate::frame::Frame;
use crate::response::{HashField, Response, SortedSetMember};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Re-indent values that look like JSON objects or arrays.
    pub pretty: bool,
    pub no_color: bool,
}

/// ANSI sequences for each semantic category. The plain palette uses empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub key: &'static str,
    pub string: &'static str,
    pub number: &'static str,
    pub field: &'static str,
    pub member: &'static str,
    pub score: &'static str,
    pub error: &'static str,
    pub reset: &'static str,
}

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

impl Palette {
    pub const fn ansi() -> Palette {
        Palette {
            key: CYAN,
            string: GREEN,
            number: YELLOW,
            field: YELLOW,
            member: GREEN,
            score: YELLOW,
            error: RED,
            reset: RESET,
        }
    }

    pub const fn plain() -> Palette {
        Palette {
            key: "",
            string: "",
            number: "",
            field: "",
            member: "",
            score: "",
            error: "",
            reset: "",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    options: RenderOptions,
    palette: Palette,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Renderer {
        let palette = if options.no_color {
            Palette::plain()
        } else {
            Palette::ansi()
        };

        Renderer { options, palette }
    }

    pub fn render(&self, response: &Response, out: &mut impl Write) -> io::Result<()> {
        match response {
            Response::Nil => writeln!(out, "(nil)"),
            Response::Text(s) => self.text(s, out),
            Response::Integer(n) => {
                let p = &self.palette;
                writeln!(out, "{}{}{}", p.number, n, p.reset)
            }
            Response::StringList(items) => self.string_list(items, out),
            Response::HashFields(fields) => self.hash(fields, out),
            Response::SortedSetMembers(members) => self.sorted_set(members, out),
            Response::Other(frame) => self.structured(frame, out),
        }
    }

    /// Writes a colored message to `out` as is; no newline is appended.
    pub fn error(&self, out: &mut impl Write, args: fmt::Arguments<'_>) -> io::Result<()> {
        let p = &self.palette;
        write!(out, "{}{}{}", p.error, args, p.reset)
    }

    /// Writes a colored message to `out` as is; no newline is appended.
    pub fn success(&self, out: &mut impl Write, args: fmt::Arguments<'_>) -> io::Result<()> {
        let p = &self.palette;
        write!(out, "{}{}{}", p.string, args, p.reset)
    }

    fn text(&self, s: &str, out: &mut impl Write) -> io::Result<()> {
        let p = &self.palette;
        let s = self.maybe_pretty(s);
        writeln!(out, "{}{}{}", p.string, s, p.reset)
    }

    fn string_list(&self, items: &[String], out: &mut impl Write) -> io::Result<()> {
        if items.is_empty() {
            return writeln!(out, "(empty array)");
        }

        let p = &self.palette;
        for (i, item) in items.iter().enumerate() {
            writeln!(
                out,
                "{}{}){} {}{}{}",
                p.number,
                i + 1,
                p.reset,
                p.string,
                item,
                p.reset
            )?;
        }
        Ok(())
    }

    fn hash(&self, fields: &[HashField], out: &mut impl Write) -> io::Result<()> {
        if fields.is_empty() {
            return writeln!(out, "(empty hash)");
        }

        let p = &self.palette;
        for HashField { key, value } in fields {
            writeln!(out, "{}field:{} {}{}{}", p.field, p.reset, p.key, key, p.reset)?;
            let value = self.maybe_pretty(value);
            writeln!(out, "{}value:{} {}{}{}", p.field, p.reset, p.string, value, p.reset)?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn sorted_set(&self, members: &[SortedSetMember], out: &mut impl Write) -> io::Result<()> {
        if members.is_empty() {
            return writeln!(out, "(empty sorted set)");
        }

        let p = &self.palette;
        for SortedSetMember { score, member } in members {
            writeln!(out, "{}score:{} {}{}{}", p.score, p.reset, p.number, score, p.reset)?;
            writeln!(out, "{}member:{} {}{}{}", p.member, p.reset, p.string, member, p.reset)?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn structured(&self, frame: &Frame, out: &mut impl Write) -> io::Result<()> {
        let p = &self.palette;
        match serde_json::to_string_pretty(&to_json(frame)) {
            Ok(json) => writeln!(out, "{}{}{}", p.string, json, p.reset),
            Err(_) => writeln!(out, "{}", frame),
        }
    }

    /// Re-indents `s` when pretty mode is on and it parses as JSON, otherwise returns it as is.
    fn maybe_pretty(&self, s: &str) -> String {
        if !self.options.pretty || !looks_like_json(s) {
            return s.to_string();
        }

        serde_json::from_str::<serde_json::Value>(s)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or_else(|_| s.to_string())
    }
}

/// Cheap check before attempting a real parse: `{...}` or `[...]` once trimmed.
pub fn looks_like_json(s: &str) -> bool {
    let s = s.trim();
    (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'))
}

fn to_json(frame: &Frame) -> serde_json::Value {
    use serde_json::Value;

    match frame {
        Frame::Simple(s) | Frame::Error(s) => Value::String(s.clone()),
        Frame::Bulk(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Frame::Integer(i) => Value::from(*i),
        Frame::Double(d) => serde_json::Number::from_f64(*d)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(d.to_string())),
        Frame::Boolean(b) => Value::Bool(*b),
        Frame::Null => Value::Null,
        Frame::Array(frames) => Value::Array(frames.iter().map(to_json).collect()),
    }
}
