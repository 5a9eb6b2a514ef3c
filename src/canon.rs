use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};

/// Separator layout of the emitted JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `,` and `:` with no whitespace.
    Compact,
    /// `, ` between items and `: ` after keys.
    Spaced,
}

/// Serializes `value` with object keys sorted and every non-ASCII character
/// escaped as `\uXXXX`. The service hashes the exact text it receives, so the
/// byte layout here is part of the wire contract.
pub fn canonical_json_string(value: &Value, layout: Layout) -> serde_json::Result<String> {
    fn stable(v: &Value) -> Value {
        match v {
            Value::Object(m) => {
                let mut keys: Vec<_> = m.keys().cloned().collect();
                keys.sort();
                let mut out = Map::new();
                for k in keys {
                    out.insert(k.clone(), stable(&m[&k]));
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(stable).collect()),
            _ => v.clone(),
        }
    }

    let s = stable(value);
    let mut buf = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut buf, AsciiFormatter { layout });
    s.serialize(&mut ser)?;
    String::from_utf8(buf)
        .map_err(|e| serde_json::Error::io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

struct AsciiFormatter {
    layout: Layout,
}

impl AsciiFormatter {
    fn separator(&self) -> &'static [u8] {
        match self.layout {
            Layout::Compact => b",",
            Layout::Spaced => b", ",
        }
    }
}

impl Formatter for AsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.separator())
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.separator())
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match self.layout {
            Layout::Compact => writer.write_all(b":"),
            Layout::Spaced => writer.write_all(b": "),
        }
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
