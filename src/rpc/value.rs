//! Owned value tree for the packed-value format.
//!
//! Handlers on the device write straight through [`Pack`]; this type is
//! for the places where a whole tree is easier to handle at once (client
//! requests, host tools, tests).

use super::pack::{Kind, Pack, PackError, WORD};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Stored in whole words; reads back zero-padded to a multiple of 4.
    Binary(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Encode this tree at the writer's position.
    pub fn write_to(&self, pack: &mut Pack<'_>) -> Result<(), PackError> {
        match self {
            Self::None => pack.put_none(),
            Self::Bool(v) => pack.put_boolean(*v),
            Self::Int(v) => pack.put_integer(*v),
            Self::BigInt(v) => pack.put_big_integer(*v),
            Self::Float(v) => pack.put_float(*v),
            Self::Double(v) => pack.put_double(*v),
            Self::String(v) => pack.put_string(v),
            Self::Binary(v) => pack.put_binary(v),
            Self::List(items) => {
                pack.create_container(Kind::List)?;
                for item in items {
                    item.write_to(pack)?;
                }
                pack.finish_container()
            }
            Self::Map(entries) => {
                pack.create_container(Kind::Map)?;
                for (key, value) in entries {
                    key.write_to(pack)?;
                    value.write_to(pack)?;
                }
                pack.finish_container()
            }
        }
    }

    /// Decode the element the reader currently points at. Containers are
    /// entered and left again, so the reader ends on the same element.
    pub fn read_from(pack: &mut Pack<'_>) -> Result<Self, PackError> {
        let kind = pack.kind().ok_or(PackError::WrongKind)?;
        let wide = pack.content_length() == 2;
        let value = match kind {
            Kind::None => Self::None,
            Kind::False | Kind::True => Self::Bool(pack.get_boolean()?),
            Kind::Integer if wide => Self::BigInt(pack.get_big_integer()?),
            Kind::Integer => Self::Int(pack.get_integer()?),
            Kind::Float if wide => Self::Double(pack.get_double()?),
            Kind::Float => Self::Float(pack.get_float()?),
            Kind::String => {
                let mut bytes = vec![0u8; pack.content_length() * WORD];
                let length = pack.get_string(&mut bytes)?;
                bytes.truncate(length);
                Self::String(String::from_utf8(bytes).map_err(|_| PackError::InvalidUtf8)?)
            }
            Kind::Binary => {
                let mut bytes = vec![0u8; pack.content_length() * WORD];
                pack.get_binary(&mut bytes)?;
                Self::Binary(bytes)
            }
            Kind::List => {
                pack.open()?;
                let mut items = Vec::new();
                while pack.next() {
                    items.push(Self::read_from(pack)?);
                }
                pack.close()?;
                Self::List(items)
            }
            Kind::Map => {
                pack.open()?;
                let mut entries = Vec::new();
                while pack.next() {
                    let key = Self::read_from(pack)?;
                    if !pack.next() {
                        return Err(PackError::Truncated);
                    }
                    entries.push((key, Self::read_from(pack)?));
                }
                pack.close()?;
                Self::Map(entries)
            }
        };
        Ok(value)
    }

    /// Look up `key` in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Self::String(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
