//! The PDF value model: atomic values, Names, ObjectIds, and the transient
//! `Value` tree produced internally by the value-capture sink.
//!
//! Nothing here is retained by the core past a single sink callback except
//! `ObjectId`s and `Name`s threaded through the traversal and xref
//! subsystems.

use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A PDF name (`/Foo`), stored as its raw decoded bytes with a cached hash
/// so repeated dictionary lookups don't re-hash the backing bytes.
#[derive(Clone, Eq)]
pub struct Name {
    bytes: Arc<[u8]>,
    hash: u64,
}

impl Name {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let mut hasher = FxHasher::default();
        bytes.hash(&mut hasher);
        Name {
            bytes,
            hash: hasher.finish(),
        }
    }

    pub fn from_str(s: &str) -> Self {
        Name::new(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lossy UTF-8 view, for diagnostics only. Names are not required to be
    /// valid UTF-8.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bytes == other.bytes
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str_lossy())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str_lossy())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.bytes.as_ref() == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.bytes.as_ref() == other.as_bytes()
    }
}

/// A scalar number: integers are kept exact up to 64 bits, everything with
/// a fractional part or exponent is a double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Real(r) => *r,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(*i),
            Number::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            Number::Real(_) => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Real(r) => write!(f, "{}", r),
        }
    }
}

/// Identity of an indirect object: `(object_number, generation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(number: u32, generation: u16) -> Self {
        ObjectId { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// A dictionary keyed by `Name`, using the fast hasher the rest of the
/// crate favors for integer/byte-keyed lookups.
pub type Dictionary = HashMap<Name, Value, std::hash::BuildHasherDefault<FxHasher>>;

/// The transient value tree the value-capture sink assembles. Never handed
/// to the application document sink directly; only used internally to
/// resolve things like `/Length` and xref-stream dictionaries before
/// re-emitting the real event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    String(Vec<u8>),
    Name(Name),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Reference(ObjectId),
}

impl Value {
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn dict_get(&self, key: &str) -> Option<&Value> {
        self.as_dict()
            .and_then(|d| d.iter().find(|(k, _)| k.as_bytes() == key.as_bytes()).map(|(_, v)| v))
    }
}
