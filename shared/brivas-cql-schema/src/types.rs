//! Column Type Model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decoder::MARSHAL_PREFIX;

/// Primitive CQL types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Empty,
    Float,
    Inet,
    Int,
    Smallint,
    Text,
    Time,
    Timestamp,
    Timeuuid,
    Tinyint,
    Uuid,
    Varint,
}

const ALL: &[PrimitiveKind] = &[
    PrimitiveKind::Ascii,
    PrimitiveKind::Bigint,
    PrimitiveKind::Blob,
    PrimitiveKind::Boolean,
    PrimitiveKind::Counter,
    PrimitiveKind::Date,
    PrimitiveKind::Decimal,
    PrimitiveKind::Double,
    PrimitiveKind::Duration,
    PrimitiveKind::Empty,
    PrimitiveKind::Float,
    PrimitiveKind::Inet,
    PrimitiveKind::Int,
    PrimitiveKind::Smallint,
    PrimitiveKind::Text,
    PrimitiveKind::Time,
    PrimitiveKind::Timestamp,
    PrimitiveKind::Timeuuid,
    PrimitiveKind::Tinyint,
    PrimitiveKind::Uuid,
    PrimitiveKind::Varint,
];

const CQL_ALIASES: &[(&str, PrimitiveKind)] = &[("varchar", PrimitiveKind::Text)];

const MARSHAL_ALIASES: &[(&str, PrimitiveKind)] = &[("DateType", PrimitiveKind::Timestamp)];

impl PrimitiveKind {
    pub fn all() -> impl Iterator<Item = PrimitiveKind> {
        ALL.iter().copied()
    }

    /// (CQL name, marshal class)
    fn names(self) -> (&'static str, &'static str) {
        match self {
            Self::Ascii => ("ascii", "AsciiType"),
            Self::Bigint => ("bigint", "LongType"),
            Self::Blob => ("blob", "BytesType"),
            Self::Boolean => ("boolean", "BooleanType"),
            Self::Counter => ("counter", "CounterColumnType"),
            Self::Date => ("date", "SimpleDateType"),
            Self::Decimal => ("decimal", "DecimalType"),
            Self::Double => ("double", "DoubleType"),
            Self::Duration => ("duration", "DurationType"),
            Self::Empty => ("empty", "EmptyType"),
            Self::Float => ("float", "FloatType"),
            Self::Inet => ("inet", "InetAddressType"),
            Self::Int => ("int", "Int32Type"),
            Self::Smallint => ("smallint", "ShortType"),
            Self::Text => ("text", "UTF8Type"),
            Self::Time => ("time", "TimeType"),
            Self::Timestamp => ("timestamp", "TimestampType"),
            Self::Timeuuid => ("timeuuid", "TimeUUIDType"),
            Self::Tinyint => ("tinyint", "ByteType"),
            Self::Uuid => ("uuid", "UUIDType"),
            Self::Varint => ("varint", "IntegerType"),
        }
    }

    pub fn cql_name(self) -> &'static str {
        self.names().0
    }

    /// Marshal class name without the package prefix, e.g. `UTF8Type`
    pub fn marshal_class(self) -> &'static str {
        self.names().1
    }

    /// Fully qualified marshal class name
    pub fn internal_name(self) -> String {
        format!("{}{}", MARSHAL_PREFIX, self.marshal_class())
    }

    pub fn from_cql_name(name: &str) -> Option<Self> {
        Self::all()
            .find(|kind| kind.cql_name() == name)
            .or_else(|| {
                CQL_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, kind)| *kind)
            })
    }

    /// Accepts both `UTF8Type` and `org.apache.cassandra.db.marshal.UTF8Type`
    pub fn from_marshal_class(name: &str) -> Option<Self> {
        let class = name.strip_prefix(MARSHAL_PREFIX).unwrap_or(name);
        Self::all()
            .find(|kind| kind.marshal_class() == class)
            .or_else(|| {
                MARSHAL_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == class)
                    .map(|(_, kind)| *kind)
            })
    }

    /// Look up a bare type token in either naming scheme
    pub fn lookup(token: &str) -> Option<Self> {
        if token.starts_with(MARSHAL_PREFIX) {
            return Self::from_marshal_class(token);
        }
        Self::from_marshal_class(token).or_else(|| Self::from_cql_name(token))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cql_name())
    }
}

/// Kind of a collection column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    Set,
    Map,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
        }
    }

    /// From either `list` or `List` (as in `ListType`)
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "list" | "List" => Some(Self::List),
            "set" | "Set" => Some(Self::Set),
            "map" | "Map" => Some(Self::Map),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded description of a stored type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    /// Descending clustering marker
    Reversed(Box<TypeDescriptor>),
    /// Multi-component key encoding; part order is the byte layout
    Composite(Vec<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    Map {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    Frozen(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn list(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn reversed(inner: TypeDescriptor) -> Self {
        Self::Reversed(Box::new(inner))
    }

    pub fn frozen(inner: TypeDescriptor) -> Self {
        Self::Frozen(Box::new(inner))
    }

    pub fn is_reversed(&self) -> bool {
        matches!(self, Self::Reversed(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Strip one `Reversed` layer, reporting whether there was one
    pub fn into_unreversed(self) -> (TypeDescriptor, bool) {
        match self {
            Self::Reversed(inner) => (*inner, true),
            other => (other, false),
        }
    }

    /// Marshal-class encoding, the inverse of [`crate::decode`]
    pub fn encode(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.internal_name(),
            Self::Reversed(inner) => wrap("ReversedType", &[inner.as_ref()]),
            Self::Composite(parts) => {
                wrap("CompositeType", &parts.iter().collect::<Vec<_>>())
            }
            Self::List(element) => wrap("ListType", &[element.as_ref()]),
            Self::Set(element) => wrap("SetType", &[element.as_ref()]),
            Self::Map { key, value } => wrap("MapType", &[key.as_ref(), value.as_ref()]),
            Self::Frozen(inner) => wrap("FrozenType", &[inner.as_ref()]),
        }
    }
}

fn wrap(class: &str, args: &[&TypeDescriptor]) -> String {
    let args: Vec<String> = args.iter().map(|t| t.encode()).collect();
    format!("{}{}({})", MARSHAL_PREFIX, class, args.join(","))
}

impl From<PrimitiveKind> for TypeDescriptor {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

/// CQL rendering. CQL has no reversed or composite syntax: reversed types
/// render as their inner type, composites fall back to the marshal encoding.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind),
            Self::Reversed(inner) => write!(f, "{}", inner),
            Self::Composite(_) => f.write_str(&self.encode()),
            Self::List(element) => write!(f, "list<{}>", element),
            Self::Set(element) => write!(f, "set<{}>", element),
            Self::Map { key, value } => write!(f, "map<{}, {}>", key, value),
            Self::Frozen(inner) => write!(f, "frozen<{}>", inner),
        }
    }
}
