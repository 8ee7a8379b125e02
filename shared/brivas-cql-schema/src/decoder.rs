//! Type Encoding Decoder
//!
//! Turns the type strings found in system tables into [`TypeDescriptor`]s.
//! Two spellings are understood:
//!
//! - marshal classes, as stored by pre-3.0 servers:
//!   `org.apache.cassandra.db.marshal.ReversedType(org.apache.cassandra.db.marshal.TimestampType)`
//! - CQL type names, as stored in `system_schema`: `frozen<map<text, int>>`
//!
//! Rules are tried in order: composite, reversed, frozen, list/set, map,
//! then the primitive table. Each wrapper decodes its arguments recursively.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::types::{CollectionKind, PrimitiveKind, TypeDescriptor};
use crate::{Result, SchemaError};

pub(crate) const MARSHAL_PREFIX: &str = "org.apache.cassandra.db.marshal.";

const MAX_DEPTH: usize = 32;

static COMPOSITE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:org\.apache\.cassandra\.db\.marshal\.)?CompositeType\((?P<marshal>.+)\)$")
        .unwrap()
});

static REVERSED_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:org\.apache\.cassandra\.db\.marshal\.)?ReversedType\((?P<marshal>.+)\)$")
        .unwrap()
});

static FROZEN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:org\.apache\.cassandra\.db\.marshal\.)?FrozenType\((?P<marshal>.+)\)|frozen<(?P<cql>.+)>)$",
    )
    .unwrap()
});

static COLLECTION_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:org\.apache\.cassandra\.db\.marshal\.)?(?P<marshal_kind>List|Set)Type\((?P<marshal>.+)\)|(?P<cql_kind>list|set)<(?P<cql>.+)>)$",
    )
    .unwrap()
});

static MAP_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:org\.apache\.cassandra\.db\.marshal\.)?MapType\((?P<marshal>.+)\)|map<(?P<cql>.+)>)$",
    )
    .unwrap()
});

/// Decode a type encoding string
///
/// Fails with [`SchemaError::UnrecognizedType`] carrying the whole input when
/// any part of it matches no rule.
pub fn decode(encoding: &str) -> Result<TypeDescriptor> {
    decode_nested(encoding, 0).ok_or_else(|| SchemaError::unrecognized(encoding))
}

fn decode_nested(encoding: &str, depth: usize) -> Option<TypeDescriptor> {
    if depth > MAX_DEPTH {
        return None;
    }
    let encoding = encoding.trim();

    if let Some(args) = wrapped(&COMPOSITE_TYPE, encoding) {
        return split_arguments(args)?
            .into_iter()
            .map(|part| decode_nested(part, depth + 1))
            .collect::<Option<Vec<_>>>()
            .map(TypeDescriptor::Composite);
    }

    if let Some(args) = wrapped(&REVERSED_TYPE, encoding) {
        return single_argument(args, depth).map(TypeDescriptor::reversed);
    }

    if let Some(args) = wrapped(&FROZEN_TYPE, encoding) {
        return single_argument(args, depth).map(TypeDescriptor::frozen);
    }

    if let Some(caps) = COLLECTION_TYPE.captures(encoding) {
        let kind = group(&caps, &["marshal_kind", "cql_kind"]).and_then(CollectionKind::parse)?;
        let element = single_argument(group(&caps, &["marshal", "cql"])?, depth)?;
        return match kind {
            CollectionKind::List => Some(TypeDescriptor::list(element)),
            CollectionKind::Set => Some(TypeDescriptor::set(element)),
            CollectionKind::Map => None,
        };
    }

    if let Some(args) = wrapped(&MAP_TYPE, encoding) {
        let (key, value) = pair_arguments(args)?;
        return Some(TypeDescriptor::map(
            decode_nested(key, depth + 1)?,
            decode_nested(value, depth + 1)?,
        ));
    }

    PrimitiveKind::lookup(encoding).map(TypeDescriptor::Primitive)
}

fn single_argument(args: &str, depth: usize) -> Option<TypeDescriptor> {
    match split_arguments(args)?.as_slice() {
        [only] => decode_nested(only, depth + 1),
        _ => None,
    }
}

fn group<'s>(caps: &Captures<'s>, names: &[&str]) -> Option<&'s str> {
    names
        .iter()
        .find_map(|name| caps.name(name))
        .map(|m| m.as_str())
}

/// Argument text of a single-group wrapper rule
fn wrapped<'s>(pattern: &Regex, encoding: &'s str) -> Option<&'s str> {
    let caps = pattern.captures(encoding)?;
    group(&caps, &["marshal", "cql"])
}

/// Split on top-level commas, honouring `()` and `<>` nesting
///
/// Returns `None` for unbalanced input or an empty argument.
pub(crate) fn split_arguments(args: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '(' | '<' => depth += 1,
            ')' | '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(args[start..].trim());

    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

fn pair_arguments(args: &str) -> Option<(&str, &str)> {
    match split_arguments(args)?.as_slice() {
        [key, value] => Some((*key, *value)),
        _ => None,
    }
}

/// Components of a `CompositeType(...)` encoding, undecoded
pub(crate) fn composite_parts(encoding: &str) -> Option<Vec<&str>> {
    wrapped(&COMPOSITE_TYPE, encoding.trim()).and_then(split_arguments)
}

/// Whether an encoding is wrapped in `ReversedType(...)`
pub(crate) fn is_reversed(encoding: &str) -> bool {
    REVERSED_TYPE.is_match(encoding.trim())
}

/// Strip an outer `FrozenType(...)`/`frozen<...>`, reporting whether one was present
pub(crate) fn strip_frozen(encoding: &str) -> (&str, bool) {
    let encoding = encoding.trim();
    match wrapped(&FROZEN_TYPE, encoding) {
        Some(inner) if split_arguments(inner).map_or(false, |args| args.len() == 1) => {
            (inner.trim(), true)
        }
        _ => (encoding, false),
    }
}

/// Element encodings of a top-level collection type, undecoded
///
/// Returns the kind, the key encoding (maps only) and the element/value encoding.
pub(crate) fn collection_parts(encoding: &str) -> Option<(CollectionKind, Option<&str>, &str)> {
    let encoding = encoding.trim();

    if let Some(caps) = COLLECTION_TYPE.captures(encoding) {
        let kind = group(&caps, &["marshal_kind", "cql_kind"]).and_then(CollectionKind::parse)?;
        return match split_arguments(group(&caps, &["marshal", "cql"])?)?.as_slice() {
            [element] => Some((kind, None, *element)),
            _ => None,
        };
    }

    if let Some(args) = wrapped(&MAP_TYPE, encoding) {
        let (key, value) = pair_arguments(args)?;
        return Some((CollectionKind::Map, Some(key), value));
    }

    None
}
