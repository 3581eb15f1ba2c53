//! Declared type references.
//!
//! Type references are written in CLI full-name notation, the same form a
//! disassembler prints them in:
//!
//! - `System.Int32`
//! - `System.Byte[]`
//! - ``System.Collections.Generic.Dictionary`2<System.String,System.Int32>``
//! - `Game.Protocol.Login/Types/Platform` (nested types use `/`)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separators that introduce a new path segment in a full type name
const PATH_SEPARATORS: &[char] = &['.', '/', '+'];

/// Primitive runtime types the type-mapping table knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `System.Boolean`
    Boolean,
    /// `System.Byte`
    Byte,
    /// `System.Int32`
    Int32,
    /// `System.Int64`
    Int64,
    /// `System.UInt32`
    UInt32,
    /// `System.UInt64`
    UInt64,
    /// `System.Single`
    Single,
    /// `System.Double`
    Double,
    /// `System.String`
    String,
}

impl Primitive {
    /// Returns the runtime full name
    pub fn full_name(&self) -> &'static str {
        match self {
            Primitive::Boolean => "System.Boolean",
            Primitive::Byte => "System.Byte",
            Primitive::Int32 => "System.Int32",
            Primitive::Int64 => "System.Int64",
            Primitive::UInt32 => "System.UInt32",
            Primitive::UInt64 => "System.UInt64",
            Primitive::Single => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::String => "System.String",
        }
    }

    /// Looks up a primitive by its runtime full name
    pub fn from_full_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "System.Boolean" => Primitive::Boolean,
            "System.Byte" => Primitive::Byte,
            "System.Int32" => Primitive::Int32,
            "System.Int64" => Primitive::Int64,
            "System.UInt32" => Primitive::UInt32,
            "System.UInt64" => Primitive::UInt64,
            "System.Single" => Primitive::Single,
            "System.Double" => Primitive::Double,
            "System.String" => Primitive::String,
            _ => return None,
        };
        Some(primitive)
    }
}

/// A declared type as seen in member signatures
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// One of the known primitives
    Primitive(Primitive),
    /// Single-dimensional array
    Array(Box<TypeRef>),
    /// Generic instance such as ``List`1<System.String>``
    Generic {
        /// Full name of the generic definition, including the arity suffix
        definition: String,
        /// Type arguments in order
        arguments: Vec<TypeRef>,
    },
    /// Any other type, by full name (messages, enums, unmapped runtime types)
    Named(String),
}

impl TypeRef {
    /// Creates a named type reference
    pub fn named(full_name: impl Into<String>) -> Self {
        TypeRef::Named(full_name.into())
    }

    /// Creates an array type reference
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Creates a generic instance type reference
    pub fn generic(definition: impl Into<String>, arguments: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            definition: definition.into(),
            arguments,
        }
    }

    /// Returns the generic definition name for generic instances and the
    /// plain full name otherwise. Arrays have no definition name.
    pub fn definition_name(&self) -> Option<&str> {
        match self {
            TypeRef::Primitive(p) => Some(p.full_name()),
            TypeRef::Generic { definition, .. } => Some(definition),
            TypeRef::Named(name) => Some(name),
            TypeRef::Array(_) => None,
        }
    }

    /// Returns the last path segment, ignoring namespace and enclosing types
    pub fn simple_name(&self) -> String {
        match self {
            TypeRef::Array(element) => format!("{}[]", element.simple_name()),
            other => other
                .definition_name()
                .map(simple_name)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Returns true for `System.Byte`
    pub fn is_byte(&self) -> bool {
        matches!(self, TypeRef::Primitive(Primitive::Byte))
    }
}

/// Returns the last segment of a dotted, slashed or plus-separated name
pub fn simple_name(full_name: &str) -> &str {
    full_name
        .rsplit(PATH_SEPARATORS)
        .next()
        .unwrap_or(full_name)
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => f.write_str(p.full_name()),
            TypeRef::Array(element) => write!(f, "{}[]", element),
            TypeRef::Generic {
                definition,
                arguments,
            } => {
                write!(f, "{}<", definition)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for TypeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.is_empty() {
            return Err(Error::invalid_type_name(s, "empty type name"));
        }

        if let Some(element) = name.strip_suffix("[]") {
            return Ok(TypeRef::array(element.parse()?));
        }

        if let Some(open) = name.find('<') {
            let Some(inner) = name[open + 1..].strip_suffix('>') else {
                return Err(Error::invalid_type_name(s, "generic argument list is not closed"));
            };
            let definition = &name[..open];
            if definition.is_empty() {
                return Err(Error::invalid_type_name(s, "missing generic definition"));
            }
            let arguments = split_arguments(inner)
                .ok_or_else(|| Error::invalid_type_name(s, "unbalanced generic arguments"))?
                .into_iter()
                .map(str::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(TypeRef::generic(definition, arguments));
        }

        if name.contains('>') {
            return Err(Error::invalid_type_name(s, "unexpected '>'"));
        }

        Ok(Primitive::from_full_name(name)
            .map(TypeRef::Primitive)
            .unwrap_or_else(|| TypeRef::named(name)))
    }
}

impl TryFrom<String> for TypeRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl From<Primitive> for TypeRef {
    fn from(value: Primitive) -> Self {
        TypeRef::Primitive(value)
    }
}

/// Splits a generic argument list on top-level commas.
/// Returns `None` when the angle brackets do not balance.
fn split_arguments(list: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    parts.push(&list[start..]);
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_primitive_and_named() {
        assert_eq!(
            "System.Int32".parse::<TypeRef>().unwrap(),
            TypeRef::Primitive(Primitive::Int32)
        );
        assert_eq!(
            "Game.Protocol.Login/Types/Platform".parse::<TypeRef>().unwrap(),
            TypeRef::named("Game.Protocol.Login/Types/Platform")
        );
    }

    #[test]
    fn test_parse_nested_generics() {
        let parsed: TypeRef = "System.Collections.Generic.Dictionary`2<System.String,System.Collections.Generic.List`1<System.Int64>>"
            .parse()
            .unwrap();

        assert_eq!(
            parsed,
            TypeRef::generic(
                "System.Collections.Generic.Dictionary`2",
                vec![
                    Primitive::String.into(),
                    TypeRef::generic(
                        "System.Collections.Generic.List`1",
                        vec![Primitive::Int64.into()]
                    ),
                ]
            )
        );
        assert_eq!(
            parsed.to_string(),
            "System.Collections.Generic.Dictionary`2<System.String,System.Collections.Generic.List`1<System.Int64>>"
        );
    }

    #[test]
    fn test_parse_byte_array() {
        let parsed: TypeRef = "System.Byte[]".parse().unwrap();
        assert_eq!(parsed, TypeRef::array(Primitive::Byte.into()));
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!("System.Collections.Generic.List`1<System.Int32".parse::<TypeRef>().is_err());
        assert!("A`1<B>>".parse::<TypeRef>().is_err());
        assert!("".parse::<TypeRef>().is_err());
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("Game.Protocol.Login/Types/Platform"), "Platform");
        assert_eq!(simple_name("Outer+Inner"), "Inner");
        assert_eq!(simple_name("NoNamespace"), "NoNamespace");
        assert_eq!(
            TypeRef::named("ProtoBuf.DiscriminatedUnion32Object").simple_name(),
            "DiscriminatedUnion32Object"
        );
    }
}
