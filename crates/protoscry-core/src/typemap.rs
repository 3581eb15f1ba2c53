//! Mapping from declared runtime types to proto3 type names.
//!
//! Container detection runs first (maps, repeated fields, byte arrays);
//! the element type then goes through the scalar table. Anything the table
//! does not know maps to its simple name, on the assumption that it is a
//! message or enum defined elsewhere in the output.

use crate::metadata::{Primitive, TypeRef};
use crate::schema::FieldType;

/// Generic definitions treated as associative containers
const MAP_DEFINITIONS: &[&str] = &[
    "System.Collections.Generic.Dictionary`2",
    "System.Collections.Generic.IDictionary`2",
    "System.Collections.Generic.IReadOnlyDictionary`2",
];

/// Generic definitions treated as ordered sequences
const SEQUENCE_DEFINITIONS: &[&str] = &[
    "System.Collections.Generic.List`1",
    "System.Collections.Generic.IList`1",
    "System.Collections.Generic.ICollection`1",
    "System.Collections.Generic.IEnumerable`1",
    "System.Collections.Generic.IReadOnlyList`1",
];

/// Integer encoding hint, numbered like protobuf-net's `DataFormat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// Default encoding for the type
    #[default]
    Default,
    /// Zig-zag varint (`sint32`/`sint64`)
    ZigZag,
    /// Plain two's complement varint
    TwosComplement,
    /// Fixed width (`fixed*`/`sfixed*`)
    FixedSize,
    /// Group encoding
    Group,
    /// Well-known type encoding
    WellKnown,
}

impl WireFormat {
    /// Converts a `DataFormat` attribute value; unknown values are `Default`
    pub fn from_data_format(value: i64) -> Self {
        match value {
            1 => WireFormat::ZigZag,
            2 => WireFormat::TwosComplement,
            3 => WireFormat::FixedSize,
            4 => WireFormat::Group,
            5 => WireFormat::WellKnown,
            _ => WireFormat::Default,
        }
    }
}

/// Maps a single (non-container) type, applying the wire-format hint
pub fn map_scalar(ty: &TypeRef, hint: WireFormat) -> String {
    if let TypeRef::Primitive(primitive) = ty {
        let hinted = match (hint, primitive) {
            (WireFormat::FixedSize, Primitive::Int32) => Some("sfixed32"),
            (WireFormat::FixedSize, Primitive::Int64) => Some("sfixed64"),
            (WireFormat::FixedSize, Primitive::UInt32) => Some("fixed32"),
            (WireFormat::FixedSize, Primitive::UInt64) => Some("fixed64"),
            (WireFormat::ZigZag, Primitive::Int32) => Some("sint32"),
            (WireFormat::ZigZag, Primitive::Int64) => Some("sint64"),
            _ => None,
        };
        if let Some(name) = hinted {
            return name.to_string();
        }
    }

    let name = match ty {
        TypeRef::Primitive(Primitive::Int32) => "int32",
        TypeRef::Primitive(Primitive::Int64) => "int64",
        TypeRef::Primitive(Primitive::UInt32) => "uint32",
        TypeRef::Primitive(Primitive::UInt64) => "uint64",
        TypeRef::Primitive(Primitive::Single) => "float",
        TypeRef::Primitive(Primitive::Double) => "double",
        TypeRef::Primitive(Primitive::Boolean) => "bool",
        TypeRef::Primitive(Primitive::String) => "string",
        TypeRef::Array(element) if element.is_byte() => "bytes",
        other => return other.simple_name(),
    };
    name.to_string()
}

/// Maps a declared member type, detecting maps, repeated fields and
/// byte arrays. `key_hint` and `value_hint` apply to map entries only.
pub fn map_type(
    ty: &TypeRef,
    hint: WireFormat,
    key_hint: WireFormat,
    value_hint: WireFormat,
) -> FieldType {
    match ty {
        TypeRef::Generic {
            definition,
            arguments,
        } if arguments.len() == 2 && MAP_DEFINITIONS.contains(&definition.as_str()) => {
            FieldType::Map {
                key: map_scalar(&arguments[0], key_hint),
                value: map_scalar(&arguments[1], value_hint),
            }
        }
        TypeRef::Array(element) if element.is_byte() => FieldType::Singular("bytes".to_string()),
        TypeRef::Array(element) => FieldType::Repeated(map_scalar(element, hint)),
        TypeRef::Generic {
            definition,
            arguments,
        } if arguments.len() == 1 && SEQUENCE_DEFINITIONS.contains(&definition.as_str()) => {
            FieldType::Repeated(map_scalar(&arguments[0], hint))
        }
        other => FieldType::Singular(map_scalar(other, hint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(name: &str) -> TypeRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_default_table() {
        let cases = [
            ("System.Int32", "int32"),
            ("System.Int64", "int64"),
            ("System.UInt32", "uint32"),
            ("System.UInt64", "uint64"),
            ("System.Single", "float"),
            ("System.Double", "double"),
            ("System.Boolean", "bool"),
            ("System.String", "string"),
            ("System.Byte[]", "bytes"),
        ];
        for (declared, expected) in cases {
            assert_eq!(map_scalar(&parse(declared), WireFormat::Default), expected);
        }
    }

    #[test]
    fn test_fixed_and_zigzag_hints() {
        assert_eq!(map_scalar(&parse("System.Int32"), WireFormat::FixedSize), "sfixed32");
        assert_eq!(map_scalar(&parse("System.Int64"), WireFormat::FixedSize), "sfixed64");
        assert_eq!(map_scalar(&parse("System.UInt32"), WireFormat::FixedSize), "fixed32");
        assert_eq!(map_scalar(&parse("System.UInt64"), WireFormat::FixedSize), "fixed64");
        assert_eq!(map_scalar(&parse("System.Int32"), WireFormat::ZigZag), "sint32");
        assert_eq!(map_scalar(&parse("System.Int64"), WireFormat::ZigZag), "sint64");
    }

    #[test]
    fn test_hints_do_not_touch_other_types() {
        assert_eq!(map_scalar(&parse("System.UInt32"), WireFormat::ZigZag), "uint32");
        assert_eq!(map_scalar(&parse("System.Double"), WireFormat::FixedSize), "double");
        assert_eq!(map_scalar(&parse("System.String"), WireFormat::ZigZag), "string");
    }

    #[test]
    fn test_unknown_types_use_simple_name() {
        assert_eq!(
            map_scalar(&parse("Game.Protocol.Login/Types/Platform"), WireFormat::Default),
            "Platform"
        );
        assert_eq!(map_scalar(&parse("System.Int16"), WireFormat::FixedSize), "Int16");
    }

    #[test]
    fn test_containers() {
        let none = WireFormat::Default;
        assert_eq!(
            map_type(&parse("System.Byte[]"), none, none, none),
            FieldType::Singular("bytes".into())
        );
        assert_eq!(
            map_type(&parse("System.Int32[]"), WireFormat::ZigZag, none, none),
            FieldType::Repeated("sint32".into())
        );
        assert_eq!(
            map_type(&parse("System.Collections.Generic.List`1<Game.Item>"), none, none, none),
            FieldType::Repeated("Item".into())
        );
        assert_eq!(
            map_type(
                &parse("System.Collections.Generic.Dictionary`2<System.Int64,System.UInt32>"),
                WireFormat::ZigZag,
                WireFormat::FixedSize,
                WireFormat::FixedSize,
            ),
            FieldType::Map {
                key: "sfixed64".into(),
                value: "fixed32".into()
            }
        );
    }

    #[test]
    fn test_data_format_values() {
        assert_eq!(WireFormat::from_data_format(1), WireFormat::ZigZag);
        assert_eq!(WireFormat::from_data_format(3), WireFormat::FixedSize);
        assert_eq!(WireFormat::from_data_format(42), WireFormat::Default);
    }
}
