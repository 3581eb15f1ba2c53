//! Statically typed view over reflection descriptors.
//!
//! Generated Google.Protobuf code embeds each file's `FileDescriptorProto`
//! and exposes it at runtime through a `Descriptor` accessor. This module
//! models the part of that descriptor the extractor walks: messages with
//! their fields, oneofs, nested messages and enums.
//!
//! A [`MessageNode`] tree is built once, either from a resolved
//! [`prost_reflect::MessageDescriptor`] or straight from a metadata dump,
//! so the walk itself never does name-based member lookups.

use prost_reflect::{Kind, MessageDescriptor};
use serde::{Deserialize, Serialize};

/// Wire kind reported by a field descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum FieldKind {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldKind {
    /// Returns the proto3 keyword for scalar kinds, `None` for message,
    /// enum and group kinds which are named by their referenced type
    pub fn scalar_name(&self) -> Option<&'static str> {
        let name = match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int64 => "int64",
            FieldKind::Uint64 => "uint64",
            FieldKind::Int32 => "int32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Uint32 => "uint32",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sint64 => "sint64",
            FieldKind::Group | FieldKind::Message | FieldKind::Enum => return None,
        };
        Some(name)
    }
}

impl From<Kind> for FieldKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Double => FieldKind::Double,
            Kind::Float => FieldKind::Float,
            Kind::Int32 => FieldKind::Int32,
            Kind::Int64 => FieldKind::Int64,
            Kind::Uint32 => FieldKind::Uint32,
            Kind::Uint64 => FieldKind::Uint64,
            Kind::Sint32 => FieldKind::Sint32,
            Kind::Sint64 => FieldKind::Sint64,
            Kind::Fixed32 => FieldKind::Fixed32,
            Kind::Fixed64 => FieldKind::Fixed64,
            Kind::Sfixed32 => FieldKind::Sfixed32,
            Kind::Sfixed64 => FieldKind::Sfixed64,
            Kind::Bool => FieldKind::Bool,
            Kind::String => FieldKind::String,
            Kind::Bytes => FieldKind::Bytes,
            Kind::Message(_) => FieldKind::Message,
            Kind::Enum(_) => FieldKind::Enum,
        }
    }
}

/// A field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    /// Field name
    pub name: String,
    /// Field number
    pub number: u32,
    /// Reported wire kind
    pub kind: FieldKind,
    /// Full name of the referenced message or enum
    #[serde(default)]
    pub type_name: Option<String>,
    /// Repeated label (also set for map fields)
    #[serde(default)]
    pub repeated: bool,
    /// Map field
    #[serde(default)]
    pub map: bool,
    /// Index of the containing oneof within the message
    #[serde(default)]
    pub oneof: Option<usize>,
}

impl FieldNode {
    /// Creates a singular field
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            type_name: None,
            repeated: false,
            map: false,
            oneof: None,
        }
    }

    /// Sets the referenced message or enum name
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Marks the field repeated
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Marks the field as a map field referencing the given entry type
    pub fn map(mut self, entry_type: impl Into<String>) -> Self {
        self.map = true;
        self.repeated = true;
        self.kind = FieldKind::Message;
        self.type_name = Some(entry_type.into());
        self
    }

    /// Places the field in the oneof at `index`
    pub fn in_oneof(mut self, index: usize) -> Self {
        self.oneof = Some(index);
        self
    }

    fn from_reflect(field: &prost_reflect::FieldDescriptor, message: &MessageDescriptor) -> Self {
        let kind = field.kind();
        let type_name = match &kind {
            Kind::Message(m) => Some(m.full_name().to_string()),
            Kind::Enum(e) => Some(e.full_name().to_string()),
            _ => None,
        };
        let oneof = field.containing_oneof().and_then(|containing| {
            message
                .oneofs()
                .position(|o| o.name() == containing.name())
        });

        Self {
            name: field.name().to_string(),
            number: field.number(),
            kind: if field.is_group() {
                FieldKind::Group
            } else {
                FieldKind::from(kind)
            },
            type_name,
            repeated: field.is_list() || field.is_map(),
            map: field.is_map(),
            oneof,
        }
    }
}

/// A oneof descriptor; members are indices into the message's field list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneofNode {
    /// Oneof name
    pub name: String,
    /// Member field indices, in declaration order
    #[serde(default)]
    pub fields: Vec<usize>,
}

/// An enum value descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueNode {
    /// Value name
    pub name: String,
    /// Value number
    pub number: i32,
}

/// An enum descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumNode {
    /// Enum name
    pub name: String,
    /// Values in declaration order
    #[serde(default)]
    pub values: Vec<EnumValueNode>,
}

/// A message descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNode {
    /// Message name (not qualified)
    pub name: String,
    /// Fields in natural enumeration order
    #[serde(default)]
    pub fields: Vec<FieldNode>,
    /// Declaration order as indices into `fields`, when the source exposes one
    #[serde(default)]
    pub declaration_order: Option<Vec<usize>>,
    /// Oneofs in declaration order
    #[serde(default)]
    pub oneofs: Vec<OneofNode>,
    /// Nested messages, including synthetic map entries
    #[serde(default)]
    pub nested_types: Vec<MessageNode>,
    /// Nested enums
    #[serde(default)]
    pub enum_types: Vec<EnumNode>,
    /// Synthetic map entry type
    #[serde(default)]
    pub map_entry: bool,
}

/// Borrowed view of any node reachable by name from a message scope
#[derive(Debug, Clone, Copy)]
pub enum DescriptorNode<'a> {
    /// Nested message
    Message(&'a MessageNode),
    /// Nested enum
    Enum(&'a EnumNode),
    /// Field
    Field(&'a FieldNode),
    /// Oneof
    Oneof(&'a OneofNode),
}

impl<'a> DescriptorNode<'a> {
    /// Returns the node's declared name
    pub fn name(&self) -> &'a str {
        match self {
            DescriptorNode::Message(m) => &m.name,
            DescriptorNode::Enum(e) => &e.name,
            DescriptorNode::Field(f) => &f.name,
            DescriptorNode::Oneof(o) => &o.name,
        }
    }

    /// Returns the message if this node is one
    pub fn as_message(self) -> Option<&'a MessageNode> {
        match self {
            DescriptorNode::Message(m) => Some(m),
            _ => None,
        }
    }
}

impl MessageNode {
    /// Creates an empty message descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Appends a field
    pub fn field(mut self, field: FieldNode) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a oneof over the given field indices
    pub fn oneof(mut self, name: impl Into<String>, fields: Vec<usize>) -> Self {
        self.oneofs.push(OneofNode {
            name: name.into(),
            fields,
        });
        self
    }

    /// Appends a nested message
    pub fn nested(mut self, message: MessageNode) -> Self {
        self.nested_types.push(message);
        self
    }

    /// Appends a synthetic map entry with key and value fields
    pub fn map_entry(name: impl Into<String>, key: FieldNode, value: FieldNode) -> Self {
        let mut entry = Self::new(name).field(key).field(value);
        entry.map_entry = true;
        entry
    }

    /// Returns fields in declaration order if known, else in natural order
    pub fn fields_in_declaration_order(&self) -> Vec<&FieldNode> {
        match &self.declaration_order {
            Some(order) => order.iter().filter_map(|&i| self.fields.get(i)).collect(),
            None => self.fields.iter().collect(),
        }
    }

    /// Looks up a nested message, nested enum, oneof or field by name
    pub fn lookup(&self, name: &str) -> Option<DescriptorNode<'_>> {
        if let Some(m) = self.nested_types.iter().find(|m| m.name == name) {
            return Some(DescriptorNode::Message(m));
        }
        if let Some(e) = self.enum_types.iter().find(|e| e.name == name) {
            return Some(DescriptorNode::Enum(e));
        }
        if let Some(o) = self.oneofs.iter().find(|o| o.name == name) {
            return Some(DescriptorNode::Oneof(o));
        }
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(DescriptorNode::Field)
    }

    /// Builds the tree from a resolved prost-reflect descriptor
    pub fn from_reflect(message: &MessageDescriptor) -> Self {
        let fields: Vec<FieldNode> = message
            .fields()
            .map(|f| FieldNode::from_reflect(&f, message))
            .collect();

        let oneofs = message
            .oneofs()
            .map(|oneof| OneofNode {
                name: oneof.name().to_string(),
                fields: oneof
                    .fields()
                    .filter_map(|member| fields.iter().position(|f| f.number == member.number()))
                    .collect(),
            })
            .collect();

        let declaration_order = Some((0..fields.len()).collect());

        Self {
            name: message.name().to_string(),
            fields,
            declaration_order,
            oneofs,
            nested_types: message
                .child_messages()
                .map(|m| MessageNode::from_reflect(&m))
                .collect(),
            enum_types: message
                .child_enums()
                .map(|e| EnumNode {
                    name: e.name().to_string(),
                    values: e
                        .values()
                        .map(|v| EnumValueNode {
                            name: v.name().to_string(),
                            number: v.number(),
                        })
                        .collect(),
                })
                .collect(),
            map_entry: message.is_map_entry(),
        }
    }
}
