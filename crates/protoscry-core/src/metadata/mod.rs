//! Compiled type metadata and the provider interface the extractors query.
//!
//! The extractors never touch a loader directly. They see a module through
//! [`MetadataProvider`], which answers the handful of queries schema
//! recovery needs: the ordered type list, attributes on a type or member,
//! nested types, method bodies, field resolution and descriptor access.
//!
//! [`Module`] is the concrete provider. It is read from a JSON metadata
//! dump produced by an external disassembler:
//!
//! ```json
//! {
//!   "name": "Game.Protocol.dll",
//!   "references": ["mscorlib", "protobuf-net"],
//!   "types": [
//!     {
//!       "full_name": "Game.Protocol.Login",
//!       "interfaces": ["ProtoBuf.IExtensible"],
//!       "attributes": [{ "type": "ProtoBuf.ProtoContractAttribute" }],
//!       "properties": [
//!         {
//!           "name": "Account",
//!           "property_type": "System.String",
//!           "attributes": [{ "type": "ProtoBuf.ProtoMemberAttribute", "arguments": [1] }]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

mod il;
mod types;

use crate::descriptor::MessageNode;
use crate::error::{Error, Result};
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

pub use il::{FieldRef, Instruction, OpCode, Operand};
pub use types::{simple_name, Primitive, TypeRef};

/// A constructor or named attribute argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean literal
    Bool(bool),
    /// Integer literal (enum arguments are stored as their underlying value)
    Int(i64),
    /// String literal or type name
    String(String),
}

impl AttributeValue {
    /// Returns the integer value, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

/// A custom attribute attached to a type or member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Full name of the attribute type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Positional constructor arguments
    #[serde(default)]
    pub arguments: Vec<AttributeValue>,
    /// Named property/field arguments
    #[serde(default)]
    pub named: BTreeMap<String, AttributeValue>,
}

impl Annotation {
    /// Creates an attribute with no arguments
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            arguments: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    /// Appends a positional argument
    pub fn arg(mut self, value: impl Into<AttributeValue>) -> Self {
        self.arguments.push(value.into());
        self
    }

    /// Sets a named argument
    pub fn named_arg(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Returns the positional argument at `index`
    pub fn positional(&self, index: usize) -> Option<&AttributeValue> {
        self.arguments.get(index)
    }

    /// Returns the named argument `name`
    pub fn named(&self, name: &str) -> Option<&AttributeValue> {
        self.named.get(name)
    }
}

/// Anything that carries custom attributes
pub trait Annotated {
    /// All attached attributes, in metadata order
    fn attributes(&self) -> &[Annotation];

    /// Returns the first attribute of the given type
    fn attribute(&self, full_name: &str) -> Option<&Annotation> {
        self.attributes().iter().find(|a| a.type_name == full_name)
    }

    /// Returns true if an attribute of the given type is attached
    fn has_attribute(&self, full_name: &str) -> bool {
        self.attribute(full_name).is_some()
    }
}

/// Kind of a type definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Reference type
    #[default]
    Class,
    /// Value type
    Struct,
    /// Enumeration
    Enum,
    /// Interface
    Interface,
}

/// A field of a type (enum members are static fields with a constant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: TypeRef,
    /// Static field
    #[serde(default)]
    pub is_static: bool,
    /// Literal value for constant fields
    #[serde(default)]
    pub constant: Option<i64>,
    /// Attached attributes
    #[serde(default)]
    pub attributes: Vec<Annotation>,
}

impl FieldMetadata {
    /// Creates an instance field
    pub fn new(name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_static: false,
            constant: None,
            attributes: Vec::new(),
        }
    }

    /// Creates an enum literal of the given enum type
    pub fn literal(name: impl Into<String>, enum_type: &str, value: i64) -> Self {
        Self {
            is_static: true,
            constant: Some(value),
            ..Self::new(name, TypeRef::named(enum_type))
        }
    }

    /// Attaches an attribute
    pub fn with_attribute(mut self, attribute: Annotation) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Returns true for enum literals
    pub fn is_literal(&self) -> bool {
        self.is_static && self.constant.is_some()
    }
}

impl Annotated for FieldMetadata {
    fn attributes(&self) -> &[Annotation] {
        &self.attributes
    }
}

/// A property of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    /// Property name
    pub name: String,
    /// Declared type
    pub property_type: TypeRef,
    /// Attached attributes
    #[serde(default)]
    pub attributes: Vec<Annotation>,
}

impl PropertyMetadata {
    /// Creates a property
    pub fn new(name: impl Into<String>, property_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            property_type,
            attributes: Vec::new(),
        }
    }

    /// Attaches an attribute
    pub fn with_attribute(mut self, attribute: Annotation) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl Annotated for PropertyMetadata {
    fn attributes(&self) -> &[Annotation] {
        &self.attributes
    }
}

/// A method of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMetadata {
    /// Method name
    pub name: String,
    /// Parameter types
    #[serde(default)]
    pub parameters: Vec<TypeRef>,
    /// Instruction body, absent for abstract and extern methods
    #[serde(default)]
    pub body: Option<Vec<Instruction>>,
}

impl MethodMetadata {
    /// Creates a parameterless method with the given body
    pub fn new(name: impl Into<String>, body: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            body: Some(body),
        }
    }
}

/// Where a type's reflection descriptor comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorSource {
    /// Full proto name of a message in the module's descriptor pool
    Pool(String),
    /// Descriptor tree written out in the dump itself
    Inline(MessageNode),
}

/// A type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// Full name; nested types use `Outer/Inner`
    pub full_name: String,
    /// Simple name; derived from `full_name` when omitted
    #[serde(default)]
    pub name: String,
    /// Kind of definition
    #[serde(default)]
    pub kind: TypeKind,
    /// Implemented interfaces
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Attached attributes
    #[serde(default)]
    pub attributes: Vec<Annotation>,
    /// Declared fields
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
    /// Declared properties
    #[serde(default)]
    pub properties: Vec<PropertyMetadata>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,
    /// Nested types, owned by this type
    #[serde(default)]
    pub nested_types: Vec<TypeMetadata>,
    /// Reflection descriptor, for types generated by Google.Protobuf
    #[serde(default)]
    pub descriptor: Option<DescriptorSource>,
}

impl TypeMetadata {
    /// Creates a type of the given kind
    pub fn new(full_name: impl Into<String>, kind: TypeKind) -> Self {
        let full_name = full_name.into();
        Self {
            name: simple_name(&full_name).to_string(),
            full_name,
            kind,
            interfaces: Vec::new(),
            attributes: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            nested_types: Vec::new(),
            descriptor: None,
        }
    }

    /// Creates a class
    pub fn class(full_name: impl Into<String>) -> Self {
        Self::new(full_name, TypeKind::Class)
    }

    /// Creates an enum
    pub fn enumeration(full_name: impl Into<String>) -> Self {
        Self::new(full_name, TypeKind::Enum)
    }

    /// Adds an implemented interface
    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Attaches an attribute
    pub fn with_attribute(mut self, attribute: Annotation) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a field
    pub fn with_field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a property
    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a method
    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a nested type
    pub fn with_nested(mut self, nested: TypeMetadata) -> Self {
        self.nested_types.push(nested);
        self
    }

    /// Sets the descriptor source
    pub fn with_descriptor(mut self, descriptor: DescriptorSource) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Returns true if this type implements the interface, comparing
    /// generic definitions so ``IMessage`1<T>`` matches ``IMessage`1``
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces
            .iter()
            .any(|i| i.definition_name() == Some(interface))
    }

    /// Returns the parameterless method with the given name
    pub fn parameterless_method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.is_empty())
    }

    /// Depth-first search for a type by full name, including `self`
    fn find(&self, full_name: &str) -> Option<&TypeMetadata> {
        if self.full_name == full_name {
            return Some(self);
        }
        self.nested_types.iter().find_map(|t| t.find(full_name))
    }

    fn fill_names(&mut self) {
        if self.name.is_empty() {
            self.name = simple_name(&self.full_name).to_string();
        }
        for nested in &mut self.nested_types {
            nested.fill_names();
        }
    }
}

impl Annotated for TypeMetadata {
    fn attributes(&self) -> &[Annotation] {
        &self.attributes
    }
}

/// Read-only query interface over a compiled module's metadata
pub trait MetadataProvider {
    /// Module name, for diagnostics
    fn module_name(&self) -> &str;

    /// Top-level types in declaration order
    fn list_types(&self) -> &[TypeMetadata];

    /// Returns the first attribute of the given type on a type or member
    fn get_attribute<'a, T>(&self, target: &'a T, attribute_full_name: &str) -> Option<&'a Annotation>
    where
        T: Annotated + ?Sized,
    {
        target.attribute(attribute_full_name)
    }

    /// Nested types of `ty` in declaration order
    fn get_nested_types<'a>(&self, ty: &'a TypeMetadata) -> &'a [TypeMetadata] {
        &ty.nested_types
    }

    /// Instruction sequence of a method body
    fn get_method_body_instructions<'a>(&self, method: &'a MethodMetadata) -> Option<&'a [Instruction]> {
        method.body.as_deref()
    }

    /// Resolves a field token to its definition within this module
    fn resolve_field(&self, operand: &FieldRef) -> Option<&FieldMetadata>;

    /// Returns the reflection descriptor exposed by a generated message type
    fn message_descriptor(&self, ty: &TypeMetadata) -> Option<MessageNode>;

    /// Returns true if the module references the named assembly
    fn references_assembly(&self, name: &str) -> bool;
}

/// A loaded module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    /// Module (assembly) name
    pub name: String,
    /// Names of referenced assemblies
    #[serde(default)]
    pub references: Vec<String>,
    /// Top-level types in declaration order
    #[serde(default)]
    pub types: Vec<TypeMetadata>,
    /// Serialized `FileDescriptorSet` of the embedded reflection descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_set: Option<Vec<u8>>,
    #[serde(skip)]
    pool: Option<DescriptorPool>,
}

impl Module {
    /// Creates a module from already built types
    pub fn new(name: impl Into<String>, types: Vec<TypeMetadata>) -> Self {
        Self {
            name: name.into(),
            types,
            ..Default::default()
        }
    }

    /// Adds an assembly reference
    pub fn with_reference(mut self, assembly: impl Into<String>) -> Self {
        self.references.push(assembly.into());
        self
    }

    /// Attaches a serialized `FileDescriptorSet` and resolves it
    pub fn with_descriptor_set(mut self, bytes: Vec<u8>) -> Result<Self> {
        self.pool = Some(decode_pool(&bytes)?);
        self.descriptor_set = Some(bytes);
        Ok(self)
    }

    /// Parses a JSON metadata dump
    pub fn from_json(json: &str) -> Result<Self> {
        let mut module: Module = serde_json::from_str(json)?;
        for ty in &mut module.types {
            ty.fill_names();
        }
        if let Some(bytes) = &module.descriptor_set {
            module.pool = Some(decode_pool(bytes)?);
        }
        debug!(
            "Loaded module {} ({} top-level types, descriptors: {})",
            module.name,
            module.types.len(),
            module.pool.is_some()
        );
        Ok(module)
    }

    /// Reads and parses a JSON metadata dump from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_json(&json)
    }

    /// Returns the resolved descriptor pool, if the module embeds one
    pub fn descriptor_pool(&self) -> Option<&DescriptorPool> {
        self.pool.as_ref()
    }

    /// Finds a type anywhere in the module by full name
    pub fn find_type(&self, full_name: &str) -> Option<&TypeMetadata> {
        self.types.iter().find_map(|t| t.find(full_name))
    }
}

impl MetadataProvider for Module {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn list_types(&self) -> &[TypeMetadata] {
        &self.types
    }

    fn resolve_field(&self, operand: &FieldRef) -> Option<&FieldMetadata> {
        let resolved = self
            .find_type(&operand.declaring_type)
            .and_then(|ty| ty.fields.iter().find(|f| f.name == operand.name));
        if resolved.is_none() {
            trace!(
                "Unresolved field reference {}::{}",
                operand.declaring_type,
                operand.name
            );
        }
        resolved
    }

    fn message_descriptor(&self, ty: &TypeMetadata) -> Option<MessageNode> {
        match ty.descriptor.as_ref()? {
            DescriptorSource::Inline(node) => Some(node.clone()),
            DescriptorSource::Pool(full_name) => self
                .pool
                .as_ref()?
                .get_message_by_name(full_name)
                .map(|message| MessageNode::from_reflect(&message)),
        }
    }

    fn references_assembly(&self, name: &str) -> bool {
        self.references.iter().any(|r| r.eq_ignore_ascii_case(name))
    }
}

/// Decodes a serialized `FileDescriptorSet` into a resolved pool
fn decode_pool(bytes: &[u8]) -> Result<DescriptorPool> {
    let set = FileDescriptorSet::decode(bytes)?;
    let files = set.file.len();
    let pool = DescriptorPool::from_file_descriptor_set(set)
        .map_err(|e| Error::descriptor_build(e.to_string()))?;
    debug!("Resolved descriptor pool from {} file(s)", files);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DUMP: &str = r#"{
        "name": "Game.Protocol.dll",
        "references": ["mscorlib", "protobuf-net"],
        "types": [
            {
                "full_name": "Game.Protocol.Login",
                "interfaces": ["ProtoBuf.IExtensible"],
                "attributes": [{ "type": "ProtoBuf.ProtoContractAttribute" }],
                "fields": [
                    { "name": "__pbn__Credential", "field_type": "ProtoBuf.DiscriminatedUnionObject" }
                ],
                "properties": [
                    {
                        "name": "Account",
                        "property_type": "System.String",
                        "attributes": [
                            { "type": "ProtoBuf.ProtoMemberAttribute", "arguments": [1], "named": { "Name": "account" } }
                        ]
                    }
                ],
                "nested_types": [
                    { "full_name": "Game.Protocol.Login/Platform", "kind": "enum" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let module = Module::from_json(DUMP).unwrap();
        let login = &module.list_types()[0];

        assert_eq!(login.name, "Login");
        assert_eq!(login.nested_types[0].name, "Platform");
        assert_eq!(login.nested_types[0].kind, TypeKind::Enum);
        assert!(login.implements("ProtoBuf.IExtensible"));

        let member = module
            .get_attribute(&login.properties[0], "ProtoBuf.ProtoMemberAttribute")
            .unwrap();
        assert_eq!(member.positional(0).and_then(AttributeValue::as_i64), Some(1));
        assert_eq!(member.named("Name").and_then(AttributeValue::as_str), Some("account"));
        assert_eq!(login.properties[0].property_type, TypeRef::Primitive(Primitive::String));
    }

    #[test]
    fn test_resolve_field() {
        let module = Module::from_json(DUMP).unwrap();
        let field = module
            .resolve_field(&FieldRef::new("Game.Protocol.Login", "__pbn__Credential"))
            .unwrap();
        assert_eq!(field.field_type.simple_name(), "DiscriminatedUnionObject");
        assert!(module
            .resolve_field(&FieldRef::new("Game.Protocol.Login", "missing"))
            .is_none());
        assert!(module
            .find_type("Game.Protocol.Login/Platform")
            .is_some());
    }

    #[test]
    fn test_references_are_case_insensitive() {
        let module = Module::from_json(DUMP).unwrap();
        assert!(module.references_assembly("ProtoBuf-Net"));
        assert!(!module.references_assembly("Google.Protobuf"));
    }

    #[test]
    fn test_invalid_type_name_is_rejected() {
        let json = r#"{ "name": "m", "types": [ { "full_name": "A", "interfaces": ["List`1<"] } ] }"#;
        assert!(matches!(Module::from_json(json), Err(Error::MetadataParse(_))));
    }

    #[test]
    fn test_bad_descriptor_set_is_fatal() {
        let err = Module::new("m", vec![])
            .with_descriptor_set(vec![0xff, 0xff, 0xff])
            .unwrap_err();
        assert!(matches!(err, Error::DescriptorParse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("module.json");
        std::fs::write(&path, DUMP).unwrap();

        let module = Module::from_file(&path).unwrap();
        assert_eq!(module.name, "Game.Protocol.dll");
        assert!(matches!(
            Module::from_file(dir.path().join("missing.json")),
            Err(Error::FileRead { .. })
        ));
    }
}
