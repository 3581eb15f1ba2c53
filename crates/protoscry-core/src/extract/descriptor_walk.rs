//! Descriptor walk for Google.Protobuf generated code.
//!
//! Generated message classes expose their reflection descriptor, which
//! already classifies every field (scalar kind, enum, message, map,
//! repeated) and lists oneofs and nested messages. The walk follows the
//! descriptor and only goes back to type metadata for enums, which carry
//! their proto names in `OriginalName` attributes, and to pair nested
//! descriptors with their generated classes.

use super::convention::{DescriptorConvention, GOOGLE_PROTOBUF_V3};
use super::ExtractionStrategy;
use crate::descriptor::{DescriptorNode, FieldKind, FieldNode, MessageNode};
use crate::metadata::{simple_name, AttributeValue, MetadataProvider, TypeKind, TypeMetadata};
use crate::schema::{
    Definition, FieldEntry, FieldType, NestedEntry, ProtoEntry, ProtoFile, SchemaEnum,
    SchemaEnumValue, SchemaField, SchemaMessage, SchemaOneof,
};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Recovers schemas by walking reflection descriptors
#[derive(Debug, Clone)]
pub struct DescriptorWalk {
    convention: DescriptorConvention,
}

impl Default for DescriptorWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorWalk {
    /// Creates a walk for Google.Protobuf 3.x
    pub fn new() -> Self {
        Self::with_convention(GOOGLE_PROTOBUF_V3)
    }

    /// Creates a walk for a custom identity table
    pub fn with_convention(convention: DescriptorConvention) -> Self {
        Self { convention }
    }

    fn is_message_type(&self, ty: &TypeMetadata) -> bool {
        ty.kind == TypeKind::Class
            && self
                .convention
                .message_interfaces
                .iter()
                .any(|i| ty.implements(i))
    }

    /// An enum qualifies when at least one member carries a rename
    fn enum_qualifies<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> bool {
        ty.kind == TypeKind::Enum
            && ty
                .fields
                .iter()
                .any(|f| provider.get_attribute(f, self.convention.rename_attribute).is_some())
    }

    fn build_enum<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> SchemaEnum {
        let values = ty
            .fields
            .iter()
            .filter(|f| f.is_static)
            .filter_map(|f| {
                let number = f.constant?;
                let name = provider
                    .get_attribute(f, self.convention.rename_attribute)
                    .and_then(|a| {
                        a.named(self.convention.rename_argument)
                            .or_else(|| a.positional(0))
                    })
                    .and_then(AttributeValue::as_str)
                    .unwrap_or(&f.name);
                Some(SchemaEnumValue {
                    name: name.to_string(),
                    number,
                })
            })
            .collect();

        SchemaEnum {
            name: ty.name.clone(),
            values,
        }
    }

    fn build_top_level<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> Definition {
        match provider.message_descriptor(ty) {
            Some(descriptor) => Definition::Message(self.build_message(provider, &descriptor, ty)),
            None => {
                warn!("No descriptor for {}", ty.full_name);
                Definition::Unresolved(format!("Could not get descriptor for {}", ty.name))
            }
        }
    }

    fn build_message<P: MetadataProvider>(
        &self,
        provider: &P,
        descriptor: &MessageNode,
        ty: &TypeMetadata,
    ) -> SchemaMessage {
        debug!("Walking descriptor {} for {}", descriptor.name, ty.full_name);
        let container = self.nested_container(provider, ty);
        let mut message = SchemaMessage::new(&descriptor.name);

        message.nested_enums = container
            .iter()
            .filter(|t| self.enum_qualifies(provider, t))
            .map(|t| self.build_enum(provider, t))
            .collect();

        message.oneofs = descriptor
            .oneofs
            .iter()
            .map(|oneof| SchemaOneof {
                name: oneof.name.clone(),
                fields: oneof
                    .fields
                    .iter()
                    .map(|&index| match descriptor.fields.get(index) {
                        Some(field) => FieldEntry::Field(SchemaField::new(
                            &field.name,
                            i64::from(field.number),
                            FieldType::Singular(field_type_name(field)),
                        )),
                        None => FieldEntry::Unresolved(format!(
                            "Oneof {} references missing field {}",
                            oneof.name, index
                        )),
                    })
                    .collect(),
            })
            .collect();

        message.fields = descriptor
            .fields_in_declaration_order()
            .into_iter()
            .filter(|f| f.oneof.is_none())
            .map(|f| self.build_field(descriptor, f))
            .collect();

        let mut processed = HashSet::new();
        for nested in &descriptor.nested_types {
            if nested.name.is_empty()
                || nested.name.ends_with(self.convention.map_entry_suffix)
                || !processed.insert(nested.name.as_str())
            {
                trace!("Skipping nested descriptor '{}'", nested.name);
                continue;
            }

            let entry = match container.iter().find(|t| t.name == nested.name) {
                Some(nested_type) => {
                    NestedEntry::Message(self.build_message(provider, nested, nested_type))
                }
                None => {
                    warn!("No nested type {} in {}", nested.name, ty.full_name);
                    NestedEntry::Unresolved(format!("Could not resolve nested type {}", nested.name))
                }
            };
            message.nested_messages.push(entry);
        }

        message
    }

    fn build_field(&self, descriptor: &MessageNode, field: &FieldNode) -> FieldEntry {
        let number = i64::from(field.number);

        if !field.map {
            let name = field_type_name(field);
            let ty = if field.repeated {
                FieldType::Repeated(name)
            } else {
                FieldType::Singular(name)
            };
            return FieldEntry::Field(SchemaField::new(&field.name, number, ty));
        }

        let entry = field
            .type_name
            .as_deref()
            .and_then(|name| descriptor.lookup(simple_name(name)))
            .and_then(DescriptorNode::as_message);
        let Some(entry) = entry else {
            warn!("Map entry for {}.{} not found", descriptor.name, field.name);
            return FieldEntry::Unresolved(format!("Map descriptor not found for {}", field.name));
        };

        match entry.fields_in_declaration_order().as_slice() {
            [key, value, ..] => FieldEntry::Field(SchemaField::new(
                &field.name,
                number,
                FieldType::Map {
                    key: field_type_name(key),
                    value: field_type_name(value),
                },
            )),
            fields => FieldEntry::Unresolved(format!(
                "Map fields count {} for {}",
                fields.len(),
                field.name
            )),
        }
    }

    /// Generated classes keep nested types in a `Types` holder class
    fn nested_container<'a, P: MetadataProvider>(
        &self,
        provider: &P,
        ty: &'a TypeMetadata,
    ) -> &'a [TypeMetadata] {
        let nested = provider.get_nested_types(ty);
        nested
            .iter()
            .find(|t| t.name == self.convention.nested_container)
            .map(|holder| provider.get_nested_types(holder))
            .unwrap_or(nested)
    }
}

/// Type name of a descriptor field as reported by its wire kind
fn field_type_name(field: &FieldNode) -> String {
    if let Some(scalar) = field.kind.scalar_name() {
        return scalar.to_string();
    }
    match (&field.type_name, field.kind) {
        (Some(name), _) => simple_name(name).to_string(),
        (None, FieldKind::Enum) => "unknown_enum".to_string(),
        (None, FieldKind::Group) => "group".to_string(),
        (None, _) => "unknown_message".to_string(),
    }
}

impl ExtractionStrategy for DescriptorWalk {
    fn name(&self) -> &'static str {
        self.convention.display_name
    }

    fn runtime_assemblies(&self) -> &'static [&'static str] {
        self.convention.runtime_assemblies
    }

    fn extract<P: MetadataProvider>(&self, provider: &P) -> ProtoFile {
        let types = provider.list_types();
        let mut entries = Vec::new();

        for ty in types.iter().filter(|t| self.enum_qualifies(provider, t)) {
            debug!("Extracting enum {}", ty.full_name);
            entries.push(ProtoEntry {
                source_name: ty.full_name.clone(),
                definition: Definition::Enum(self.build_enum(provider, ty)),
            });
        }

        for ty in types.iter().filter(|t| self.is_message_type(t)) {
            debug!("Extracting message {}", ty.full_name);
            entries.push(ProtoEntry {
                source_name: ty.full_name.clone(),
                definition: self.build_top_level(provider, ty),
            });
        }

        ProtoFile {
            package: None,
            entries,
        }
    }
}
