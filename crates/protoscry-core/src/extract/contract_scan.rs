//! Contract scan for protobuf-net annotated types.
//!
//! Contract types describe every member with attributes, but nothing in the
//! attributes says which members share a oneof. The generated code stores
//! all members of a oneof in one `DiscriminatedUnion*` backing field, and
//! each member gets a `Reset<Member>` method that loads that field's
//! address. Scanning those method bodies recovers the grouping.

use super::convention::{ContractConvention, PROTOBUF_NET};
use super::ExtractionStrategy;
use crate::metadata::{
    Annotation, AttributeValue, FieldMetadata, FieldRef, Instruction, MetadataProvider,
    PropertyMetadata, TypeKind, TypeMetadata,
};
use crate::schema::{
    Definition, FieldEntry, FieldType, NestedEntry, ProtoEntry, ProtoFile, SchemaEnum,
    SchemaEnumValue, SchemaField, SchemaMessage, SchemaOneof,
};
use crate::typemap::{map_scalar, map_type, WireFormat};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Prefix of the union storage field type names
const UNION_TYPE_PREFIX: &str = PROTOBUF_NET.union_type_prefix;

/// Prefix of generated backing field names
const BACKING_FIELD_PREFIX: &str = PROTOBUF_NET.backing_field_prefix;

/// Finds the oneof group a reset method clears.
///
/// Returns the name of the first field whose address the body loads and
/// whose declared type is a discriminated union, with the generated
/// backing-field prefix removed. Field-address loads of other fields are
/// passed over.
pub fn union_group_name<'m, F>(instructions: &[Instruction], resolve: F) -> Option<String>
where
    F: Fn(&FieldRef) -> Option<&'m FieldMetadata>,
{
    instructions
        .iter()
        .filter(|i| i.opcode.loads_field_address())
        .filter_map(|i| i.operand.as_field())
        .filter_map(|field_ref| resolve(field_ref))
        .find(|field| field.field_type.simple_name().starts_with(UNION_TYPE_PREFIX))
        .map(|field| {
            field
                .name
                .strip_prefix(BACKING_FIELD_PREFIX)
                .unwrap_or(&field.name)
                .to_string()
        })
}

/// A member property with its decoded tag
struct Member<'a> {
    property: &'a PropertyMetadata,
    attribute: &'a Annotation,
    tag: i64,
}

/// Recovers schemas from protobuf-net contract attributes
#[derive(Debug, Clone)]
pub struct ContractScan {
    convention: ContractConvention,
}

impl Default for ContractScan {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractScan {
    /// Creates a scan for protobuf-net
    pub fn new() -> Self {
        Self::with_convention(PROTOBUF_NET)
    }

    /// Creates a scan for a custom identity table
    pub fn with_convention(convention: ContractConvention) -> Self {
        Self { convention }
    }

    fn is_contract<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> bool {
        provider
            .get_attribute(ty, self.convention.contract_attribute)
            .is_some()
    }

    fn is_contract_enum<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> bool {
        ty.kind == TypeKind::Enum && self.is_contract(provider, ty)
    }

    fn is_contract_message<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> bool {
        ty.kind == TypeKind::Class
            && self.is_contract(provider, ty)
            && ty.implements(self.convention.extensible_interface)
    }

    fn build_enum<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> SchemaEnum {
        let values = ty
            .fields
            .iter()
            .filter(|f| f.is_static)
            .filter_map(|f| {
                let number = f.constant?;
                let name = provider
                    .get_attribute(f, self.convention.enum_attribute)
                    .and_then(|a| a.named(self.convention.name_argument))
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

    fn members<'a, P: MetadataProvider>(
        &self,
        provider: &P,
        ty: &'a TypeMetadata,
    ) -> Vec<Member<'a>> {
        ty.properties
            .iter()
            .filter_map(|property| {
                let attribute = provider.get_attribute(property, self.convention.member_attribute)?;
                match attribute.positional(0).and_then(AttributeValue::as_i64) {
                    Some(tag) => Some(Member {
                        property,
                        attribute,
                        tag,
                    }),
                    None => {
                        debug!(
                            "Skipping {}.{}: member attribute has no integer tag",
                            ty.full_name, property.name
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Oneof group of a member, from its generated reset method
    fn oneof_group<P: MetadataProvider>(
        &self,
        provider: &P,
        ty: &TypeMetadata,
        property: &PropertyMetadata,
    ) -> Option<String> {
        let reset_name = format!("{}{}", self.convention.reset_method_prefix, property.name);
        let method = ty.parameterless_method(&reset_name)?;
        let body = provider.get_method_body_instructions(method)?;
        let group = union_group_name(body, |field_ref| provider.resolve_field(field_ref));
        trace!("{}.{} oneof group: {:?}", ty.full_name, property.name, group);
        group
    }

    fn member_name<'a>(&self, member: &Member<'a>) -> &'a str {
        member
            .attribute
            .named(self.convention.name_argument)
            .and_then(AttributeValue::as_str)
            .unwrap_or(&member.property.name)
    }

    fn format_hint<P: MetadataProvider>(
        &self,
        provider: &P,
        property: &PropertyMetadata,
        attribute_name: &str,
        argument: &str,
    ) -> WireFormat {
        provider
            .get_attribute(property, attribute_name)
            .and_then(|a| a.named(argument))
            .and_then(AttributeValue::as_i64)
            .map(WireFormat::from_data_format)
            .unwrap_or_default()
    }

    fn build_message<P: MetadataProvider>(&self, provider: &P, ty: &TypeMetadata) -> SchemaMessage {
        debug!("Scanning contract {}", ty.full_name);
        let nested = provider.get_nested_types(ty);
        let mut message = SchemaMessage::new(&ty.name);

        let mut enum_names = HashSet::new();
        for nested_enum in nested.iter().filter(|t| self.is_contract_enum(provider, t)) {
            enum_names.insert(nested_enum.name.as_str());
            message.nested_enums.push(self.build_enum(provider, nested_enum));
        }

        let members = self.members(provider, ty);
        let mut grouped = HashSet::new();

        for (index, member) in members.iter().enumerate() {
            let Some(group) = self.oneof_group(provider, ty, member.property) else {
                continue;
            };
            grouped.insert(index);

            let hint = self.format_hint(
                provider,
                member.property,
                self.convention.member_attribute,
                self.convention.data_format_argument,
            );
            let field = FieldEntry::Field(SchemaField::new(
                self.member_name(member),
                member.tag,
                FieldType::Singular(map_scalar(&member.property.property_type, hint)),
            ));

            match message.oneofs.iter_mut().find(|o| o.name == group) {
                Some(oneof) => oneof.fields.push(field),
                None => message.oneofs.push(SchemaOneof {
                    name: group,
                    fields: vec![field],
                }),
            }
        }

        for (index, member) in members.iter().enumerate() {
            if grouped.contains(&index) {
                continue;
            }

            let property = member.property;
            let field_type = map_type(
                &property.property_type,
                self.format_hint(
                    provider,
                    property,
                    self.convention.member_attribute,
                    self.convention.data_format_argument,
                ),
                self.format_hint(
                    provider,
                    property,
                    self.convention.map_attribute,
                    self.convention.key_format_argument,
                ),
                self.format_hint(
                    provider,
                    property,
                    self.convention.map_attribute,
                    self.convention.value_format_argument,
                ),
            );
            message.fields.push(FieldEntry::Field(SchemaField::new(
                self.member_name(member),
                member.tag,
                field_type,
            )));
        }

        for nested_type in nested {
            if !enum_names.contains(nested_type.name.as_str())
                && self.is_contract_message(provider, nested_type)
            {
                message
                    .nested_messages
                    .push(NestedEntry::Message(self.build_message(provider, nested_type)));
            }
        }

        message
    }
}

impl ExtractionStrategy for ContractScan {
    fn name(&self) -> &'static str {
        self.convention.display_name
    }

    fn runtime_assemblies(&self) -> &'static [&'static str] {
        self.convention.runtime_assemblies
    }

    fn extract<P: MetadataProvider>(&self, provider: &P) -> ProtoFile {
        let types = provider.list_types();
        let mut entries = Vec::new();

        for ty in types.iter().filter(|t| self.is_contract_enum(provider, t)) {
            debug!("Extracting enum {}", ty.full_name);
            entries.push(ProtoEntry {
                source_name: ty.full_name.clone(),
                definition: Definition::Enum(self.build_enum(provider, ty)),
            });
        }

        for ty in types.iter().filter(|t| self.is_contract_message(provider, t)) {
            debug!("Extracting message {}", ty.full_name);
            entries.push(ProtoEntry {
                source_name: ty.full_name.clone(),
                definition: Definition::Message(self.build_message(provider, ty)),
            });
        }

        ProtoFile {
            package: Some(self.convention.package.to_string()),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, Strategy};
    use crate::metadata::{MethodMetadata, Module, OpCode, Operand, TypeRef};
    use crate::proto::{render_message, EmitterConfig};
    use pretty_assertions::assert_eq;

    const CONTRACT: &str = "ProtoBuf.ProtoContractAttribute";
    const MEMBER: &str = "ProtoBuf.ProtoMemberAttribute";

    fn parse(name: &str) -> TypeRef {
        name.parse().unwrap()
    }

    fn contract_class(full_name: &str) -> TypeMetadata {
        TypeMetadata::class(full_name)
            .with_attribute(Annotation::new(CONTRACT))
            .with_interface(TypeRef::named("ProtoBuf.IExtensible"))
    }

    fn member(name: &str, ty: &str, tag: i64) -> PropertyMetadata {
        PropertyMetadata::new(name, parse(ty)).with_attribute(Annotation::new(MEMBER).arg(tag))
    }

    /// `Reset<Member>` body as generated for a member of a oneof
    fn reset_method(owner: &str, member: &str, union_field: &str) -> MethodMetadata {
        MethodMetadata::new(
            format!("Reset{}", member),
            vec![
                Instruction::simple(0, OpCode::Ldarg0),
                Instruction::new(
                    1,
                    OpCode::Ldflda,
                    Operand::Field(FieldRef::new(owner, union_field)),
                ),
                Instruction::new(6, OpCode::LdcI4, Operand::Int(3)),
                Instruction::new(
                    7,
                    OpCode::Call,
                    Operand::Method("ProtoBuf.DiscriminatedUnionObject::Reset".into()),
                ),
                Instruction::simple(12, OpCode::Ret),
            ],
        )
    }

    fn message_x() -> TypeMetadata {
        contract_class("Game.X")
            .with_field(FieldMetadata::new(
                "__pbn__Payload",
                parse("ProtoBuf.DiscriminatedUnionObject"),
            ))
            .with_property(member("Id", "System.Int32", 1))
            .with_property(member("Tags", "System.Collections.Generic.List`1<System.String>", 2))
            .with_property(member("A", "System.String", 3))
            .with_property(member("B", "Game.Item", 4))
            .with_method(reset_method("Game.X", "A", "__pbn__Payload"))
            .with_method(reset_method("Game.X", "B", "__pbn__Payload"))
    }

    fn module(types: Vec<TypeMetadata>) -> Module {
        Module::new("Game.dll", types).with_reference("protobuf-net")
    }

    fn scan(ty: &TypeMetadata, module: &Module) -> SchemaMessage {
        ContractScan::new().build_message(module, ty)
    }

    #[test]
    fn test_plain_members() {
        let ty = contract_class("Game.X")
            .with_property(member("Id", "System.Int32", 1))
            .with_property(member("Tags", "System.Collections.Generic.List`1<System.String>", 2));
        let module = module(vec![ty.clone()]);

        assert_eq!(
            render_message(&scan(&ty, &module), 0, &EmitterConfig::default()),
            "message X {\n    int32 Id = 1;\n    repeated string Tags = 2;\n}"
        );
    }

    #[test]
    fn test_oneof_recovered_from_reset_methods() {
        let ty = message_x();
        let module = module(vec![ty.clone()]);
        let message = scan(&ty, &module);

        assert_eq!(message.oneofs.len(), 1);
        assert_eq!(message.oneofs[0].name, "Payload");
        assert_eq!(
            render_message(&message, 0, &EmitterConfig::new().spaced_blocks(true)),
            "message X {\n    oneof Payload {\n        string A = 3;\n        Item B = 4;\n    }\n\n    int32 Id = 1;\n    repeated string Tags = 2;\n}"
        );
    }

    #[test]
    fn test_oneof_members_are_emitted_once() {
        let ty = message_x();
        let module = module(vec![ty.clone()]);
        let message = scan(&ty, &module);

        let mut names = message.field_names();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "Id", "Tags"]);
    }

    #[test]
    fn test_byte_array_is_bytes() {
        let ty = contract_class("Game.Blob")
            .with_property(member("Data", "System.Byte[]", 1))
            .with_property(member("Chunks", "System.Collections.Generic.List`1<System.Byte[]>", 2));
        let module = module(vec![ty.clone()]);

        assert_eq!(
            render_message(&scan(&ty, &module), 0, &EmitterConfig::default()),
            "message Blob {\n    bytes Data = 1;\n    repeated bytes Chunks = 2;\n}"
        );
    }

    #[test]
    fn test_map_with_format_hints() {
        let ty = contract_class("Game.Scores").with_property(
            member(
                "ById",
                "System.Collections.Generic.Dictionary`2<System.Int64,System.Int32>",
                1,
            )
            .with_attribute(
                Annotation::new("ProtoBuf.ProtoMapAttribute")
                    .named_arg("KeyFormat", 3i64)
                    .named_arg("ValueFormat", 1i64),
            ),
        );
        let module = module(vec![ty.clone()]);

        assert_eq!(
            render_message(&scan(&ty, &module), 0, &EmitterConfig::default()),
            "message Scores {\n    map<sfixed64, sint32> ById = 1;\n}"
        );
    }

    #[test]
    fn test_member_rename_and_data_format() {
        let ty = contract_class("Game.Pos").with_property(
            PropertyMetadata::new("X", parse("System.Int32")).with_attribute(
                Annotation::new(MEMBER)
                    .arg(1i64)
                    .named_arg("Name", "x")
                    .named_arg("DataFormat", 1i64),
            ),
        );
        let module = module(vec![ty.clone()]);

        assert_eq!(
            render_message(&scan(&ty, &module), 0, &EmitterConfig::default()),
            "message Pos {\n    sint32 x = 1;\n}"
        );
    }

    #[test]
    fn test_member_without_integer_tag_is_skipped() {
        let ty = contract_class("Game.Odd")
            .with_property(
                PropertyMetadata::new("Broken", parse("System.Int32"))
                    .with_attribute(Annotation::new(MEMBER).arg("one")),
            )
            .with_property(member("Fine", "System.Boolean", 2));
        let module = module(vec![ty.clone()]);

        assert_eq!(scan(&ty, &module).field_names(), vec!["Fine"]);
    }

    #[test]
    fn test_nested_enum_and_message() {
        let ty = contract_class("Game.Outer")
            .with_property(member("Mode", "Game.Outer/Mode", 1))
            .with_nested(
                TypeMetadata::enumeration("Game.Outer/Mode")
                    .with_attribute(Annotation::new(CONTRACT))
                    .with_field(FieldMetadata::new("value__", parse("System.Int32")))
                    .with_field(
                        FieldMetadata::literal("Fast", "Game.Outer/Mode", 0).with_attribute(
                            Annotation::new("ProtoBuf.ProtoEnumAttribute")
                                .named_arg("Name", "MODE_FAST"),
                        ),
                    )
                    .with_field(FieldMetadata::literal("Slow", "Game.Outer/Mode", 1)),
            )
            .with_nested(
                contract_class("Game.Outer/Inner").with_property(member("V", "System.Double", 1)),
            )
            .with_nested(TypeMetadata::class("Game.Outer/Helper"));
        let module = module(vec![ty.clone()]);

        let expected = "\
message Outer {
    enum Mode {
        MODE_FAST = 0;
        Slow = 1;
    }

    Mode Mode = 1;

    message Inner {
        double V = 1;
    }
}";
        let message = scan(&ty, &module);
        assert_eq!(
            render_message(&message, 0, &EmitterConfig::new().spaced_blocks(true)),
            expected
        );
        assert!(matches!(&message.nested_messages[0], NestedEntry::Message(m) if m.name == "Inner"));
    }

    #[test]
    fn test_nested_enum_is_not_emitted_again_as_message() {
        let ty = contract_class("Game.Outer")
            .with_nested(
                TypeMetadata::enumeration("Game.Outer/Kind")
                    .with_attribute(Annotation::new(CONTRACT))
                    .with_field(FieldMetadata::literal("None", "Game.Outer/Kind", 0)),
            )
            .with_nested(
                contract_class("Game.Outer/Kind").with_property(member("V", "System.Int32", 1)),
            )
            .with_nested(
                contract_class("Game.Outer/Other").with_property(member("W", "System.Int32", 1)),
            );
        let module = module(vec![ty.clone()]);

        let message = scan(&ty, &module);
        assert_eq!(message.nested_enums.len(), 1);
        assert_eq!(message.nested_enums[0].name, "Kind");

        let nested: Vec<_> = message
            .nested_messages
            .iter()
            .filter_map(|n| match n {
                NestedEntry::Message(m) => Some(m.name.as_str()),
                NestedEntry::Unresolved(_) => None,
            })
            .collect();
        assert_eq!(nested, vec!["Other"]);
    }

    #[test]
    fn test_struct_contract_is_not_a_message() {
        let mut value = contract_class("Game.Vec2").with_property(member("X", "System.Single", 1));
        value.kind = TypeKind::Struct;
        let module = module(vec![value]);

        let file = Extractor::new(Strategy::Contract).extract(&module).unwrap();
        assert!(file.entries.is_empty());
    }

    #[test]
    fn test_full_module() {
        let color = TypeMetadata::enumeration("Game.Color")
            .with_attribute(Annotation::new(CONTRACT))
            .with_field(FieldMetadata::literal("Red", "Game.Color", 1));
        let plain = TypeMetadata::class("Game.Plain")
            .with_attribute(Annotation::new(CONTRACT))
            .with_property(member("Id", "System.Int32", 1));
        let types = vec![message_x(), plain, color];

        let text = Extractor::new(Strategy::Contract)
            .render(&module(types))
            .unwrap();

        let expected = "\
syntax = \"proto3\";

package ProtoBufNet;

// Game.Color
enum Color {
    Red = 1;
}

// Game.X
message X {
    oneof Payload {
        string A = 3;
        Item B = 4;
    }

    int32 Id = 1;
    repeated string Tags = 2;
}

";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_output_is_stable() {
        let module = module(vec![message_x()]);
        let extractor = Extractor::new(Strategy::Contract);
        assert_eq!(extractor.render(&module).unwrap(), extractor.render(&module).unwrap());
    }

    #[test]
    fn test_union_group_name_skips_other_fields() {
        let owner = TypeMetadata::class("Game.M")
            .with_field(FieldMetadata::new("__pbn__Count", parse("System.Int32")))
            .with_field(FieldMetadata::new(
                "__pbn__Body",
                parse("ProtoBuf.DiscriminatedUnion64Object"),
            ));
        let module = module(vec![owner]);
        let body = vec![
            Instruction::new(0, OpCode::Ldflda, Operand::Field(FieldRef::new("Game.M", "__pbn__Count"))),
            Instruction::new(5, OpCode::Ldflda, Operand::Field(FieldRef::new("Game.M", "missing"))),
            Instruction::new(10, OpCode::Ldfld, Operand::Field(FieldRef::new("Game.M", "__pbn__Body"))),
            Instruction::new(15, OpCode::Ldsflda, Operand::Field(FieldRef::new("Game.M", "__pbn__Body"))),
        ];

        assert_eq!(
            union_group_name(&body, |f| module.resolve_field(f)),
            Some("Body".to_string())
        );
        assert_eq!(union_group_name(&body[..3], |f| module.resolve_field(f)), None);
    }

    #[test]
    fn test_union_field_without_prefix_keeps_name() {
        let owner = TypeMetadata::class("Game.M").with_field(FieldMetadata::new(
            "choice",
            parse("ProtoBuf.DiscriminatedUnion32Object"),
        ));
        let module = module(vec![owner]);
        let body = vec![Instruction::new(
            0,
            OpCode::Ldflda,
            Operand::Field(FieldRef::new("Game.M", "choice")),
        )];

        assert_eq!(
            union_group_name(&body, |f| module.resolve_field(f)),
            Some("choice".to_string())
        );
    }

    #[test]
    fn test_reset_method_with_parameters_is_ignored() {
        let mut method = reset_method("Game.X", "A", "__pbn__Payload");
        method.parameters.push(parse("System.Int32"));

        let ty = contract_class("Game.X")
            .with_field(FieldMetadata::new(
                "__pbn__Payload",
                parse("ProtoBuf.DiscriminatedUnionObject"),
            ))
            .with_property(member("A", "System.String", 3))
            .with_method(method);
        let module = module(vec![ty.clone()]);

        let message = scan(&ty, &module);
        assert!(message.oneofs.is_empty());
        assert_eq!(message.field_names(), vec!["A"]);
    }
}
