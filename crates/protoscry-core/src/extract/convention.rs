//! Identity tables for the supported code-generation conventions.
//!
//! Each convention is recognised purely by the names of the runtime types
//! and attributes its generated code refers to. The module being analysed
//! only has to reference the runtime assembly; it is never loaded.

/// Identities used by Google.Protobuf generated code
#[derive(Debug, Clone, Copy)]
pub struct DescriptorConvention {
    /// Display name for diagnostics
    pub display_name: &'static str,
    /// Accepted runtime assembly names
    pub runtime_assemblies: &'static [&'static str],
    /// Interfaces (generic definitions) marking a generated message class
    pub message_interfaces: &'static [&'static str],
    /// Attribute carrying the original proto name of an enum value
    pub rename_attribute: &'static str,
    /// Named argument of the rename attribute
    pub rename_argument: &'static str,
    /// Nested class holding a message's nested types
    pub nested_container: &'static str,
    /// Name suffix of synthetic map entry messages
    pub map_entry_suffix: &'static str,
}

/// Google.Protobuf 3.x
pub const GOOGLE_PROTOBUF_V3: DescriptorConvention = DescriptorConvention {
    display_name: "Google.Protobuf",
    runtime_assemblies: &["Google.Protobuf"],
    message_interfaces: &[
        "Google.Protobuf.IMessage",
        "Google.Protobuf.IMessage`1",
        "Google.Protobuf.IBufferMessage",
    ],
    rename_attribute: "Google.Protobuf.Reflection.OriginalNameAttribute",
    rename_argument: "Name",
    nested_container: "Types",
    map_entry_suffix: "Entry",
};

/// Identities used by protobuf-net contract types
#[derive(Debug, Clone, Copy)]
pub struct ContractConvention {
    /// Display name for diagnostics
    pub display_name: &'static str,
    /// Accepted runtime assembly names
    pub runtime_assemblies: &'static [&'static str],
    /// Type-level contract attribute
    pub contract_attribute: &'static str,
    /// Member-level attribute carrying the tag
    pub member_attribute: &'static str,
    /// Enum value attribute
    pub enum_attribute: &'static str,
    /// Map hint attribute
    pub map_attribute: &'static str,
    /// Marker interface implemented by generated message classes
    pub extensible_interface: &'static str,
    /// Named argument carrying a rename
    pub name_argument: &'static str,
    /// Named argument carrying the wire-format hint
    pub data_format_argument: &'static str,
    /// Named argument carrying the map key hint
    pub key_format_argument: &'static str,
    /// Named argument carrying the map value hint
    pub value_format_argument: &'static str,
    /// Simple-name prefix of the oneof storage field types
    pub union_type_prefix: &'static str,
    /// Prefix generated code puts on backing field names
    pub backing_field_prefix: &'static str,
    /// Prefix of the generated per-member reset methods
    pub reset_method_prefix: &'static str,
    /// Package written to the output file
    pub package: &'static str,
}

/// protobuf-net 2.x and 3.x
pub const PROTOBUF_NET: ContractConvention = ContractConvention {
    display_name: "protobuf-net",
    runtime_assemblies: &["protobuf-net", "protobuf-net.Core"],
    contract_attribute: "ProtoBuf.ProtoContractAttribute",
    member_attribute: "ProtoBuf.ProtoMemberAttribute",
    enum_attribute: "ProtoBuf.ProtoEnumAttribute",
    map_attribute: "ProtoBuf.ProtoMapAttribute",
    extensible_interface: "ProtoBuf.IExtensible",
    name_argument: "Name",
    data_format_argument: "DataFormat",
    key_format_argument: "KeyFormat",
    value_format_argument: "ValueFormat",
    union_type_prefix: "DiscriminatedUnion",
    backing_field_prefix: "__pbn__",
    reset_method_prefix: "Reset",
    package: "ProtoBufNet",
};
