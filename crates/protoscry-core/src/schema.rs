//! Recovered schema model.
//!
//! Built fresh for every top-level type and handed to the emitter. Items
//! the extractors could not resolve stay in place as `Unresolved` markers so
//! the output keeps its shape and the problem is visible in the text.

use crate::proto::ProtoWriter;
use std::fmt;

/// Type and cardinality of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Singular field of the given type
    Singular(String),
    /// `repeated` field of the given element type
    Repeated(String),
    /// `map<K, V>` field
    Map {
        /// Key type
        key: String,
        /// Value type
        value: String,
    },
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Singular(ty) => f.write_str(ty),
            FieldType::Repeated(ty) => write!(f, "repeated {}", ty),
            FieldType::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}

/// A resolved field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Field name, after any rename
    pub name: String,
    /// Tag number, passed through as found
    pub number: i64,
    /// Type and cardinality
    pub ty: FieldType,
}

impl SchemaField {
    /// Creates a field
    pub fn new(name: impl Into<String>, number: i64, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
        }
    }
}

/// A field slot that may have failed to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEntry {
    /// Resolved field
    Field(SchemaField),
    /// Resolution failure, rendered as a comment
    Unresolved(String),
}

/// A oneof group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOneof {
    /// Group name
    pub name: String,
    /// Members in declaration order
    pub fields: Vec<FieldEntry>,
}

/// A nested message slot that may have failed to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NestedEntry {
    /// Resolved nested message
    Message(SchemaMessage),
    /// Resolution failure, rendered as a comment
    Unresolved(String),
}

/// A message definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMessage {
    /// Message name
    pub name: String,
    /// Fields outside any oneof
    pub fields: Vec<FieldEntry>,
    /// Oneof groups
    pub oneofs: Vec<SchemaOneof>,
    /// Nested messages
    pub nested_messages: Vec<NestedEntry>,
    /// Nested enums
    pub nested_enums: Vec<SchemaEnum>,
}

impl SchemaMessage {
    /// Creates an empty message
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns every resolved field name, oneof members included
    pub fn field_names(&self) -> Vec<&str> {
        let oneof_fields = self.oneofs.iter().flat_map(|o| o.fields.iter());
        oneof_fields
            .chain(self.fields.iter())
            .filter_map(|entry| match entry {
                FieldEntry::Field(field) => Some(field.name.as_str()),
                FieldEntry::Unresolved(_) => None,
            })
            .collect()
    }
}

/// An enum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEnumValue {
    /// Value name, after any rename
    pub name: String,
    /// Underlying integer constant
    pub number: i64,
}

/// An enum definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEnum {
    /// Enum name
    pub name: String,
    /// Values in declaration order
    pub values: Vec<SchemaEnumValue>,
}

/// A top-level definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// Enum
    Enum(SchemaEnum),
    /// Message
    Message(SchemaMessage),
    /// The type could not be extracted at all
    Unresolved(String),
}

/// One top-level entry of the output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoEntry {
    /// Full name of the originating type
    pub source_name: String,
    /// Recovered definition
    pub definition: Definition,
}

/// A complete recovered `.proto` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoFile {
    /// Optional package statement
    pub package: Option<String>,
    /// Entries in output order (enums first, then messages)
    pub entries: Vec<ProtoEntry>,
}

impl ProtoFile {
    /// Walks the file with a [`ProtoWriter`], depth first
    pub fn visit<W: ProtoWriter + ?Sized>(&self, writer: &mut W) -> fmt::Result {
        writer.write_file(self)?;
        for entry in &self.entries {
            match &entry.definition {
                Definition::Enum(e) => writer.write_enum(e)?,
                Definition::Message(m) => visit_message(m, writer)?,
                Definition::Unresolved(detail) => writer.write_unresolved(detail)?,
            }
        }
        Ok(())
    }
}

/// One input module's share of a [`MergedFile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSection {
    /// Label written above the section, usually the module file name
    pub name: String,
    /// Entries recovered from that module
    pub entries: Vec<ProtoEntry>,
}

/// Several recovered files combined under a single header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedFile {
    /// Package of the first file that declared one
    pub package: Option<String>,
    /// Sections in the order they were added
    pub sections: Vec<MergedSection>,
}

impl MergedFile {
    /// Creates an empty merged file
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `file` as a section named `name`.
    ///
    /// Entries identical to one already merged (same source type, same
    /// definition) are dropped. Returns the number of entries dropped.
    pub fn push(&mut self, name: impl Into<String>, file: ProtoFile) -> usize {
        if self.package.is_none() {
            self.package = file.package;
        }

        let total = file.entries.len();
        let entries: Vec<_> = file
            .entries
            .into_iter()
            .filter(|entry| !self.contains(entry))
            .collect();
        let dropped = total - entries.len();

        self.sections.push(MergedSection {
            name: name.into(),
            entries,
        });
        dropped
    }

    /// Returns true if an identical entry was already merged
    pub fn contains(&self, entry: &ProtoEntry) -> bool {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .any(|e| e == entry)
    }

    /// Total number of entries across all sections
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }
}

fn visit_message<W: ProtoWriter + ?Sized>(message: &SchemaMessage, writer: &mut W) -> fmt::Result {
    writer.write_message(message)?;
    for e in &message.nested_enums {
        writer.write_enum(e)?;
    }
    for oneof in &message.oneofs {
        writer.write_oneof(oneof)?;
        visit_fields(&oneof.fields, writer)?;
    }
    visit_fields(&message.fields, writer)?;
    for nested in &message.nested_messages {
        match nested {
            NestedEntry::Message(m) => visit_message(m, writer)?,
            NestedEntry::Unresolved(detail) => writer.write_unresolved(detail)?,
        }
    }
    Ok(())
}

fn visit_fields<W: ProtoWriter + ?Sized>(fields: &[FieldEntry], writer: &mut W) -> fmt::Result {
    for entry in fields {
        match entry {
            FieldEntry::Field(field) => writer.write_field(field)?,
            FieldEntry::Unresolved(detail) => writer.write_unresolved(detail)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_display() {
        assert_eq!(FieldType::Singular("int32".into()).to_string(), "int32");
        assert_eq!(FieldType::Repeated("string".into()).to_string(), "repeated string");
        assert_eq!(
            FieldType::Map {
                key: "string".into(),
                value: "Item".into()
            }
            .to_string(),
            "map<string, Item>"
        );
    }

    #[test]
    fn test_field_names_cover_oneofs() {
        let mut message = SchemaMessage::new("M");
        message.fields.push(FieldEntry::Field(SchemaField::new(
            "Id",
            1,
            FieldType::Singular("int32".into()),
        )));
        message.fields.push(FieldEntry::Unresolved("broken".into()));
        message.oneofs.push(SchemaOneof {
            name: "Payload".into(),
            fields: vec![FieldEntry::Field(SchemaField::new(
                "A",
                3,
                FieldType::Singular("string".into()),
            ))],
        });

        assert_eq!(message.field_names(), vec!["A", "Id"]);
    }

    fn enum_entry(source: &str, value: &str) -> ProtoEntry {
        ProtoEntry {
            source_name: source.into(),
            definition: Definition::Enum(SchemaEnum {
                name: simple(source),
                values: vec![SchemaEnumValue {
                    name: value.into(),
                    number: 0,
                }],
            }),
        }
    }

    fn simple(source: &str) -> String {
        source.rsplit('.').next().unwrap_or(source).to_string()
    }

    #[test]
    fn test_merge_drops_identical_entries() {
        let mut merged = MergedFile::new();
        let first = ProtoFile {
            package: Some("ProtoBufNet".into()),
            entries: vec![enum_entry("Game.Color", "RED"), enum_entry("Game.Kind", "A")],
        };
        let second = ProtoFile {
            package: Some("Other".into()),
            entries: vec![
                enum_entry("Game.Color", "RED"),
                enum_entry("Game.Kind", "B"),
                enum_entry("Game.Size", "SMALL"),
            ],
        };

        assert_eq!(merged.push("Login.json", first), 0);
        assert_eq!(merged.push("Shop.json", second), 1);

        assert_eq!(merged.package.as_deref(), Some("ProtoBufNet"));
        assert_eq!(merged.entry_count(), 4);
        let shop: Vec<_> = merged.sections[1]
            .entries
            .iter()
            .map(|e| e.source_name.as_str())
            .collect();
        assert_eq!(shop, vec!["Game.Kind", "Game.Size"]);
    }
}
