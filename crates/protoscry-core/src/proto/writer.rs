//! Extensible schema visiting traits.
//!
//! This module provides the [`ProtoWriter`] trait for observing a recovered
//! [`ProtoFile`] element by element, see [`ProtoFile::visit`].

use crate::schema::{ProtoFile, SchemaEnum, SchemaField, SchemaMessage, SchemaOneof};
use std::fmt::Result;

/// Trait for walking recovered proto elements.
///
/// Every callback has a no-op default, so implementors only override
/// what they care about.
///
/// # Example
///
/// ```
/// use protoscry_core::proto::ProtoWriter;
/// use protoscry_core::schema::SchemaMessage;
///
/// #[derive(Default)]
/// struct MessageNames(Vec<String>);
///
/// impl ProtoWriter for MessageNames {
///     fn write_message(&mut self, message: &SchemaMessage) -> std::fmt::Result {
///         self.0.push(message.name.clone());
///         Ok(())
///     }
/// }
/// ```
pub trait ProtoWriter {
    /// Called once before any entry
    fn write_file(&mut self, file: &ProtoFile) -> Result {
        let _ = file;
        Ok(())
    }

    /// Called for every message, nested ones included
    fn write_message(&mut self, message: &SchemaMessage) -> Result {
        let _ = message;
        Ok(())
    }

    /// Called for every resolved field, oneof members included
    fn write_field(&mut self, field: &SchemaField) -> Result {
        let _ = field;
        Ok(())
    }

    /// Called for every enum, nested ones included
    fn write_enum(&mut self, enum_type: &SchemaEnum) -> Result {
        let _ = enum_type;
        Ok(())
    }

    /// Called for every oneof group before its members
    fn write_oneof(&mut self, oneof: &SchemaOneof) -> Result {
        let _ = oneof;
        Ok(())
    }

    /// Called for every unresolved marker
    fn write_unresolved(&mut self, detail: &str) -> Result {
        let _ = detail;
        Ok(())
    }
}

/// A writer that collects statistics about the recovered schema
#[derive(Debug, Default)]
pub struct StatsWriter {
    /// Number of messages
    pub message_count: usize,
    /// Number of fields
    pub field_count: usize,
    /// Number of oneof groups
    pub oneof_count: usize,
    /// Number of enums
    pub enum_count: usize,
    /// Number of enum values
    pub enum_value_count: usize,
    /// Number of unresolved markers
    pub unresolved_count: usize,
}

impl ProtoWriter for StatsWriter {
    fn write_message(&mut self, _message: &SchemaMessage) -> Result {
        self.message_count += 1;
        Ok(())
    }

    fn write_field(&mut self, _field: &SchemaField) -> Result {
        self.field_count += 1;
        Ok(())
    }

    fn write_enum(&mut self, enum_type: &SchemaEnum) -> Result {
        self.enum_count += 1;
        self.enum_value_count += enum_type.values.len();
        Ok(())
    }

    fn write_oneof(&mut self, _oneof: &SchemaOneof) -> Result {
        self.oneof_count += 1;
        Ok(())
    }

    fn write_unresolved(&mut self, _detail: &str) -> Result {
        self.unresolved_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Definition, FieldEntry, FieldType, NestedEntry, ProtoEntry, SchemaEnumValue,
    };

    #[test]
    fn test_stats_writer() {
        let mut inner = SchemaMessage::new("Inner");
        inner.fields.push(FieldEntry::Unresolved("Map fields count 1 for x".into()));

        let mut outer = SchemaMessage::new("Outer");
        outer.fields.push(FieldEntry::Field(SchemaField::new(
            "Id",
            1,
            FieldType::Singular("int32".into()),
        )));
        outer.oneofs.push(SchemaOneof {
            name: "Payload".into(),
            fields: vec![FieldEntry::Field(SchemaField::new(
                "A",
                2,
                FieldType::Singular("string".into()),
            ))],
        });
        outer.nested_messages.push(NestedEntry::Message(inner));
        outer.nested_enums.push(SchemaEnum {
            name: "Kind".into(),
            values: vec![SchemaEnumValue {
                name: "NONE".into(),
                number: 0,
            }],
        });

        let file = ProtoFile {
            package: None,
            entries: vec![ProtoEntry {
                source_name: "Game.Outer".into(),
                definition: Definition::Message(outer),
            }],
        };

        let mut writer = StatsWriter::default();
        file.visit(&mut writer).unwrap();

        assert_eq!(writer.message_count, 2);
        assert_eq!(writer.field_count, 2);
        assert_eq!(writer.oneof_count, 1);
        assert_eq!(writer.enum_count, 1);
        assert_eq!(writer.enum_value_count, 1);
        assert_eq!(writer.unresolved_count, 1);
    }
}
