//! Proto3 text emission.
//!
//! Renders a recovered [`ProtoFile`] (or a single message or enum) as
//! `.proto` source. Layout rules:
//!
//! 1. Inside a message: nested enums, then oneof blocks, then plain fields,
//!    then nested messages, each nested message preceded by a blank line
//! 2. A top-level definition's closing brace carries no newline; the file
//!    writer separates entries and prefixes each with a `// <full name>`
//!    comment line
//! 3. Unresolved items render as `// Error: <detail>` in place
//! 4. A merged file has one header; each module's entries follow a
//!    `// File <name>` line
//!
//! ## Extensibility
//!
//! The [`ProtoWriter`] trait allows observing the schema element by element
//! without rendering it, see [`StatsWriter`].

mod writer;

use crate::error::{Error, Result};
use crate::schema::{
    Definition, FieldEntry, MergedFile, NestedEntry, ProtoEntry, ProtoFile, SchemaEnum,
    SchemaMessage, SchemaOneof,
};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

pub use writer::{ProtoWriter, StatsWriter};

/// Proto syntax emitted in the header
pub const SYNTAX: &str = "proto3";

/// Configuration for proto emission
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Indentation string per level (default: 4 spaces)
    pub indent_str: String,
    /// Emit a blank line after every nested enum and oneof block
    pub spaced_blocks: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            indent_str: "    ".to_string(),
            spaced_blocks: false,
        }
    }
}

impl EmitterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether nested enums and oneofs are followed by a blank line
    pub fn spaced_blocks(mut self, spaced: bool) -> Self {
        self.spaced_blocks = spaced;
        self
    }
}

/// Renders a complete file
pub fn render_file(file: &ProtoFile, config: &EmitterConfig) -> String {
    let mut output = String::new();
    Emitter::new(&mut output, config)
        .write_file(file)
        .expect("String write cannot fail");
    output
}

/// Renders several recovered files under one header, each section
/// introduced by a `// File <name>` line
pub fn render_merged(merged: &MergedFile, config: &EmitterConfig) -> String {
    let mut output = String::new();
    Emitter::new(&mut output, config)
        .write_merged(merged)
        .expect("String write cannot fail");
    output
}

/// Renders a message at the given indentation level, as a top-level entry
/// when `level` is zero
pub fn render_message(message: &SchemaMessage, level: usize, config: &EmitterConfig) -> String {
    let mut output = String::new();
    let mut emitter = Emitter::new(&mut output, config);
    emitter.indent_level = level;
    emitter
        .write_message(message, level == 0)
        .expect("String write cannot fail");
    output
}

/// Renders an enum at the given indentation level
pub fn render_enum(enum_type: &SchemaEnum, level: usize, config: &EmitterConfig) -> String {
    let mut output = String::new();
    let mut emitter = Emitter::new(&mut output, config);
    emitter.indent_level = level;
    emitter
        .write_enum(enum_type)
        .expect("String write cannot fail");
    output
}

/// Writes rendered text to `path`, creating missing parent directories
pub fn write_to_path(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::file_write(path, e))
}

/// Writes proto3 text into any `fmt::Write` sink
struct Emitter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a EmitterConfig,
    indent_level: usize,
}

impl<'a, W: FmtWrite> Emitter<'a, W> {
    fn new(writer: &'a mut W, config: &'a EmitterConfig) -> Self {
        Self {
            writer,
            config,
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "{}", s)
    }

    fn write_header(&mut self, package: Option<&str>) -> std::fmt::Result {
        writeln!(self.writer, "syntax = \"{}\";", SYNTAX)?;
        writeln!(self.writer)?;

        if let Some(package) = package {
            writeln!(self.writer, "package {};", package)?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_entries(&mut self, entries: &[ProtoEntry]) -> std::fmt::Result {
        for entry in entries {
            writeln!(self.writer, "// {}", entry.source_name)?;
            match &entry.definition {
                Definition::Enum(e) => self.write_enum(e)?,
                Definition::Message(m) => self.write_message(m, true)?,
                Definition::Unresolved(detail) => write!(self.writer, "// Error: {}", detail)?,
            }
            writeln!(self.writer)?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    fn write_file(&mut self, file: &ProtoFile) -> std::fmt::Result {
        self.write_header(file.package.as_deref())?;
        self.write_entries(&file.entries)
    }

    fn write_merged(&mut self, merged: &MergedFile) -> std::fmt::Result {
        self.write_header(merged.package.as_deref())?;
        for section in &merged.sections {
            writeln!(self.writer, "// File {}", section.name)?;
            writeln!(self.writer)?;
            self.write_entries(&section.entries)?;
        }
        Ok(())
    }

    fn write_enum(&mut self, enum_type: &SchemaEnum) -> std::fmt::Result {
        self.writeln(&format!("enum {} {{", enum_type.name))?;
        self.indent();

        for value in &enum_type.values {
            self.writeln(&format!("{} = {};", value.name, value.number))?;
        }

        self.dedent();
        self.write_indent()?;
        write!(self.writer, "}}")
    }

    fn write_message(&mut self, message: &SchemaMessage, top_level: bool) -> std::fmt::Result {
        self.writeln(&format!("message {} {{", message.name))?;
        self.indent();

        for enum_type in &message.nested_enums {
            self.write_enum(enum_type)?;
            writeln!(self.writer)?;
            if self.config.spaced_blocks {
                writeln!(self.writer)?;
            }
        }

        for oneof in &message.oneofs {
            self.write_oneof(oneof)?;
        }

        for entry in &message.fields {
            self.write_field_entry(entry)?;
        }

        for nested in &message.nested_messages {
            writeln!(self.writer)?;
            match nested {
                NestedEntry::Message(m) => self.write_message(m, false)?,
                NestedEntry::Unresolved(detail) => self.writeln(&format!("// Error: {}", detail))?,
            }
        }

        self.dedent();
        self.write_indent()?;
        write!(self.writer, "}}")?;
        if !top_level {
            writeln!(self.writer)?;
        }

        Ok(())
    }

    fn write_oneof(&mut self, oneof: &SchemaOneof) -> std::fmt::Result {
        self.writeln(&format!("oneof {} {{", oneof.name))?;
        self.indent();

        for entry in &oneof.fields {
            self.write_field_entry(entry)?;
        }

        self.dedent();
        self.writeln("}")?;
        if self.config.spaced_blocks {
            writeln!(self.writer)?;
        }

        Ok(())
    }

    fn write_field_entry(&mut self, entry: &FieldEntry) -> std::fmt::Result {
        match entry {
            FieldEntry::Field(field) => {
                self.writeln(&format!("{} {} = {};", field.ty, field.name, field.number))
            }
            FieldEntry::Unresolved(detail) => self.writeln(&format!("// Error: {}", detail)),
        }
    }
}
