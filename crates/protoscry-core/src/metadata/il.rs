//! Method body instructions.
//!
//! Bodies are kept as flat, immutable instruction lists. Only the opcodes
//! that matter for schema recovery are named; everything else decodes to
//! [`OpCode::Other`].

use super::types::TypeRef;
use serde::{Deserialize, Serialize};

/// CIL opcodes, by their disassembly mnemonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// `nop`
    #[serde(rename = "nop")]
    Nop,
    /// `ldarg.0`
    #[serde(rename = "ldarg.0")]
    Ldarg0,
    /// `ldnull`
    #[serde(rename = "ldnull")]
    Ldnull,
    /// `ldc.i4`
    #[serde(rename = "ldc.i4")]
    LdcI4,
    /// `ldfld`
    #[serde(rename = "ldfld")]
    Ldfld,
    /// `ldflda`
    #[serde(rename = "ldflda")]
    Ldflda,
    /// `ldsflda`
    #[serde(rename = "ldsflda")]
    Ldsflda,
    /// `stfld`
    #[serde(rename = "stfld")]
    Stfld,
    /// `call`
    #[serde(rename = "call")]
    Call,
    /// `callvirt`
    #[serde(rename = "callvirt")]
    Callvirt,
    /// `initobj`
    #[serde(rename = "initobj")]
    Initobj,
    /// `pop`
    #[serde(rename = "pop")]
    Pop,
    /// `ret`
    #[serde(rename = "ret")]
    Ret,
    /// Any opcode not listed above
    #[serde(other)]
    Other,
}

impl OpCode {
    /// Returns true for instructions that push the address of a field
    pub fn loads_field_address(&self) -> bool {
        matches!(self, OpCode::Ldflda | OpCode::Ldsflda)
    }
}

/// Reference to a field from an instruction operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Full name of the type declaring the field
    pub declaring_type: String,
    /// Field name
    pub name: String,
}

impl FieldRef {
    /// Creates a new field reference
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

/// Instruction operand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// No operand
    #[default]
    None,
    /// Integer literal
    Int(i64),
    /// String literal
    String(String),
    /// Type token
    Type(TypeRef),
    /// Method token, as a display name
    Method(String),
    /// Field token
    Field(FieldRef),
}

impl Operand {
    /// Returns the field reference if this operand is a field token
    pub fn as_field(&self) -> Option<&FieldRef> {
        match self {
            Operand::Field(field) => Some(field),
            _ => None,
        }
    }
}

/// A single instruction of a method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Byte offset within the body
    #[serde(default)]
    pub offset: u32,
    /// Opcode
    pub opcode: OpCode,
    /// Operand, if any
    #[serde(default)]
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Self {
            offset,
            opcode,
            operand,
        }
    }

    /// Creates an instruction without an operand
    pub fn simple(offset: u32, opcode: OpCode) -> Self {
        Self::new(offset, opcode, Operand::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_instruction() {
        let json = r#"{
            "offset": 1,
            "opcode": "ldflda",
            "operand": { "kind": "field", "value": { "declaring_type": "Game.Msg", "name": "__pbn__Payload" } }
        }"#;
        let instruction: Instruction = serde_json::from_str(json).unwrap();

        assert!(instruction.opcode.loads_field_address());
        assert_eq!(
            instruction.operand.as_field(),
            Some(&FieldRef::new("Game.Msg", "__pbn__Payload"))
        );
    }

    #[test]
    fn test_unknown_opcode_decodes_as_other() {
        let instruction: Instruction = serde_json::from_str(r#"{ "opcode": "ldc.r8" }"#).unwrap();
        assert_eq!(instruction.opcode, OpCode::Other);
        assert_eq!(instruction.operand, Operand::None);
        assert!(!instruction.opcode.loads_field_address());
    }
}
