//! Instruction decoder
//!
//! Turns a raw 32-bit instruction word into the [`Instr`] sum type,
//! with one variant per encoding family and an operation enum per
//! family where funct3/funct7 selects between operations. Decoding
//! fails (and the machine reports the instruction as not implemented)
//! for an opcode outside the eight families, or for function fields
//! that do not name an operation within a known family.

use crate::instr_type::{
    decode_btype, decode_itype, decode_jtype, decode_rtype, decode_stype,
    decode_utype, funct3, funct7, opcode, Itype, Rtype, SBtype, UJtype,
};
use crate::opcodes::*;
use crate::utils::{interpret_u32_as_signed, sign_extend};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("got invalid or unimplemented opcode 0x{0:x}")]
    InvalidOpcode(u32),
    #[error("got invalid function fields in instruction 0x{0:08x}")]
    InvalidFunction(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegRegOp {
    Add,
    Sub,
    Xor,
    Or,
    And,
    Sll,
    Srl,
    Sra,
    Slt,
    Sltu,
}

impl RegRegOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Xor => "xor",
            Self::Or => "or",
            Self::And => "and",
            Self::Sll => "sll",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegImmOp {
    Addi,
    Xori,
    Ori,
    Andi,
    Slti,
    Sltiu,
}

impl RegImmOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Addi => "addi",
            Self::Xori => "xori",
            Self::Ori => "ori",
            Self::Andi => "andi",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

impl LoadOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Sb,
    Sh,
    Sw,
}

impl StoreOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    Beq,
    Bne,
    Blt,
    Bltu,
    Bge,
    Bgeu,
}

impl BranchOp {
    fn mnemonic(&self) -> &'static str {
        match self {
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blt => "blt",
            Self::Bltu => "bltu",
            Self::Bge => "bge",
            Self::Bgeu => "bgeu",
        }
    }
}

/// A decoded RISK-XVII instruction
///
/// Field names follow the instruction set reference: dest/src are
/// register indices, base is the address register of a load, store or
/// jalr, and immediates are raw encoding fields (sign extension
/// happens at execution). The branch offset includes its implicit low
/// zero (13 bits), as does the jal offset (21 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Perform an operation between the values in src1 and src2 and
    /// place the result in dest. Shift amounts use the low 5 bits of
    /// src2, and sra is a rotate right.
    RegReg {
        op: RegRegOp,
        dest: u8,
        src1: u8,
        src2: u8,
    },
    /// Perform an operation between the value in src and the
    /// sign-extended 12-bit immediate, placing the result in dest.
    RegImm {
        op: RegImmOp,
        dest: u8,
        src: u8,
        imm: u16,
    },
    /// Load from address base + sext(offset) into dest. lb/lh sign
    /// extend the loaded value; lbu/lhu zero extend it.
    Load {
        op: LoadOp,
        dest: u8,
        base: u8,
        offset: u16,
    },
    /// Store the low 8/16/32 bits of src to address base +
    /// sext(offset).
    Store {
        op: StoreOp,
        src: u8,
        base: u8,
        offset: u16,
    },
    /// If the comparison of src1 and src2 holds, set pc = pc +
    /// sext(offset); otherwise fall through to the next instruction.
    Branch {
        op: BranchOp,
        src1: u8,
        src2: u8,
        offset: u16,
    },
    /// Store pc + 4 in dest, then set pc = base + sext(offset). The
    /// target replaces pc verbatim (no further increment and no
    /// alignment adjustment).
    Jalr { dest: u8, base: u8, offset: u16 },
    /// Load u_immediate into dest[31:12], filling the low 12 bits
    /// with zeros.
    Lui { dest: u8, u_immediate: u32 },
    /// Store pc + 4 in dest and set pc = pc + sext(offset).
    Jal { dest: u8, offset: u32 },
}

impl Instr {
    pub fn decode(instr: u32) -> Result<Self, DecodeError> {
        let op = opcode(instr);
        match op {
            OP => {
                let Rtype { rs1, rs2, rd } = decode_rtype(instr);
                let op = match (funct3(instr), funct7(instr)) {
                    (FUNCT3_ADD, 0b0000000) => RegRegOp::Add,
                    (FUNCT3_SUB, FUNCT7_SUB) => RegRegOp::Sub,
                    (FUNCT3_XOR, 0b0000000) => RegRegOp::Xor,
                    (FUNCT3_OR, 0b0000000) => RegRegOp::Or,
                    (FUNCT3_AND, 0b0000000) => RegRegOp::And,
                    (FUNCT3_SLL, 0b0000000) => RegRegOp::Sll,
                    (FUNCT3_SRL, 0b0000000) => RegRegOp::Srl,
                    (FUNCT3_SRA, FUNCT7_SRA) => RegRegOp::Sra,
                    (FUNCT3_SLT, 0b0000000) => RegRegOp::Slt,
                    (FUNCT3_SLTU, 0b0000000) => RegRegOp::Sltu,
                    _ => return Err(DecodeError::InvalidFunction(instr)),
                };
                Ok(Self::RegReg {
                    op,
                    dest: rd,
                    src1: rs1,
                    src2: rs2,
                })
            }
            OP_IMM => {
                let Itype { rs1, imm, rd } = decode_itype(instr);
                let op = match funct3(instr) {
                    FUNCT3_ADDI => RegImmOp::Addi,
                    FUNCT3_XORI => RegImmOp::Xori,
                    FUNCT3_ORI => RegImmOp::Ori,
                    FUNCT3_ANDI => RegImmOp::Andi,
                    FUNCT3_SLTI => RegImmOp::Slti,
                    FUNCT3_SLTIU => RegImmOp::Sltiu,
                    _ => return Err(DecodeError::InvalidFunction(instr)),
                };
                Ok(Self::RegImm {
                    op,
                    dest: rd,
                    src: rs1,
                    imm,
                })
            }
            OP_LOAD => {
                let Itype { rs1, imm, rd } = decode_itype(instr);
                let op = match funct3(instr) {
                    FUNCT3_B => LoadOp::Lb,
                    FUNCT3_H => LoadOp::Lh,
                    FUNCT3_W => LoadOp::Lw,
                    FUNCT3_BU => LoadOp::Lbu,
                    FUNCT3_HU => LoadOp::Lhu,
                    _ => return Err(DecodeError::InvalidFunction(instr)),
                };
                Ok(Self::Load {
                    op,
                    dest: rd,
                    base: rs1,
                    offset: imm,
                })
            }
            OP_JALR => {
                if funct3(instr) != FUNCT3_JALR {
                    return Err(DecodeError::InvalidFunction(instr));
                }
                let Itype { rs1, imm, rd } = decode_itype(instr);
                Ok(Self::Jalr {
                    dest: rd,
                    base: rs1,
                    offset: imm,
                })
            }
            OP_STORE => {
                let SBtype { rs1, rs2, imm } = decode_stype(instr);
                let op = match funct3(instr) {
                    FUNCT3_B => StoreOp::Sb,
                    FUNCT3_H => StoreOp::Sh,
                    FUNCT3_W => StoreOp::Sw,
                    _ => return Err(DecodeError::InvalidFunction(instr)),
                };
                Ok(Self::Store {
                    op,
                    src: rs2,
                    base: rs1,
                    offset: imm,
                })
            }
            OP_BRANCH => {
                let SBtype { rs1, rs2, imm } = decode_btype(instr);
                let op = match funct3(instr) {
                    FUNCT3_BEQ => BranchOp::Beq,
                    FUNCT3_BNE => BranchOp::Bne,
                    FUNCT3_BLT => BranchOp::Blt,
                    FUNCT3_BLTU => BranchOp::Bltu,
                    FUNCT3_BGE => BranchOp::Bge,
                    FUNCT3_BGEU => BranchOp::Bgeu,
                    _ => return Err(DecodeError::InvalidFunction(instr)),
                };
                Ok(Self::Branch {
                    op,
                    src1: rs1,
                    src2: rs2,
                    offset: imm,
                })
            }
            OP_LUI => {
                let UJtype { rd, imm } = decode_utype(instr);
                Ok(Self::Lui {
                    dest: rd,
                    u_immediate: imm,
                })
            }
            OP_JAL => {
                let UJtype { rd, imm } = decode_jtype(instr);
                Ok(Self::Jal {
                    dest: rd,
                    offset: imm,
                })
            }
            _ => Err(DecodeError::InvalidOpcode(op)),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegReg {
                op,
                dest,
                src1,
                src2,
            } => {
                write!(f, "{} x{dest}, x{src1}, x{src2}", op.mnemonic())
            }
            Self::RegImm { op, dest, src, imm } => {
                let imm = interpret_u32_as_signed(sign_extend(*imm, 11));
                write!(f, "{} x{dest}, x{src}, {imm}", op.mnemonic())
            }
            Self::Load {
                op,
                dest,
                base,
                offset,
            } => {
                let offset = interpret_u32_as_signed(sign_extend(*offset, 11));
                write!(f, "{} x{dest}, {offset}(x{base})", op.mnemonic())
            }
            Self::Store {
                op,
                src,
                base,
                offset,
            } => {
                let offset = interpret_u32_as_signed(sign_extend(*offset, 11));
                write!(f, "{} x{src}, {offset}(x{base})", op.mnemonic())
            }
            Self::Branch {
                op,
                src1,
                src2,
                offset,
            } => {
                let offset = interpret_u32_as_signed(sign_extend(*offset, 12));
                write!(f, "{} x{src1}, x{src2}, {offset}", op.mnemonic())
            }
            Self::Jalr { dest, base, offset } => {
                let offset = interpret_u32_as_signed(sign_extend(*offset, 11));
                write!(f, "jalr x{dest}, {offset}(x{base})")
            }
            Self::Lui { dest, u_immediate } => {
                write!(f, "lui x{dest}, 0x{u_immediate:x}")
            }
            Self::Jal { dest, offset } => {
                let offset = interpret_u32_as_signed(sign_extend(*offset, 20));
                write!(f, "jal x{dest}, {offset}")
            }
        }
    }
}
