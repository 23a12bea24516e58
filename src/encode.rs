//! Instruction encoders
//!
//! Helpers and macros for assembling RISK-XVII instruction words,
//! one macro per mnemonic (e.g. `addi!(x1, x0, -23)`). These are the
//! inverse of the decoder, and are what the test suite uses to build
//! programs.

use crate::utils::{extract_field, interpret_i32_as_unsigned};

pub use crate::opcodes::*;

/// Make an I-type instruction. Only produces a valid I-type
/// instruction if the arguments are in range.
pub fn itype(imm: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    imm << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

/// Make a U- or UJ-type instruction (if you are making a UJ-type
/// instruction, make sure to construct the immediate field correctly
/// using jtype_imm_field)
pub fn ujtype(imm: u32, rd: u32, opcode: u32) -> u32 {
    imm << 12 | rd << 7 | opcode
}

/// Make an R- or S-type instruction. These instructions have the same
/// number of fields of the same size. The meaning of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
pub fn rstype(
    a: u32,
    rs2: u32,
    rs1: u32,
    funct3: u32,
    b: u32,
    opcode: u32,
) -> u32 {
    a << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | b << 7 | opcode
}

/// Convert a register name (e.g. x3) to the register value (e.g. 3)
pub fn reg_num_impl(reg_name: &str) -> Result<u32, &'static str> {
    if reg_name.len() != 2 && reg_name.len() != 3 {
        return Err("register name must be exactly two or three characters");
    }
    let mut characters = reg_name.chars();
    if characters.next().unwrap() != 'x' {
        return Err("register name must begin with x");
    }
    let n = characters
        .collect::<String>()
        .parse::<u32>()
        .expect("Final one or two digits of register name should be numbers");
    Ok(n)
}

#[macro_export]
macro_rules! reg_num {
    ($reg:expr) => {
        reg_num_impl(std::stringify!($reg))?
    };
}
pub use reg_num;

macro_rules! itype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:ident, $rs1:expr, $imm:expr) => {{
                use crate::utils::interpret_i32_as_unsigned;
                let rd = reg_num!($rd);
                let rs1 = reg_num!($rs1);
                let imm = interpret_i32_as_unsigned($imm.into());
                itype(imm, rs1, $funct3, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

macro_rules! rtype_instr {
    ($instruction:ident, $funct7:expr, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:ident, $rs1:expr, $rs2:expr) => {{
                let rd = reg_num!($rd);
                let rs1 = reg_num!($rs1);
                let rs2 = reg_num!($rs2);
                rstype($funct7, rs2, rs1, $funct3, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

macro_rules! stype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rs2:expr, $rs1:expr, $imm:expr) => {{
                use crate::utils::{extract_field, interpret_i32_as_unsigned};
                let rs1 = reg_num!($rs1);
                let rs2 = reg_num!($rs2);
                let imm = interpret_i32_as_unsigned($imm);
                let imm11_5 = extract_field(imm, 11, 5);
                let imm4_0 = extract_field(imm, 4, 0);
                rstype(imm11_5, rs2, rs1, $funct3, imm4_0, $opcode)
            }};
        }
        pub use $instruction;
    };
}

/// Takes an immediate and shuffles it into the format required for
/// the 20-bit field of the U-type instruction (making it UJ-type)
pub fn jtype_imm_field(imm: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    let imm20 = extract_field(imm, 20, 20);
    let imm19_12 = extract_field(imm, 19, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_1 = extract_field(imm, 10, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) suitable for use with rstype for the conditional
/// branch instructions (SB-type)
pub fn btype_imm_fields(imm: i32) -> (u32, u32) {
    let imm = interpret_i32_as_unsigned(imm);
    let imm12 = extract_field(imm, 12, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_5 = extract_field(imm, 10, 5);
    let imm4_1 = extract_field(imm, 4, 1);
    let a = (imm12 << 6) | imm10_5;
    let b = (imm4_1 << 1) | imm11;
    (a, b)
}

macro_rules! btype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rs1:expr, $rs2:expr, $imm:expr) => {{
                let rs1 = reg_num!($rs1);
                let rs2 = reg_num!($rs2);
                let (a, b) = btype_imm_fields($imm);
                rstype(a, rs2, rs1, $funct3, b, $opcode)
            }};
        }
        pub use $instruction;
    };
}

#[macro_export]
macro_rules! jal {
    ($rd:expr, $imm:expr) => {{
        let rd = reg_num!($rd);
        let imm = jtype_imm_field($imm);
        ujtype(imm, rd, 0b1101111)
    }};
}
pub use jal;

/// Note: in lui the immediate is already the upper 20 bits that will
/// be loaded -- it will not be shifted up.
macro_rules! utype_instr {
    ($instruction:ident, $opcode:expr) => {
        #[macro_export]
        macro_rules! $instruction {
            ($rd:expr, $imm:expr) => {{
                use crate::utils::interpret_i32_as_unsigned;
                let rd = reg_num!($rd);
                let imm = interpret_i32_as_unsigned($imm);
                ujtype(imm, rd, $opcode)
            }};
        }
        pub use $instruction;
    };
}

utype_instr!(lui, OP_LUI);
// jal is defined above
itype_instr!(jalr, FUNCT3_JALR, OP_JALR);

// Conditional branches
btype_instr!(beq, FUNCT3_BEQ, OP_BRANCH);
btype_instr!(bne, FUNCT3_BNE, OP_BRANCH);
btype_instr!(blt, FUNCT3_BLT, OP_BRANCH);
btype_instr!(bge, FUNCT3_BGE, OP_BRANCH);
btype_instr!(bltu, FUNCT3_BLTU, OP_BRANCH);
btype_instr!(bgeu, FUNCT3_BGEU, OP_BRANCH);

// Loads
itype_instr!(lb, FUNCT3_B, OP_LOAD);
itype_instr!(lh, FUNCT3_H, OP_LOAD);
itype_instr!(lw, FUNCT3_W, OP_LOAD);
itype_instr!(lbu, FUNCT3_BU, OP_LOAD);
itype_instr!(lhu, FUNCT3_HU, OP_LOAD);

// Stores
stype_instr!(sb, FUNCT3_B, OP_STORE);
stype_instr!(sh, FUNCT3_H, OP_STORE);
stype_instr!(sw, FUNCT3_W, OP_STORE);

// Integer register-immediate instructions
itype_instr!(addi, FUNCT3_ADDI, OP_IMM);
itype_instr!(slti, FUNCT3_SLTI, OP_IMM);
itype_instr!(sltiu, FUNCT3_SLTIU, OP_IMM);
itype_instr!(xori, FUNCT3_XORI, OP_IMM);
itype_instr!(ori, FUNCT3_ORI, OP_IMM);
itype_instr!(andi, FUNCT3_ANDI, OP_IMM);

// Integer register-register instructions
rtype_instr!(add, 0b0000000, FUNCT3_ADD, OP);
rtype_instr!(sub, FUNCT7_SUB, FUNCT3_SUB, OP);
rtype_instr!(sll, 0b0000000, FUNCT3_SLL, OP);
rtype_instr!(slt, 0b0000000, FUNCT3_SLT, OP);
rtype_instr!(sltu, 0b0000000, FUNCT3_SLTU, OP);
rtype_instr!(xor, 0b0000000, FUNCT3_XOR, OP);
rtype_instr!(srl, 0b0000000, FUNCT3_SRL, OP);
rtype_instr!(sra, FUNCT7_SRA, FUNCT3_SRA, OP);
rtype_instr!(or, 0b0000000, FUNCT3_OR, OP);
rtype_instr!(and, 0b0000000, FUNCT3_AND, OP);
