//! RISK-XVII platform
//!
//! This file contains the virtual machine for the RISK-XVII
//! instruction set: a 32-bit integer core with 32 registers, 1 KiB of
//! instruction memory, 1 KiB of data memory, a 256-byte window of
//! memory-mapped virtual routines, and an 8 KiB heap managed by a
//! bank allocator. Programs are loaded from a flat memory image (see
//! the loader module) and run until they store to the halt routine,
//! the program counter runs past the instruction region, or a trap
//! ends execution.
//!
//! See the pma module for the memory map and the virtual routine
//! table; see the heap module for the bank allocator.
//!
//! The machine makes progress one instruction at a time through
//! [`Platform::step`]: fetch the word at pc, decode it, execute it,
//! and restore the zero-register guarantee. Termination and errors
//! are signalled as [`Trap`] values returned from `step`; the caller
//! owns the run loop, prints any diagnostics, and chooses the process
//! exit status. Console output produced by the virtual routines is
//! buffered in a queue and drained with [`Platform::flush_console`].

use queues::{IsQueue, Queue};
use std::io::{self, BufRead};
use thiserror::Error;

use crate::decode::{BranchOp, Instr, LoadOp, RegImmOp, RegRegOp, StoreOp};
use crate::loader::{ImageError, ImageLoadable};
use crate::utils::{
    interpret_i32_as_unsigned, interpret_u32_as_signed, sign_extend,
};

use self::heap::HeapList;
use self::memory::{Memory, Wordsize};
use self::pma::{
    Region, INST_MEM_SIZE, VR_DUMP_PC, VR_DUMP_REG, VR_DUMP_WORD, VR_END,
    VR_FREE, VR_HALT, VR_MALLOC, VR_READ_CHAR, VR_READ_SINT, VR_WRITE_CHAR,
    VR_WRITE_SINT, VR_WRITE_UINT,
};
use self::registers::Registers;

pub mod console;
pub mod heap;
pub mod memory;
pub mod pma;
pub mod registers;

/// Terminal conditions of the machine
///
/// Every variant ends execution; the run loop decides what to print
/// and which status to exit with. The instruction word carried by the
/// error variants is the one that was executing when the trap was
/// raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Trap {
    /// The program stored to the halt routine
    #[error("CPU Halt Requested")]
    Halt,
    /// An invalid memory access, a store to instruction memory or an
    /// undefined virtual routine, or a rejected free
    #[error("Illegal Operation: 0x{0:08x}")]
    IllegalOperation(u32),
    /// An opcode or function field outside the instruction set
    #[error("Instruction Not Implemented: 0x{0:08x}")]
    NotImplemented(u32),
    /// Console input failed while a read routine was executing
    #[error("{0}")]
    Input(String),
}

pub struct Platform {
    registers: Registers,
    pc: u32,
    /// Raw word of the instruction currently executing; reported by
    /// the error traps
    instr: u32,
    memory: Memory,
    heap: HeapList,
    console_out: Queue<u8>,
    input: Box<dyn BufRead>,
}

impl ImageLoadable for Platform {
    /// Write a byte of the boot image. Returns an error on an attempt
    /// to write anything other than the instruction or data region.
    fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), ImageError> {
        match pma::region(addr) {
            Region::Inst | Region::Data => {
                self.memory.set_image_byte(addr, data);
                Ok(())
            }
            _ => Err(ImageError::NonWritable(addr)),
        }
    }
}

impl Platform {
    /// Create the platform in its startup state: registers and pc
    /// zero, memory zero, one free heap node spanning all banks, and
    /// console input connected to stdin.
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            pc: 0,
            instr: 0,
            memory: Memory::new(),
            heap: HeapList::new(),
            console_out: Queue::new(),
            input: Box::new(io::BufReader::new(io::stdin())),
        }
    }

    /// Replace console input (tests feed scripted input this way)
    pub fn set_input(&mut self, input: impl BufRead + 'static) {
        self.input = Box::new(input);
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn x(&self, which: u8) -> u32 {
        self.registers.read(which)
    }

    pub fn set_x(&mut self, which: u8, value: u32) {
        self.registers.write(which, value);
    }

    /// Return the buffered console output and empty the buffer
    pub fn flush_console(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(byte) = self.console_out.remove() {
            out.push(byte);
        }
        out
    }

    /// The canonical dump of the program counter and all 32 registers
    pub fn dump_registers(&self) -> String {
        format!("PC = 0x{:08x};\n{}", self.pc, self.registers)
    }

    /// The raw instruction word at the current program counter
    pub fn fetch(&self) -> u32 {
        self.memory.read(self.pc, Wordsize::Word)
    }

    /// Fetch, decode and execute one instruction. The zero register
    /// is restored afterwards on every path, so a register dump taken
    /// after a trap still shows R[0] = 0.
    pub fn step(&mut self) -> Result<(), Trap> {
        let word = self.fetch();
        self.instr = word;
        let result = match Instr::decode(word) {
            Ok(instr) => self.execute(instr),
            Err(_) => Err(Trap::NotImplemented(word)),
        };
        self.registers.reset_zero();
        result
    }

    /// Step until the program counter leaves the instruction region
    /// (a normal exit) or a trap ends execution
    pub fn run(&mut self) -> Result<(), Trap> {
        while self.pc < INST_MEM_SIZE {
            self.step()?;
        }
        Ok(())
    }

    fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    fn illegal_operation(&self) -> Trap {
        Trap::IllegalOperation(self.instr)
    }

    /// An address is usable if it lies below the end of the virtual
    /// routine window, or inside the allocated bytes of a live heap
    /// allocation
    fn address_valid(&self, addr: u32) -> bool {
        addr <= VR_END || self.heap.contains(addr)
    }

    fn check_valid(&self, addr: u32, size: Wordsize) -> Result<(), Trap> {
        for n in 0..size.width() {
            if !self.address_valid(addr.wrapping_add(n)) {
                return Err(self.illegal_operation());
            }
        }
        Ok(())
    }

    /// Load from memory, after checking that every touched byte is
    /// valid. A load whose base address is in the virtual routine
    /// window invokes the routine for that address; the result is
    /// masked to the access width.
    pub fn load(&mut self, addr: u32, size: Wordsize) -> Result<u32, Trap> {
        self.check_valid(addr, size)?;
        if let Region::Vr = pma::region(addr) {
            Ok(self.vr_read(addr, size)? & size.mask())
        } else {
            Ok(self.memory.read(addr, size))
        }
    }

    /// Store to memory, after checking that every touched byte is
    /// valid. A store whose base address is in the virtual routine
    /// window invokes the routine for that address with the
    /// width-truncated value; otherwise every touched byte must be in
    /// data memory or an allocated heap range.
    pub fn store(
        &mut self,
        addr: u32,
        value: u32,
        size: Wordsize,
    ) -> Result<(), Trap> {
        self.check_valid(addr, size)?;
        let value = value & size.mask();
        if let Region::Vr = pma::region(addr) {
            return self.vr_write(addr, value);
        }
        for n in 0..size.width() {
            match pma::region(addr.wrapping_add(n)) {
                Region::Data | Region::Heap => (),
                _ => return Err(self.illegal_operation()),
            }
        }
        self.memory.write(addr, value, size);
        Ok(())
    }

    fn print_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.console_out
                .add(*byte)
                .expect("insert into queue should work");
        }
    }

    fn vr_read(&mut self, addr: u32, size: Wordsize) -> Result<u32, Trap> {
        match addr {
            VR_READ_CHAR => console::read_char(&mut self.input)
                .map_err(|e| Trap::Input(e.to_string())),
            VR_READ_SINT => console::read_int(&mut self.input)
                .map(interpret_i32_as_unsigned)
                .map_err(|e| Trap::Input(e.to_string())),
            // Everything else reads the scratch buffer
            _ => Ok(self.memory.read(addr, size)),
        }
    }

    fn vr_write(&mut self, addr: u32, value: u32) -> Result<(), Trap> {
        match addr {
            VR_WRITE_CHAR => self.print_bytes(&[value as u8]),
            VR_WRITE_SINT => {
                let value = interpret_u32_as_signed(value);
                self.print_bytes(format!("{value}").as_bytes());
            }
            VR_WRITE_UINT => self.print_bytes(format!("{value:x}").as_bytes()),
            VR_HALT => return Err(Trap::Halt),
            VR_DUMP_PC => {
                let pc = self.pc;
                self.print_bytes(format!("{pc:x}").as_bytes());
            }
            VR_DUMP_REG => {
                let dump = self.dump_registers();
                self.print_bytes(dump.as_bytes());
            }
            VR_DUMP_WORD => {
                // The stored value is an address; read it through the
                // normal validated load path
                let word = self.load(value, Wordsize::Word)?;
                self.print_bytes(format!("{word:x}").as_bytes());
            }
            VR_MALLOC => {
                // The allocation result register
                let address = self.heap.malloc(value);
                self.registers.write(28, address);
            }
            VR_FREE => {
                if !self.heap.free(value) {
                    return Err(self.illegal_operation());
                }
            }
            _ => return Err(self.illegal_operation()),
        }
        Ok(())
    }

    fn execute(&mut self, instr: Instr) -> Result<(), Trap> {
        match instr {
            Instr::RegReg {
                op,
                dest,
                src1,
                src2,
            } => {
                let src1 = self.x(src1);
                let src2 = self.x(src2);
                let value = match op {
                    RegRegOp::Add => src1.wrapping_add(src2),
                    RegRegOp::Sub => src1.wrapping_sub(src2),
                    RegRegOp::Xor => src1 ^ src2,
                    RegRegOp::Or => src1 | src2,
                    RegRegOp::And => src1 & src2,
                    // Shift amounts use the low five bits of src2
                    RegRegOp::Sll => src1.wrapping_shl(src2),
                    RegRegOp::Srl => src1.wrapping_shr(src2),
                    // sra is a rotate right in this instruction set
                    RegRegOp::Sra => src1.rotate_right(src2),
                    RegRegOp::Slt => u32::from(
                        interpret_u32_as_signed(src1)
                            < interpret_u32_as_signed(src2),
                    ),
                    RegRegOp::Sltu => u32::from(src1 < src2),
                };
                self.set_x(dest, value);
                self.increment_pc();
            }
            Instr::RegImm { op, dest, src, imm } => {
                let src = self.x(src);
                let imm = sign_extend(imm, 11);
                let value = match op {
                    RegImmOp::Addi => src.wrapping_add(imm),
                    RegImmOp::Xori => src ^ imm,
                    RegImmOp::Ori => src | imm,
                    RegImmOp::Andi => src & imm,
                    RegImmOp::Slti => u32::from(
                        interpret_u32_as_signed(src)
                            < interpret_u32_as_signed(imm),
                    ),
                    RegImmOp::Sltiu => u32::from(src < imm),
                };
                self.set_x(dest, value);
                self.increment_pc();
            }
            Instr::Load {
                op,
                dest,
                base,
                offset,
            } => {
                let addr = self.x(base).wrapping_add(sign_extend(offset, 11));
                let value = match op {
                    LoadOp::Lb => {
                        sign_extend(self.load(addr, Wordsize::Byte)?, 7)
                    }
                    LoadOp::Lh => {
                        sign_extend(self.load(addr, Wordsize::Halfword)?, 15)
                    }
                    LoadOp::Lw => self.load(addr, Wordsize::Word)?,
                    LoadOp::Lbu => self.load(addr, Wordsize::Byte)?,
                    LoadOp::Lhu => self.load(addr, Wordsize::Halfword)?,
                };
                self.set_x(dest, value);
                self.increment_pc();
            }
            Instr::Store {
                op,
                src,
                base,
                offset,
            } => {
                let addr = self.x(base).wrapping_add(sign_extend(offset, 11));
                let size = match op {
                    StoreOp::Sb => Wordsize::Byte,
                    StoreOp::Sh => Wordsize::Halfword,
                    StoreOp::Sw => Wordsize::Word,
                };
                self.store(addr, self.x(src), size)?;
                self.increment_pc();
            }
            Instr::Branch {
                op,
                src1,
                src2,
                offset,
            } => {
                let src1 = self.x(src1);
                let src2 = self.x(src2);
                let taken = match op {
                    BranchOp::Beq => src1 == src2,
                    BranchOp::Bne => src1 != src2,
                    BranchOp::Blt => {
                        interpret_u32_as_signed(src1)
                            < interpret_u32_as_signed(src2)
                    }
                    BranchOp::Bltu => src1 < src2,
                    BranchOp::Bge => {
                        interpret_u32_as_signed(src1)
                            >= interpret_u32_as_signed(src2)
                    }
                    BranchOp::Bgeu => src1 >= src2,
                };
                if taken {
                    self.pc = self.pc.wrapping_add(sign_extend(offset, 12));
                } else {
                    self.increment_pc();
                }
            }
            Instr::Jalr { dest, base, offset } => {
                // The link register is written before the base
                // register is read, so a jump through the link
                // register's own slot uses the new value
                self.set_x(dest, self.pc.wrapping_add(4));
                let target =
                    self.x(base).wrapping_add(sign_extend(offset, 11));
                // The target replaces pc verbatim; there is no
                // further increment and no alignment adjustment
                self.pc = target;
            }
            Instr::Lui { dest, u_immediate } => {
                self.set_x(dest, u_immediate << 12);
                self.increment_pc();
            }
            Instr::Jal { dest, offset } => {
                self.set_x(dest, self.pc.wrapping_add(4));
                self.pc = self.pc.wrapping_add(sign_extend(offset, 20));
            }
        }
        Ok(())
    }
}
