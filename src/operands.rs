//! Addressing-mode resolution.
//!
//! The decoder classifies each instruction; handlers then resolve their
//! operands through these helpers, which turn an addressing mode plus a
//! register field into a tagged [`Operand`]. All handlers consume
//! operands uniformly through [`Z8000::load`] and [`Z8000::store`].
//!
//! The architecture reserves register 0 as "no register" in indirect
//! addressing: R0 as a base or index in IR/BA/BX raises the
//! extended-instruction trap, as does an odd register index for a long
//! operand or a misaligned quad group.

use crate::bus::{AccessKind, Z8000Bus};
use crate::cpu::Z8000;
use crate::exceptions::Trap;

/// Operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    /// Width in bytes, as used for stack and pointer adjustment.
    pub(crate) fn bytes(self) -> u16 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }
}

/// Addressing mode of one operand, as fixed by the opcode pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddrMode {
    /// Register direct.
    R,
    /// Immediate in the instruction stream.
    Im,
    /// Register indirect.
    Ir,
    /// Direct address, or indexed when the register field is non-zero.
    DaX,
    /// Base register plus 16-bit displacement word.
    Ba,
    /// Base register plus index register from a second word.
    Bx,
}

/// A resolved operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    /// Register index (word numbering; byte ops use the RB view of it).
    Reg(u8),
    /// Immediate value.
    Imm(u32),
    /// Effective memory address.
    Mem(u16),
}

impl Z8000 {
    /// Resolve an operand from its mode and register field, consuming
    /// extension words as the mode requires.
    pub(crate) fn operand<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        mode: AddrMode,
        reg: u8,
        sz: Size,
    ) -> Result<Operand, Trap> {
        match mode {
            AddrMode::R => Ok(Operand::Reg(reg)),
            AddrMode::Im => {
                let value = match sz {
                    Size::Byte => u32::from(self.fetch_word(bus) & 0xFF),
                    Size::Word => u32::from(self.fetch_word(bus)),
                    Size::Long => {
                        let hi = self.fetch_word(bus);
                        let lo = self.fetch_word(bus);
                        u32::from(hi) << 16 | u32::from(lo)
                    }
                };
                Ok(Operand::Imm(value))
            }
            AddrMode::Ir => {
                if reg == 0 {
                    return Err(Trap::Extended);
                }
                Ok(Operand::Mem(self.regs.word(reg)))
            }
            AddrMode::DaX => {
                let base = self.fetch_word(bus);
                let addr = if reg == 0 {
                    base
                } else {
                    base.wrapping_add(self.regs.word(reg))
                };
                Ok(Operand::Mem(addr))
            }
            AddrMode::Ba => {
                if reg == 0 {
                    return Err(Trap::Extended);
                }
                let disp = self.fetch_word(bus);
                Ok(Operand::Mem(self.regs.word(reg).wrapping_add(disp)))
            }
            AddrMode::Bx => {
                if reg == 0 {
                    return Err(Trap::Extended);
                }
                let index = (self.fetch_word(bus) >> 8) & 15;
                if index == 0 {
                    return Err(Trap::Extended);
                }
                let addr = self.regs.word(reg).wrapping_add(self.regs.word(index as u8));
                Ok(Operand::Mem(addr))
            }
        }
    }

    /// Read an operand's value, widened to u32.
    pub(crate) fn load<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        op: Operand,
        sz: Size,
    ) -> Result<u32, Trap> {
        match op {
            Operand::Reg(r) => self.read_reg(r, sz),
            Operand::Imm(v) => Ok(v),
            Operand::Mem(addr) => Ok(match sz {
                Size::Byte => u32::from(bus.read_byte(addr, AccessKind::Data)),
                Size::Word => u32::from(bus.read_word(addr, AccessKind::Data)),
                Size::Long => self.read_mem_long(bus, addr),
            }),
        }
    }

    /// Write a value through an operand. Immediate destinations cannot
    /// occur for any legal encoding.
    pub(crate) fn store<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        op: Operand,
        sz: Size,
        value: u32,
    ) -> Result<(), Trap> {
        match op {
            Operand::Reg(r) => self.write_reg(r, sz, value),
            Operand::Imm(_) => Err(Trap::Extended),
            Operand::Mem(addr) => {
                match sz {
                    Size::Byte => bus.write_byte(addr, value as u8, AccessKind::Data),
                    Size::Word => bus.write_word(addr, value as u16, AccessKind::Data),
                    Size::Long => self.write_mem_long(bus, addr, value),
                }
                Ok(())
            }
        }
    }

    /// Read a register of the given width, enforcing pair alignment.
    pub(crate) fn read_reg(&self, r: u8, sz: Size) -> Result<u32, Trap> {
        match sz {
            Size::Byte => Ok(u32::from(self.regs.byte(r))),
            Size::Word => Ok(u32::from(self.regs.word(r))),
            Size::Long => {
                if r & 1 != 0 {
                    return Err(Trap::Extended);
                }
                Ok(self.regs.long(r))
            }
        }
    }

    /// Write a register of the given width, enforcing pair alignment.
    pub(crate) fn write_reg(&mut self, r: u8, sz: Size, value: u32) -> Result<(), Trap> {
        match sz {
            Size::Byte => self.regs.set_byte(r, value as u8),
            Size::Word => self.regs.set_word(r, value as u16),
            Size::Long => {
                if r & 1 != 0 {
                    return Err(Trap::Extended);
                }
                self.regs.set_long(r, value);
            }
        }
        Ok(())
    }

    /// Read a 32-bit value as two big-endian words, high word first.
    pub(crate) fn read_mem_long<B: Z8000Bus>(&mut self, bus: &mut B, addr: u16) -> u32 {
        let hi = bus.read_word(addr, AccessKind::Data);
        let lo = bus.read_word(addr.wrapping_add(2), AccessKind::Data);
        u32::from(hi) << 16 | u32::from(lo)
    }

    /// Write a 32-bit value as two big-endian words, high word first.
    pub(crate) fn write_mem_long<B: Z8000Bus>(&mut self, bus: &mut B, addr: u16, value: u32) {
        bus.write_word(addr, (value >> 16) as u16, AccessKind::Data);
        bus.write_word(addr.wrapping_add(2), value as u16, AccessKind::Data);
    }
}

/// Source register field, bits 7-4 of the opcode word.
pub(crate) fn src_field(word: u16) -> u8 {
    ((word >> 4) & 15) as u8
}

/// Destination register field, bits 3-0 of the opcode word.
pub(crate) fn dst_field(word: u16) -> u8 {
    (word & 15) as u8
}
