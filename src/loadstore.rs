//! Data-movement handlers.
//!
//! Loads never touch the flags. PUSH pre-decrements its pointer register
//! by the operand size; POP post-increments. Any word register can serve
//! as the pointer; accesses through R15 are tagged as stack traffic for
//! tracers, the rest as data.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for width masking.

use crate::bus::{AccessKind, Z8000Bus};
use crate::cpu::Z8000;
use crate::decode::Dir;
use crate::exceptions::Trap;
use crate::operands::{dst_field, src_field, AddrMode, Operand, Size};

impl Z8000 {
    /// The general LD family. Load moves memory/immediate/register into
    /// the register in bits 3-0; store moves that register out through
    /// the addressed operand.
    pub(crate) fn op_ld<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
        dir: Dir,
    ) -> Result<(), Trap> {
        let ea = self.operand(bus, mode, src_field(word), sz)?;
        let reg = dst_field(word);
        match dir {
            Dir::Load => {
                let value = self.load(bus, ea, sz)?;
                self.write_reg(reg, sz, value)?;
            }
            Dir::Store => {
                let value = self.read_reg(reg, sz)?;
                self.store(bus, ea, sz, value)?;
            }
        }
        Ok(())
    }

    /// LD dst,#imm through the destination-operand groups.
    pub(crate) fn op_ld_imm<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let ea = self.operand(bus, mode, src_field(word), sz)?;
        let value = match sz {
            Size::Byte => u32::from(self.fetch_word(bus) & 0xFF),
            _ => u32::from(self.fetch_word(bus)),
        };
        self.store(bus, ea, sz, value)
    }

    /// Single-word LDB Rbd,#imm8.
    pub(crate) fn op_ld_compact_byte(&mut self, word: u16) -> Result<(), Trap> {
        let reg = ((word >> 8) & 15) as u8;
        self.regs.set_byte(reg, word as u8);
        Ok(())
    }

    /// LDK: 4-bit constant into a word register.
    pub(crate) fn op_ldk(&mut self, word: u16) -> Result<(), Trap> {
        self.regs
            .set_word(src_field(word), u16::from(dst_field(word)));
        Ok(())
    }

    /// PC-relative load/store. The base is the address of the following
    /// instruction.
    pub(crate) fn op_ld_rel<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        dir: Dir,
    ) -> Result<(), Trap> {
        let disp = self.fetch_word(bus);
        let addr = self.pc.wrapping_add(disp);
        let reg = dst_field(word);
        match dir {
            Dir::Load => {
                let value = self.load(bus, Operand::Mem(addr), sz)?;
                self.write_reg(reg, sz, value)?;
            }
            Dir::Store => {
                let value = self.read_reg(reg, sz)?;
                self.store(bus, Operand::Mem(addr), sz, value)?;
            }
        }
        Ok(())
    }

    /// LDA: the effective address itself, no memory read.
    pub(crate) fn op_lda<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        match self.operand(bus, mode, src_field(word), Size::Word)? {
            Operand::Mem(addr) => {
                self.regs.set_word(dst_field(word), addr);
                Ok(())
            }
            _ => Err(Trap::Extended),
        }
    }

    /// LDAR: PC-relative effective address.
    pub(crate) fn op_ldar<B: Z8000Bus>(&mut self, bus: &mut B, word: u16) -> Result<(), Trap> {
        let disp = self.fetch_word(bus);
        let addr = self.pc.wrapping_add(disp);
        self.regs.set_word(dst_field(word), addr);
        Ok(())
    }

    /// LDM: consecutive registers to or from memory, wrapping past R15.
    /// The register/count word precedes any address word.
    pub(crate) fn op_ldm<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        mode: AddrMode,
        dir: Dir,
    ) -> Result<(), Trap> {
        let second = self.fetch_word(bus);
        let start = ((second >> 8) & 15) as u8;
        let count = (second & 15) + 1;
        let base = match self.operand(bus, mode, src_field(word), Size::Word)? {
            Operand::Mem(addr) => addr,
            _ => return Err(Trap::Extended),
        };
        for i in 0..count {
            let reg = (start + i as u8) & 15;
            let addr = base.wrapping_add(i * 2);
            match dir {
                Dir::Load => {
                    let value = bus.read_word(addr, AccessKind::Data);
                    self.regs.set_word(reg, value);
                }
                Dir::Store => {
                    bus.write_word(addr, self.regs.word(reg), AccessKind::Data);
                }
            }
        }
        Ok(())
    }

    /// Exchange a register with a register or memory operand.
    pub(crate) fn op_ex<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let other = self.operand(bus, mode, src_field(word), sz)?;
        let reg = dst_field(word);
        let reg_value = self.read_reg(reg, sz)?;
        let other_value = self.load(bus, other, sz)?;
        self.write_reg(reg, sz, other_value)?;
        self.store(bus, other, sz, reg_value)
    }

    /// Clear the destination. No flags.
    pub(crate) fn op_clr<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let ea = self.operand(bus, mode, src_field(word), sz)?;
        self.store(bus, ea, sz, 0)
    }

    /// PUSH @Rd,src for word and long operands.
    pub(crate) fn op_push<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let ptr = src_field(word);
        if ptr == 0 {
            return Err(Trap::Extended);
        }
        let src = self.operand(bus, mode, dst_field(word), sz)?;
        let value = self.load(bus, src, sz)?;
        self.push_through(bus, ptr, sz, value);
        Ok(())
    }

    /// PUSH @Rd,#imm16.
    pub(crate) fn op_push_imm<B: Z8000Bus>(&mut self, bus: &mut B, word: u16) -> Result<(), Trap> {
        let ptr = src_field(word);
        if ptr == 0 {
            return Err(Trap::Extended);
        }
        let value = self.fetch_word(bus);
        self.push_through(bus, ptr, Size::Word, u32::from(value));
        Ok(())
    }

    /// POP dst,@Rs for word and long operands.
    pub(crate) fn op_pop<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let ptr = src_field(word);
        if ptr == 0 {
            return Err(Trap::Extended);
        }
        let dst = self.operand(bus, mode, dst_field(word), sz)?;
        let kind = stack_kind(ptr);
        let addr = self.regs.word(ptr);
        let value = match sz {
            Size::Long => {
                let hi = bus.read_word(addr, kind);
                let lo = bus.read_word(addr.wrapping_add(2), kind);
                u32::from(hi) << 16 | u32::from(lo)
            }
            _ => u32::from(bus.read_word(addr, kind)),
        };
        self.regs.set_word(ptr, addr.wrapping_add(sz.bytes()));
        self.store(bus, dst, sz, value)
    }

    fn push_through<B: Z8000Bus>(&mut self, bus: &mut B, ptr: u8, sz: Size, value: u32) {
        let kind = stack_kind(ptr);
        let sp = self.regs.word(ptr).wrapping_sub(sz.bytes());
        self.regs.set_word(ptr, sp);
        match sz {
            Size::Long => {
                bus.write_word(sp, (value >> 16) as u16, kind);
                bus.write_word(sp.wrapping_add(2), value as u16, kind);
            }
            _ => bus.write_word(sp, value as u16, kind),
        }
    }
}

fn stack_kind(ptr: u8) -> AccessKind {
    if ptr == 15 {
        AccessKind::Stack
    } else {
        AccessKind::Data
    }
}
