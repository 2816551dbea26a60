//! Logical and bit-test instruction handlers.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for width masking.

use crate::bus::Z8000Bus;
use crate::cpu::Z8000;
use crate::decode::BitOp;
use crate::exceptions::Trap;
use crate::flags::{logic_byte, logic_long, logic_word, LOGIC, PF, SF, ZF};
use crate::operands::{dst_field, src_field, AddrMode, Operand, Size};

impl Z8000 {
    /// AND/OR/XOR with a register destination. Carry and overflow clear;
    /// byte forms report parity in P/V.
    pub(crate) fn op_bitwise<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
        f: fn(u32, u32) -> u32,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let dst = dst_field(word);
        let a = self.read_reg(dst, sz)?;
        let value = f(a, b);
        self.write_reg(dst, sz, value)?;
        self.set_cc(LOGIC, result_flags(sz, value));
        Ok(())
    }

    /// One's complement. Clears V (parity for bytes); carry survives.
    pub(crate) fn op_com<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let op = self.operand(bus, mode, src_field(word), sz)?;
        let value = !self.load(bus, op, sz)?;
        let value = mask(sz, value);
        self.store(bus, op, sz, value)?;
        self.set_cc(ZF | SF | PF, result_flags(sz, value));
        Ok(())
    }

    /// Flags from the destination value alone.
    pub(crate) fn op_test<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let op = self.operand(bus, mode, src_field(word), sz)?;
        let value = self.load(bus, op, sz)?;
        let affected = match sz {
            Size::Byte => ZF | SF | PF,
            _ => ZF | SF,
        };
        self.set_cc(affected, result_flags(sz, value));
        Ok(())
    }

    /// Test-and-set: S receives the sign, then the operand fills with ones.
    pub(crate) fn op_tset<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let op = self.operand(bus, mode, src_field(word), sz)?;
        let value = self.load(bus, op, sz)?;
        let sign = match sz {
            Size::Byte => value & 0x80 != 0,
            Size::Word => value & 0x8000 != 0,
            Size::Long => value & 0x8000_0000 != 0,
        };
        self.store(bus, op, sz, mask(sz, !0))?;
        self.set_cc(SF, if sign { SF } else { 0 });
        Ok(())
    }

    /// BIT/SET/RES with the bit number in the opcode word.
    pub(crate) fn op_bit_static<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
        op: BitOp,
    ) -> Result<(), Trap> {
        let bit = match sz {
            Size::Byte => dst_field(word) & 7,
            _ => dst_field(word),
        };
        let target = self.operand(bus, mode, src_field(word), sz)?;
        self.apply_bit(bus, target, sz, op, bit)
    }

    /// BIT/SET/RES with the bit number in a register; register
    /// destination only.
    pub(crate) fn op_bit_dynamic<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        op: BitOp,
    ) -> Result<(), Trap> {
        let bit_reg = dst_field(word);
        let second = self.fetch_word(bus);
        let dst = ((second >> 8) & 15) as u8;
        let bit = match sz {
            Size::Byte => (self.regs.word(bit_reg) & 7) as u8,
            _ => (self.regs.word(bit_reg) & 15) as u8,
        };
        self.apply_bit(bus, Operand::Reg(dst), sz, op, bit)
    }

    fn apply_bit<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        target: Operand,
        sz: Size,
        op: BitOp,
        bit: u8,
    ) -> Result<(), Trap> {
        let value = self.load(bus, target, sz)?;
        let mask_bit = 1u32 << bit;
        match op {
            BitOp::Bit => {
                self.set_cc(ZF, if value & mask_bit == 0 { ZF } else { 0 });
            }
            BitOp::Set => self.store(bus, target, sz, value | mask_bit)?,
            BitOp::Res => self.store(bus, target, sz, value & !mask_bit)?,
        }
        Ok(())
    }

    /// Set bit 0 of the destination when the condition holds.
    pub(crate) fn op_tcc(&mut self, word: u16, sz: Size) -> Result<(), Trap> {
        if self.condition(dst_field(word)) {
            let r = src_field(word);
            match sz {
                Size::Byte => {
                    let v = self.regs.byte(r);
                    self.regs.set_byte(r, v | 1);
                }
                _ => {
                    let v = self.regs.word(r);
                    self.regs.set_word(r, v | 1);
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn mask(sz: Size, value: u32) -> u32 {
    match sz {
        Size::Byte => value & 0xFF,
        Size::Word => value & 0xFFFF,
        Size::Long => value,
    }
}

pub(crate) fn result_flags(sz: Size, value: u32) -> u16 {
    match sz {
        Size::Byte => logic_byte(value as u8),
        Size::Word => logic_word(value as u16),
        Size::Long => logic_long(value),
    }
}
