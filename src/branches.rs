//! Control-transfer handlers and condition codes.
//!
//! Condition codes are 4-bit: code 0 never passes, code 8 always does,
//! and each remaining code is the complement of code^8.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)] // Signed displacement extraction.

use crate::bus::Z8000Bus;
use crate::cpu::Z8000;
use crate::exceptions::Trap;
use crate::flags::{CF, PF, SF, ZF};
use crate::operands::{dst_field, src_field, AddrMode, Operand, Size};

impl Z8000 {
    /// Evaluate a 4-bit condition code against the current flags.
    pub(crate) fn condition(&self, cc: u8) -> bool {
        let c = self.flag(CF);
        let z = self.flag(ZF);
        let s = self.flag(SF);
        let v = self.flag(PF);
        match cc & 0x0F {
            0x0 => false,
            0x1 => s != v,           // LT
            0x2 => z || (s != v),    // LE
            0x3 => c || z,           // ULE
            0x4 => v,                // OV
            0x5 => s,                // MI
            0x6 => z,                // EQ
            0x7 => c,                // ULT / carry
            0x8 => true,
            0x9 => s == v,           // GE
            0xA => !z && s == v,     // GT
            0xB => !c && !z,         // UGT
            0xC => !v,               // NOV
            0xD => !s,               // PL
            0xE => !z,               // NE
            0xF => !c,               // UGE / no carry
            _ => unreachable!(),
        }
    }

    /// JP cc,dst. The address word is consumed whether or not the
    /// condition passes.
    pub(crate) fn op_jp<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let target = match self.operand(bus, mode, src_field(word), Size::Word)? {
            Operand::Mem(addr) => addr,
            _ => return Err(Trap::Extended),
        };
        if self.condition(dst_field(word)) {
            self.pc = target;
        }
        Ok(())
    }

    /// JR cc,disp: signed 8-bit displacement in words.
    pub(crate) fn op_jr(&mut self, word: u16) -> Result<(), Trap> {
        let cc = ((word >> 8) & 15) as u8;
        if self.condition(cc) {
            let disp = i16::from(word as u8 as i8) * 2;
            self.pc = self.pc.wrapping_add_signed(disp);
        }
        Ok(())
    }

    /// CALL dst: push the return address, then jump.
    pub(crate) fn op_call<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let target = match self.operand(bus, mode, src_field(word), Size::Word)? {
            Operand::Mem(addr) => addr,
            _ => return Err(Trap::Extended),
        };
        let ret = self.pc;
        self.push_word(bus, ret);
        self.pc = target;
        Ok(())
    }

    /// CALR disp12: relative call, displacement subtracted.
    pub(crate) fn op_calr<B: Z8000Bus>(&mut self, bus: &mut B, word: u16) -> Result<(), Trap> {
        let disp = ((word & 0x0FFF) as i16) << 4 >> 4;
        let ret = self.pc;
        self.push_word(bus, ret);
        self.pc = ret.wrapping_sub((disp * 2) as u16);
        Ok(())
    }

    /// RET cc.
    pub(crate) fn op_ret<B: Z8000Bus>(&mut self, bus: &mut B, word: u16) -> Result<(), Trap> {
        if self.condition(dst_field(word)) {
            self.pc = self.pop_word(bus);
        }
        Ok(())
    }

    /// DJNZ/DBJNZ: decrement without touching flags, branch backwards
    /// while non-zero. The displacement is a 7-bit unsigned word count.
    pub(crate) fn op_djnz(&mut self, word: u16, sz: Size) -> Result<(), Trap> {
        let reg = ((word >> 8) & 15) as u8;
        let remaining = match sz {
            Size::Byte => {
                let v = self.regs.byte(reg).wrapping_sub(1);
                self.regs.set_byte(reg, v);
                u32::from(v)
            }
            _ => {
                let v = self.regs.word(reg).wrapping_sub(1);
                self.regs.set_word(reg, v);
                u32::from(v)
            }
        };
        if remaining != 0 {
            let disp = word & 0x7F;
            self.pc = self.pc.wrapping_sub(disp * 2);
        }
        Ok(())
    }
}
