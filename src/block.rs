//! Iterated block transfer and compare.
//!
//! A block instruction performs exactly one step per dispatch: move or
//! compare one element, adjust the pointer registers, decrement the
//! count, and set V when the count reaches zero. If the instruction is a
//! repeating form and neither the count nor (for compares) the condition
//! ends it, the handler asks the interpreter to rewind PC to the
//! instruction's own first word. The next fetch then re-executes it,
//! which is also the point where pending interrupts are honoured.

#![allow(clippy::cast_possible_truncation)]

use crate::bus::{AccessKind, Z8000Bus};
use crate::cpu::Z8000;
use crate::exceptions::Trap;
use crate::flags::{CF, PF, SF, ZF};
use crate::operands::{src_field, Size};

impl Z8000 {
    /// LDI/LDIR/LDD/LDDR and byte forms. The second word names the
    /// destination pointer, the count register, and whether the form
    /// repeats (low nibble 0) or performs a single step (low nibble 8).
    pub(crate) fn op_block_move<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        dec: bool,
    ) -> Result<(), Trap> {
        let src_ptr = src_field(word);
        let second = self.fetch_word(bus);
        let count_reg = ((second >> 8) & 15) as u8;
        let dst_ptr = ((second >> 4) & 15) as u8;
        let single = second & 8 != 0;
        if src_ptr == 0 || dst_ptr == 0 {
            return Err(Trap::Extended);
        }

        let src = self.regs.word(src_ptr);
        let dst = self.regs.word(dst_ptr);
        match sz {
            Size::Byte => {
                let value = bus.read_byte(src, AccessKind::Data);
                bus.write_byte(dst, value, AccessKind::Data);
            }
            _ => {
                let value = bus.read_word(src, AccessKind::Data);
                bus.write_word(dst, value, AccessKind::Data);
            }
        }
        self.advance_ptr(src_ptr, sz, dec);
        self.advance_ptr(dst_ptr, sz, dec);

        let remaining = self.step_count(count_reg);
        if !(single || remaining == 0) {
            self.rewind = true;
        }
        Ok(())
    }

    /// CPI/CPIR/CPD/CPDR, the memory-to-memory CPS forms, and their byte
    /// variants. Compare flags land first so the termination condition
    /// sees them; V then reports count exhaustion.
    pub(crate) fn op_block_cp<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        dec: bool,
        repeat: bool,
        string: bool,
    ) -> Result<(), Trap> {
        let src_ptr = src_field(word);
        let second = self.fetch_word(bus);
        let count_reg = ((second >> 8) & 15) as u8;
        let other = ((second >> 4) & 15) as u8;
        let cc = (second & 15) as u8;
        if src_ptr == 0 || (string && other == 0) {
            return Err(Trap::Extended);
        }

        let src_addr = self.regs.word(src_ptr);
        let (a, b) = match sz {
            Size::Byte => {
                let b = u32::from(bus.read_byte(src_addr, AccessKind::Data));
                let a = if string {
                    u32::from(bus.read_byte(self.regs.word(other), AccessKind::Data))
                } else {
                    u32::from(self.regs.byte(other))
                };
                (a, b)
            }
            _ => {
                let b = u32::from(bus.read_word(src_addr, AccessKind::Data));
                let a = if string {
                    u32::from(bus.read_word(self.regs.word(other), AccessKind::Data))
                } else {
                    u32::from(self.regs.word(other))
                };
                (a, b)
            }
        };

        let (_, flags, _) = crate::arith::arith(sz, a, b, 0, true);
        self.set_cc(CF | ZF | SF, flags);

        self.advance_ptr(src_ptr, sz, dec);
        if string {
            self.advance_ptr(other, sz, dec);
        }

        let matched = self.condition(cc);
        let remaining = self.step_count(count_reg);
        if !(!repeat || remaining == 0 || matched) {
            self.rewind = true;
        }
        Ok(())
    }

    /// Step a pointer register by the element size.
    pub(crate) fn advance_ptr(&mut self, reg: u8, sz: Size, dec: bool) {
        let step = match sz {
            Size::Byte => 1,
            _ => 2,
        };
        let value = self.regs.word(reg);
        let value = if dec {
            value.wrapping_sub(step)
        } else {
            value.wrapping_add(step)
        };
        self.regs.set_word(reg, value);
    }

    /// Decrement the count register, set V iff it reached zero, and
    /// return the remaining count.
    pub(crate) fn step_count(&mut self, count_reg: u8) -> u16 {
        let remaining = self.regs.word(count_reg).wrapping_sub(1);
        self.regs.set_word(count_reg, remaining);
        self.set_cc(PF, if remaining == 0 { PF } else { 0 });
        remaining
    }
}
