//! Arithmetic instruction handlers.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for width masking.
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)] // Signed reinterpretation is the point.

use crate::bus::Z8000Bus;
use crate::cpu::Z8000;
use crate::exceptions::Trap;
use crate::flags::{
    add_byte, add_long, add_word, logic_byte, sub_byte, sub_long, sub_word, ARITH_BYTE,
    ARITH_LONG, ARITH_WORD, CF, DF, HF, INCDEC_BYTE, INCDEC_WORD, PF, SF, ZF,
};
use crate::operands::{dst_field, src_field, AddrMode, Size};

impl Z8000 {
    pub(crate) fn op_add<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let dst = dst_field(word);
        let a = self.read_reg(dst, sz)?;
        let (value, flags, affected) = arith(sz, a, b, 0, false);
        self.write_reg(dst, sz, value)?;
        self.set_cc(affected, flags);
        Ok(())
    }

    pub(crate) fn op_sub<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let dst = dst_field(word);
        let a = self.read_reg(dst, sz)?;
        let (value, flags, affected) = arith(sz, a, b, 0, true);
        self.write_reg(dst, sz, value)?;
        self.set_cc(affected, flags);
        Ok(())
    }

    pub(crate) fn op_adc(&mut self, word: u16, sz: Size) -> Result<(), Trap> {
        let b = self.read_reg(src_field(word), sz)?;
        let dst = dst_field(word);
        let a = self.read_reg(dst, sz)?;
        let cin = u32::from(self.flag(CF));
        let (value, flags, affected) = arith(sz, a, b, cin, false);
        self.write_reg(dst, sz, value)?;
        self.set_cc(affected, flags);
        Ok(())
    }

    pub(crate) fn op_sbc(&mut self, word: u16, sz: Size) -> Result<(), Trap> {
        let b = self.read_reg(src_field(word), sz)?;
        let dst = dst_field(word);
        let a = self.read_reg(dst, sz)?;
        let bin = u32::from(self.flag(CF));
        let (value, flags, affected) = arith(sz, a, b, bin, true);
        self.write_reg(dst, sz, value)?;
        self.set_cc(affected, flags);
        Ok(())
    }

    /// Compare register against source: subtraction for flags only.
    pub(crate) fn op_cp<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let a = self.read_reg(dst_field(word), sz)?;
        let (_, flags, affected) = arith(sz, a, b, 0, true);
        self.set_cc(affected, flags);
        Ok(())
    }

    /// Compare a memory destination against an immediate.
    pub(crate) fn op_cp_imm<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let dst = self.operand(bus, mode, src_field(word), sz)?;
        let a = self.load(bus, dst, sz)?;
        let b = match sz {
            Size::Byte => u32::from(self.fetch_word(bus) & 0xFF),
            _ => u32::from(self.fetch_word(bus)),
        };
        let (_, flags, affected) = arith(sz, a, b, 0, true);
        self.set_cc(affected, flags);
        Ok(())
    }

    /// INC/DEC by 1..16; the carry flag survives.
    pub(crate) fn op_inc_dec<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
        dec: bool,
    ) -> Result<(), Trap> {
        let n = u32::from(dst_field(word)) + 1;
        let op = self.operand(bus, mode, src_field(word), sz)?;
        let a = self.load(bus, op, sz)?;
        let (value, flags, _) = arith(sz, a, n, 0, dec);
        self.store(bus, op, sz, value)?;
        let affected = match sz {
            Size::Byte => INCDEC_BYTE,
            _ => INCDEC_WORD,
        };
        self.set_cc(affected, flags);
        Ok(())
    }

    /// Two's complement negate: 0 - dst.
    pub(crate) fn op_neg<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let op = self.operand(bus, mode, src_field(word), sz)?;
        let a = self.load(bus, op, sz)?;
        let (value, flags, affected) = arith(sz, 0, a, 0, true);
        self.store(bus, op, sz, value)?;
        self.set_cc(affected, flags);
        Ok(())
    }

    /// Signed multiply into a register pair (word) or quad (long).
    pub(crate) fn op_mult<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let dst = dst_field(word);
        match sz {
            Size::Word => {
                if dst & 1 != 0 {
                    return Err(Trap::Extended);
                }
                let a = i32::from(self.regs.word(dst + 1) as i16);
                let product = a.wrapping_mul(i32::from(b as u16 as i16));
                self.regs.set_long(dst, product as u32);
                let mut flags = 0;
                if product == 0 {
                    flags |= ZF;
                }
                if product < 0 {
                    flags |= SF;
                }
                if product < i32::from(i16::MIN) || product > i32::from(i16::MAX) {
                    flags |= CF;
                }
                self.set_cc(CF | ZF | SF | PF, flags);
            }
            Size::Long => {
                if dst & 3 != 0 {
                    return Err(Trap::Extended);
                }
                let a = i64::from(self.regs.long(dst + 2) as i32);
                let product = a.wrapping_mul(i64::from(b as i32));
                self.regs.set_quad(dst, product as u64);
                let mut flags = 0;
                if product == 0 {
                    flags |= ZF;
                }
                if product < 0 {
                    flags |= SF;
                }
                if product < i64::from(i32::MIN) || product > i64::from(i32::MAX) {
                    flags |= CF;
                }
                self.set_cc(CF | ZF | SF | PF, flags);
            }
            Size::Byte => return Err(Trap::Extended),
        }
        Ok(())
    }

    /// Signed divide. Quotient lands in the low half, remainder in the
    /// high half. Zero divisors and quotient overflow raise the
    /// extended-instruction trap.
    pub(crate) fn op_div<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        mode: AddrMode,
    ) -> Result<(), Trap> {
        let src = self.operand(bus, mode, src_field(word), sz)?;
        let b = self.load(bus, src, sz)?;
        let dst = dst_field(word);
        match sz {
            Size::Word => {
                if dst & 1 != 0 {
                    return Err(Trap::Extended);
                }
                let divisor = i32::from(b as u16 as i16);
                if divisor == 0 {
                    return Err(Trap::Extended);
                }
                let dividend = self.regs.long(dst) as i32;
                if dividend == i32::MIN && divisor == -1 {
                    return Err(Trap::Extended);
                }
                let quotient = dividend / divisor;
                let remainder = dividend % divisor;
                if quotient < i32::from(i16::MIN) || quotient > i32::from(i16::MAX) {
                    return Err(Trap::Extended);
                }
                self.regs.set_word(dst, remainder as u16);
                self.regs.set_word(dst + 1, quotient as u16);
                let mut flags = 0;
                if quotient == 0 {
                    flags |= ZF;
                }
                if quotient < 0 {
                    flags |= SF;
                }
                self.set_cc(CF | ZF | SF | PF, flags);
            }
            Size::Long => {
                if dst & 3 != 0 {
                    return Err(Trap::Extended);
                }
                let divisor = i64::from(b as i32);
                if divisor == 0 {
                    return Err(Trap::Extended);
                }
                let dividend = self.regs.quad(dst) as i64;
                if dividend == i64::MIN && divisor == -1 {
                    return Err(Trap::Extended);
                }
                let quotient = dividend / divisor;
                let remainder = dividend % divisor;
                if quotient < i64::from(i32::MIN) || quotient > i64::from(i32::MAX) {
                    return Err(Trap::Extended);
                }
                self.regs.set_long(dst, remainder as u32);
                self.regs.set_long(dst + 2, quotient as u32);
                let mut flags = 0;
                if quotient == 0 {
                    flags |= ZF;
                }
                if quotient < 0 {
                    flags |= SF;
                }
                self.set_cc(CF | ZF | SF | PF, flags);
            }
            Size::Byte => return Err(Trap::Extended),
        }
        Ok(())
    }

    /// Decimal adjust after byte add/subtract, steered by C, H and D.
    pub(crate) fn op_dab(&mut self, word: u16) -> Result<(), Trap> {
        let r = src_field(word);
        let v = self.regs.byte(r);
        let mut carry = self.flag(CF);
        let result = if self.flag(DF) {
            // After a subtraction: correct downward.
            let mut adjust = 0u8;
            if self.flag(HF) {
                adjust |= 0x06;
            }
            if carry {
                adjust |= 0x60;
            }
            v.wrapping_sub(adjust)
        } else {
            let mut adjust = 0u8;
            if self.flag(HF) || (v & 0x0F) > 9 {
                adjust |= 0x06;
            }
            if carry || v > 0x99 {
                adjust |= 0x60;
                carry = true;
            }
            v.wrapping_add(adjust)
        };
        self.regs.set_byte(r, result);
        let mut flags = logic_byte(result) & (ZF | SF);
        if carry {
            flags |= CF;
        }
        self.set_cc(CF | ZF | SF, flags);
        Ok(())
    }

    /// Sign extension within a register group. Flags are untouched.
    pub(crate) fn op_exts(&mut self, word: u16, sz: Size) -> Result<(), Trap> {
        let r = src_field(word);
        match sz {
            Size::Byte => {
                let w = self.regs.word(r);
                let low = w & 0xFF;
                let value = if low & 0x80 != 0 { 0xFF00 | low } else { low };
                self.regs.set_word(r, value);
            }
            Size::Word => {
                if r & 1 != 0 {
                    return Err(Trap::Extended);
                }
                let low = self.regs.word(r + 1);
                let high = if low & 0x8000 != 0 { 0xFFFF } else { 0 };
                self.regs.set_word(r, high);
            }
            Size::Long => {
                if r & 3 != 0 {
                    return Err(Trap::Extended);
                }
                let low = self.regs.long(r + 2);
                let high = if low & 0x8000_0000 != 0 { 0xFFFF_FFFF } else { 0 };
                self.regs.set_long(r, high);
            }
        }
        Ok(())
    }
}

/// Width-dispatching add/subtract returning (result, flags, affected).
pub(crate) fn arith(sz: Size, a: u32, b: u32, carry_in: u32, subtract: bool) -> (u32, u16, u16) {
    match sz {
        Size::Byte => {
            let (value, flags) = if subtract {
                sub_byte(a as u8, b as u8, carry_in as u8)
            } else {
                add_byte(a as u8, b as u8, carry_in as u8)
            };
            (u32::from(value), flags, ARITH_BYTE)
        }
        Size::Word => {
            let (value, flags) = if subtract {
                sub_word(a as u16, b as u16, carry_in as u16)
            } else {
                add_word(a as u16, b as u16, carry_in as u16)
            };
            (u32::from(value), flags, ARITH_WORD)
        }
        Size::Long => {
            let (value, flags) = if subtract {
                sub_long(a, b, carry_in)
            } else {
                add_long(a, b, carry_in)
            };
            (value, flags, ARITH_LONG)
        }
    }
}
