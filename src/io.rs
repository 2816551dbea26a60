//! Port I/O handlers, single and iterated.
//!
//! All port traffic is privileged. Direct forms carry the port number in
//! the word after the opcode; indirect forms take it from a register.
//! The special space (SIN/SOUT) is a second, disjoint port space.

#![allow(clippy::cast_possible_truncation)]

use crate::bus::{AccessKind, PortSpace, Z8000Bus};
use crate::cpu::Z8000;
use crate::exceptions::Trap;
use crate::operands::{dst_field, src_field, Size};

fn space(special: bool) -> PortSpace {
    if special {
        PortSpace::Special
    } else {
        PortSpace::Standard
    }
}

impl Z8000 {
    /// IN/SIN with a direct port number.
    pub(crate) fn op_in<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        special: bool,
    ) -> Result<(), Trap> {
        self.require_system()?;
        let reg = src_field(word);
        let port = self.fetch_word(bus);
        match sz {
            Size::Byte => {
                let value = bus.io_read_byte(port, space(special));
                self.regs.set_byte(reg, value);
            }
            _ => {
                let value = bus.io_read_word(port, space(special));
                self.regs.set_word(reg, value);
            }
        }
        Ok(())
    }

    /// OUT/SOUT with a direct port number.
    pub(crate) fn op_out<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        special: bool,
    ) -> Result<(), Trap> {
        self.require_system()?;
        let reg = src_field(word);
        let port = self.fetch_word(bus);
        match sz {
            Size::Byte => bus.io_write_byte(port, self.regs.byte(reg), space(special)),
            _ => bus.io_write_word(port, self.regs.word(reg), space(special)),
        }
        Ok(())
    }

    /// IN with the port in a register.
    pub(crate) fn op_in_ind<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
    ) -> Result<(), Trap> {
        self.require_system()?;
        let port_reg = src_field(word);
        if port_reg == 0 {
            return Err(Trap::Extended);
        }
        let port = self.regs.word(port_reg);
        let reg = dst_field(word);
        match sz {
            Size::Byte => {
                let value = bus.io_read_byte(port, PortSpace::Standard);
                self.regs.set_byte(reg, value);
            }
            _ => {
                let value = bus.io_read_word(port, PortSpace::Standard);
                self.regs.set_word(reg, value);
            }
        }
        Ok(())
    }

    /// OUT with the port in a register.
    pub(crate) fn op_out_ind<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
    ) -> Result<(), Trap> {
        self.require_system()?;
        let port_reg = src_field(word);
        if port_reg == 0 {
            return Err(Trap::Extended);
        }
        let port = self.regs.word(port_reg);
        let reg = dst_field(word);
        match sz {
            Size::Byte => bus.io_write_byte(port, self.regs.byte(reg), PortSpace::Standard),
            _ => bus.io_write_word(port, self.regs.word(reg), PortSpace::Standard),
        }
        Ok(())
    }

    /// One step of INI/IND/OUTI/OUTD and friends. The first word names
    /// the source-side register (port for input, memory pointer for
    /// output); the second word names the other side, the count, and
    /// whether the form repeats.
    pub(crate) fn op_block_io<B: Z8000Bus>(
        &mut self,
        bus: &mut B,
        word: u16,
        sz: Size,
        dec: bool,
        out: bool,
        special: bool,
    ) -> Result<(), Trap> {
        self.require_system()?;
        let first = src_field(word);
        let second = self.fetch_word(bus);
        let count_reg = ((second >> 8) & 15) as u8;
        let other = ((second >> 4) & 15) as u8;
        let single = second & 8 != 0;

        let (mem_ptr, port_reg) = if out { (first, other) } else { (other, first) };
        if mem_ptr == 0 {
            return Err(Trap::Extended);
        }
        let addr = self.regs.word(mem_ptr);
        let port = self.regs.word(port_reg);

        if out {
            match sz {
                Size::Byte => {
                    let value = bus.read_byte(addr, AccessKind::Data);
                    bus.io_write_byte(port, value, space(special));
                }
                _ => {
                    let value = bus.read_word(addr, AccessKind::Data);
                    bus.io_write_word(port, value, space(special));
                }
            }
        } else {
            match sz {
                Size::Byte => {
                    let value = bus.io_read_byte(port, space(special));
                    bus.write_byte(addr, value, AccessKind::Data);
                }
                _ => {
                    let value = bus.io_read_word(port, space(special));
                    bus.write_word(addr, value, AccessKind::Data);
                }
            }
        }
        self.advance_ptr(mem_ptr, sz, dec);

        let remaining = self.step_count(count_reg);
        if !(single || remaining == 0) {
            self.rewind = true;
        }
        Ok(())
    }
}
