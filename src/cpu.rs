//! Z8000 CPU core: state, interpreter loop and dispatch.
//!
//! The CPU does not own the bus; every entry point takes the bus
//! collaborator as a parameter so it can be shared with the rest of a
//! machine. One call to [`Z8000::execute_instruction`] runs exactly one
//! instruction, or one iteration of a block instruction, or one
//! interrupt acknowledge.
//!
//! Block instructions re-execute themselves: a non-final iteration
//! rewinds PC to the instruction's own first word, so interrupts are
//! honoured between iterations without any handler-side looping.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for width masking.

use crate::bus::{AccessKind, Z8000Bus};
use crate::decode::{DecodeTable, Op};
use crate::exceptions::{Trap, INT_NMI, INT_NVI, INT_VI};
use crate::flags::{CF, HF, NVIE, PF, SF, SYS, VIE, ZF};
use crate::observe::{Observable, Value};
use crate::registers::RegisterFile;
use crate::snapshot::CpuSnapshot;

/// Interrupt request lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLine {
    /// Non-maskable interrupt (edge sensitive).
    Nmi,
    /// Non-vectored interrupt (level sensitive).
    Nvi,
    /// Vectored interrupt (level sensitive, with a latched vector byte).
    Vi,
}

/// State of an interrupt request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Assert,
    Clear,
}

/// Cycles charged while halted with nothing pending.
const HALT_IDLE_CYCLES: u64 = 4;

/// The Zilog Z8002 processor.
pub struct Z8000 {
    /// General registers. R15 is the stack pointer.
    pub regs: RegisterFile,
    pub(crate) pc: u16,
    pub(crate) fcw: u16,
    pub(crate) psap: u16,
    /// Inactive bank of R15: holds the normal-mode stack pointer while
    /// in system mode and vice versa.
    pub(crate) nsp: u16,
    pub(crate) refresh: u16,
    /// Multi-micro line, driven by MSET/MRES and sampled by MBIT.
    pub(crate) mi: bool,

    /// Address of the current instruction's first word.
    pub(crate) op_pc: u16,
    /// Set by a block handler when the instruction must re-execute.
    pub(crate) rewind: bool,
    pub(crate) halted: bool,
    stop_requested: bool,

    nmi_pending: bool,
    vi_line: bool,
    nvi_line: bool,
    irq_vector: u8,

    pub(crate) total_cycles: u64,
    table: DecodeTable,
}

impl Z8000 {
    /// Create a CPU. Call [`Z8000::reset`] before executing: the reset
    /// vector supplies the initial PC and FCW.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            pc: 0,
            fcw: SYS,
            psap: 0,
            nsp: 0,
            refresh: 0,
            mi: false,
            op_pc: 0,
            rewind: false,
            halted: false,
            stop_requested: false,
            nmi_pending: false,
            vi_line: false,
            nvi_line: false,
            irq_vector: 0,
            total_cycles: 0,
            table: DecodeTable::new(),
        }
    }

    /// Reset: PSAP returns to zero, PC and FCW load from the reset
    /// vector, pending requests and the halt latch clear.
    pub fn reset<B: Z8000Bus>(&mut self, bus: &mut B) {
        self.psap = 0;
        self.refresh = 0;
        self.halted = false;
        self.stop_requested = false;
        self.nmi_pending = false;
        self.rewind = false;
        self.mi = false;
        self.fcw = bus.read_word(2, AccessKind::Data);
        self.pc = bus.read_word(4, AccessKind::Data);
    }

    /// Execute one instruction (or one block iteration, or one interrupt
    /// acknowledge). Returns the cycles consumed.
    pub fn execute_instruction<B: Z8000Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.total_cycles;

        if self.sample_interrupts(bus) {
            return (self.total_cycles - start) as u32;
        }

        if self.halted {
            self.total_cycles += HALT_IDLE_CYCLES;
            return HALT_IDLE_CYCLES as u32;
        }

        self.op_pc = self.pc;
        let word = self.fetch_word(bus);
        let decoded = self.table.lookup(word).map(|d| (d.op, d.cycles));
        match decoded {
            None => self.take_trap(bus, Trap::Extended),
            Some((op, cycles)) => {
                self.total_cycles += u64::from(cycles);
                self.rewind = false;
                if let Err(trap) = self.dispatch(bus, op, word) {
                    self.take_trap(bus, trap);
                } else if self.rewind {
                    self.pc = self.op_pc;
                }
            }
        }

        (self.total_cycles - start) as u32
    }

    /// Run until the cycle budget is consumed, the CPU halts with no
    /// request pending, or a stop request arrives. Returns the cycles
    /// actually consumed.
    pub fn run<B: Z8000Bus>(&mut self, bus: &mut B, cycle_budget: u64) -> u64 {
        let start = self.total_cycles;
        while self.total_cycles - start < cycle_budget {
            if self.stop_requested {
                self.stop_requested = false;
                break;
            }
            if self.halted && !self.interrupt_pending() {
                break;
            }
            self.execute_instruction(bus);
        }
        self.total_cycles - start
    }

    /// Ask the main loop to stop at the next instruction boundary.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Drive an interrupt request line.
    pub fn set_input_line(&mut self, line: InputLine, state: LineState) {
        let asserted = state == LineState::Assert;
        match line {
            InputLine::Nmi => {
                // Edge triggered: latch on assert, stay latched on clear.
                if asserted {
                    self.nmi_pending = true;
                }
            }
            InputLine::Nvi => self.nvi_line = asserted,
            InputLine::Vi => self.vi_line = asserted,
        }
    }

    /// Latch the vector byte accompanying a vectored interrupt.
    pub fn set_irq_vector(&mut self, vector: u8) {
        self.irq_vector = vector;
    }

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    /// Current flags and control word.
    #[must_use]
    pub fn fcw(&self) -> u16 {
        self.fcw
    }

    /// Replace the FCW, banking R15 if the system/normal bit changes.
    pub fn set_fcw(&mut self, value: u16) {
        if (self.fcw ^ value) & SYS != 0 {
            let sp = self.regs.word(15);
            self.regs.set_word(15, self.nsp);
            self.nsp = sp;
        }
        self.fcw = value;
    }

    /// Program status area pointer.
    #[must_use]
    pub fn psap(&self) -> u16 {
        self.psap
    }

    /// Refresh register.
    #[must_use]
    pub fn refresh(&self) -> u16 {
        self.refresh
    }

    /// True after HALT until the next interrupt or reset.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Total cycles since creation.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Snapshot the externally visible state.
    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs.words(),
            pc: self.pc,
            fcw: self.fcw,
            psap: self.psap,
            nsp: self.nsp,
            refresh: self.refresh,
            cycles: self.total_cycles,
            halted: self.halted,
        }
    }

    // === Interrupt sampling ===

    fn interrupt_pending(&self) -> bool {
        self.nmi_pending
            || (self.vi_line && self.fcw & VIE != 0)
            || (self.nvi_line && self.fcw & NVIE != 0)
    }

    /// Accept the highest-priority pending request, if any.
    fn sample_interrupts<B: Z8000Bus>(&mut self, bus: &mut B) -> bool {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.halted = false;
            self.take_interrupt(bus, INT_NMI, None);
            true
        } else if self.vi_line && self.fcw & VIE != 0 {
            self.halted = false;
            self.take_interrupt(bus, INT_VI, Some(u16::from(self.irq_vector)));
            true
        } else if self.nvi_line && self.fcw & NVIE != 0 {
            self.halted = false;
            self.take_interrupt(bus, INT_NVI, None);
            true
        } else {
            false
        }
    }

    // === Fetch and stack helpers ===

    /// Fetch the next instruction word and advance PC and the refresh row.
    pub(crate) fn fetch_word<B: Z8000Bus>(&mut self, bus: &mut B) -> u16 {
        let word = bus.read_word(self.pc, AccessKind::Fetch);
        self.pc = self.pc.wrapping_add(2);
        if self.refresh & 0x8000 != 0 {
            let row = ((self.refresh >> 1) + 1) & 0x01FF;
            self.refresh = (self.refresh & !0x03FE) | (row << 1);
        }
        word
    }

    pub(crate) fn push_word<B: Z8000Bus>(&mut self, bus: &mut B, value: u16) {
        let sp = self.regs.word(15).wrapping_sub(2);
        self.regs.set_word(15, sp);
        bus.write_word(sp, value, AccessKind::Stack);
    }

    pub(crate) fn pop_word<B: Z8000Bus>(&mut self, bus: &mut B) -> u16 {
        let sp = self.regs.word(15);
        let value = bus.read_word(sp, AccessKind::Stack);
        self.regs.set_word(15, sp.wrapping_add(2));
        value
    }

    /// Merge flag bits into the FCW under an affected mask.
    pub(crate) fn set_cc(&mut self, affected: u16, flags: u16) {
        self.fcw = (self.fcw & !affected) | (flags & affected);
    }

    pub(crate) fn flag(&self, bit: u16) -> bool {
        self.fcw & bit != 0
    }

    /// Handlers of privileged instructions call this first.
    pub(crate) fn require_system(&self) -> Result<(), Trap> {
        if self.fcw & SYS == 0 {
            return Err(Trap::Privileged);
        }
        Ok(())
    }

    // === Dispatch ===

    fn dispatch<B: Z8000Bus>(&mut self, bus: &mut B, op: Op, word: u16) -> Result<(), Trap> {
        match op {
            Op::Add(sz, mode) => self.op_add(bus, word, sz, mode),
            Op::Adc(sz) => self.op_adc(word, sz),
            Op::Sub(sz, mode) => self.op_sub(bus, word, sz, mode),
            Op::Sbc(sz) => self.op_sbc(word, sz),
            Op::Cp(sz, mode) => self.op_cp(bus, word, sz, mode),
            Op::CpImm(sz, mode) => self.op_cp_imm(bus, word, sz, mode),
            Op::And(sz, mode) => self.op_bitwise(bus, word, sz, mode, |a, b| a & b),
            Op::Or(sz, mode) => self.op_bitwise(bus, word, sz, mode, |a, b| a | b),
            Op::Xor(sz, mode) => self.op_bitwise(bus, word, sz, mode, |a, b| a ^ b),
            Op::Com(sz, mode) => self.op_com(bus, word, sz, mode),
            Op::Neg(sz, mode) => self.op_neg(bus, word, sz, mode),
            Op::Test(sz, mode) => self.op_test(bus, word, sz, mode),
            Op::Tset(sz, mode) => self.op_tset(bus, word, sz, mode),
            Op::Clr(sz, mode) => self.op_clr(bus, word, sz, mode),
            Op::Inc(sz, mode) => self.op_inc_dec(bus, word, sz, mode, false),
            Op::Dec(sz, mode) => self.op_inc_dec(bus, word, sz, mode, true),
            Op::Mult(sz, mode) => self.op_mult(bus, word, sz, mode),
            Op::Div(sz, mode) => self.op_div(bus, word, sz, mode),
            Op::Dab => self.op_dab(word),
            Op::Exts(sz) => self.op_exts(word, sz),
            Op::Ld(sz, mode, dir) => self.op_ld(bus, word, sz, mode, dir),
            Op::LdImm(sz, mode) => self.op_ld_imm(bus, word, sz, mode),
            Op::LdCompactByte => self.op_ld_compact_byte(word),
            Op::Ldk => self.op_ldk(word),
            Op::LdRel(sz, dir) => self.op_ld_rel(bus, word, sz, dir),
            Op::Lda(mode) => self.op_lda(bus, word, mode),
            Op::Ldar => self.op_ldar(bus, word),
            Op::Ldm(mode, dir) => self.op_ldm(bus, word, mode, dir),
            Op::Ex(sz, mode) => self.op_ex(bus, word, sz, mode),
            Op::Push(sz, mode) => self.op_push(bus, word, sz, mode),
            Op::PushImm => self.op_push_imm(bus, word),
            Op::Pop(sz, mode) => self.op_pop(bus, word, sz, mode),
            Op::BitStatic(sz, mode, bit) => self.op_bit_static(bus, word, sz, mode, bit),
            Op::BitDynamic(sz, bit) => self.op_bit_dynamic(bus, word, sz, bit),
            Op::Tcc(sz) => self.op_tcc(word, sz),
            Op::ShiftImm(sz, kind) => self.op_shift_imm(bus, word, sz, kind),
            Op::ShiftDyn(sz, kind) => self.op_shift_dyn(bus, word, sz, kind),
            Op::Rotate(sz, kind, count) => self.op_rotate(word, sz, kind, count),
            Op::Rldb => self.op_rldb(word),
            Op::Rrdb => self.op_rrdb(word),
            Op::Jp(mode) => self.op_jp(bus, word, mode),
            Op::Jr => self.op_jr(word),
            Op::Call(mode) => self.op_call(bus, word, mode),
            Op::Calr => self.op_calr(bus, word),
            Op::Ret => self.op_ret(bus, word),
            Op::Djnz(sz) => self.op_djnz(word, sz),
            Op::SetFlg => self.op_flag_nibble(word, FlagNibble::Set),
            Op::ResFlg => self.op_flag_nibble(word, FlagNibble::Res),
            Op::ComFlg => self.op_flag_nibble(word, FlagNibble::Com),
            Op::Nop => Ok(()),
            Op::Halt => self.op_halt(),
            Op::Iret => self.op_iret(bus),
            Op::Di => self.op_int_ctl(word, false),
            Op::Ei => self.op_int_ctl(word, true),
            Op::Sc => self.op_sc(word),
            Op::Ldps(mode) => self.op_ldps(bus, word, mode),
            Op::LdctlRead => self.op_ldctl_read(word),
            Op::LdctlWrite => self.op_ldctl_write(word),
            Op::LdctlbRead => self.op_ldctlb_read(word),
            Op::LdctlbWrite => self.op_ldctlb_write(word),
            Op::Mset => self.op_mset(),
            Op::Mres => self.op_mres(),
            Op::Mbit => self.op_mbit(),
            Op::Mreq => self.op_mreq(word),
            Op::In(sz, special) => self.op_in(bus, word, sz, special),
            Op::Out(sz, special) => self.op_out(bus, word, sz, special),
            Op::InInd(sz) => self.op_in_ind(bus, word, sz),
            Op::OutInd(sz) => self.op_out_ind(bus, word, sz),
            Op::BlockMove(sz, dec) => self.op_block_move(bus, word, sz, dec),
            Op::BlockCp(sz, dec, repeat, string) => {
                self.op_block_cp(bus, word, sz, dec, repeat, string)
            }
            Op::BlockIo(sz, dec, out, special) => {
                self.op_block_io(bus, word, sz, dec, out, special)
            }
        }
    }
}

/// Selector for the SETFLG/RESFLG/COMFLG trio.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FlagNibble {
    Set,
    Res,
    Com,
}

impl Default for Z8000 {
    fn default() -> Self {
        Self::new()
    }
}

// === Observable implementation ===

const Z8000_QUERY_PATHS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15", "rr0", "rr2", "rr4", "rr6", "rr8", "rr10", "rr12", "rr14", "pc", "fcw", "psap", "nsp",
    "refresh", "flags.c", "flags.z", "flags.s", "flags.v", "flags.h", "flags.sys", "halted",
    "cycles",
];

impl Observable for Z8000 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("rr") {
            let r: u8 = rest.parse().ok()?;
            if r < 16 && r & 1 == 0 {
                return Some(self.regs.long(r).into());
            }
            return None;
        }
        if let Some(rest) = path.strip_prefix('r') {
            if let Ok(r) = rest.parse::<u8>() {
                if r < 16 {
                    return Some(self.regs.word(r).into());
                }
                return None;
            }
        }
        match path {
            "pc" => Some(self.pc.into()),
            "fcw" => Some(self.fcw.into()),
            "psap" => Some(self.psap.into()),
            "nsp" => Some(self.nsp.into()),
            "refresh" => Some(self.refresh.into()),
            "flags.c" => Some(self.flag(CF).into()),
            "flags.z" => Some(self.flag(ZF).into()),
            "flags.s" => Some(self.flag(SF).into()),
            "flags.v" => Some(self.flag(PF).into()),
            "flags.h" => Some(self.flag(HF).into()),
            "flags.sys" => Some(self.flag(SYS).into()),
            "halted" => Some(self.halted.into()),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z8000_QUERY_PATHS
    }
}
