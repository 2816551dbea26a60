//! Serializable CPU state snapshots.
//!
//! A snapshot captures everything a tracer needs to diff state across an
//! instruction: the register bank, program status, control registers and
//! the cycle counter. The serde derive makes snapshots directly usable in
//! JSON-driven harnesses.

use serde::{Deserialize, Serialize};

use crate::flags::{CF, HF, PF, SF, SYS, ZF};

/// A point-in-time copy of the externally visible CPU state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    /// Word registers R0-R15.
    pub regs: [u16; 16],
    /// Program counter.
    pub pc: u16,
    /// Flags and control word.
    pub fcw: u16,
    /// Program status area pointer.
    pub psap: u16,
    /// Normal-mode stack pointer bank.
    pub nsp: u16,
    /// Refresh register.
    pub refresh: u16,
    /// Total cycles executed.
    pub cycles: u64,
    /// True when the CPU has executed HALT and not yet been interrupted.
    pub halted: bool,
}

impl CpuSnapshot {
    /// Carry flag.
    #[must_use]
    pub const fn carry(&self) -> bool {
        self.fcw & CF != 0
    }

    /// Zero flag.
    #[must_use]
    pub const fn zero(&self) -> bool {
        self.fcw & ZF != 0
    }

    /// Sign flag.
    #[must_use]
    pub const fn sign(&self) -> bool {
        self.fcw & SF != 0
    }

    /// Parity/overflow flag.
    #[must_use]
    pub const fn overflow(&self) -> bool {
        self.fcw & PF != 0
    }

    /// Half-carry flag.
    #[must_use]
    pub const fn half_carry(&self) -> bool {
        self.fcw & HF != 0
    }

    /// True in system mode.
    #[must_use]
    pub const fn system_mode(&self) -> bool {
        self.fcw & SYS != 0
    }
}
