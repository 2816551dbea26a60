//! Bus traits for the Z8000's memory and I/O spaces.
//!
//! The Z8000 has a 16-bit data bus and three logical address spaces:
//! program, data and stack. In non-segmented mode the stack shares the
//! program space, but the CPU still tags every access with its kind so
//! an embedder (or tracer) can split them. Words are big-endian in
//! memory; the bus exchanges host-native values and the CPU performs all
//! multi-word assembly (longs are read high word first).
//!
//! I/O lives in two separate 16-bit port spaces: the standard space used
//! by IN/OUT and the special space used by SIN/SOUT.

/// The kind of memory access, from the CPU's point of view.
///
/// Plays the role the FC pins play on other 16-bit processors:
/// implementations may route kinds to distinct address spaces or ignore
/// the distinction entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Instruction-word fetch (program space).
    Fetch,
    /// Operand read/write, including vector-table reads (data space,
    /// which may alias program space).
    Data,
    /// Stack push/pop through R15 and trap-frame traffic.
    Stack,
}

/// Which of the two port spaces an I/O access targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpace {
    /// The space addressed by IN/OUT.
    Standard,
    /// The space addressed by SIN/SOUT.
    Special,
}

/// Memory and I/O collaborator for the Z8000 core.
///
/// Odd addresses on word accesses are passed through unchanged; alignment
/// policy belongs to the implementation. Whatever value comes back is
/// treated as legitimate; there is no bus-error signalling.
pub trait Z8000Bus {
    /// Read a byte.
    fn read_byte(&mut self, addr: u16, kind: AccessKind) -> u8;

    /// Write a byte.
    fn write_byte(&mut self, addr: u16, value: u8, kind: AccessKind);

    /// Read a big-endian word.
    fn read_word(&mut self, addr: u16, kind: AccessKind) -> u16;

    /// Write a big-endian word.
    fn write_word(&mut self, addr: u16, value: u16, kind: AccessKind);

    /// Read a byte from an I/O port.
    fn io_read_byte(&mut self, port: u16, space: PortSpace) -> u8;

    /// Write a byte to an I/O port.
    fn io_write_byte(&mut self, port: u16, value: u8, space: PortSpace);

    /// Read a word from an I/O port.
    fn io_read_word(&mut self, port: u16, space: PortSpace) -> u16;

    /// Write a word to an I/O port.
    fn io_write_word(&mut self, port: u16, value: u16, space: PortSpace);
}
