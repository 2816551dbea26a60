//! System behaviour: trap entry, interrupts, block iteration, HALT,
//! privileged execution, I/O, and the introspection surfaces.

mod common;

use common::{run_until_halt, setup, TestBus, INITIAL_SP, PROGRAM_BASE, RESET_FCW};
use cpu_z8000::flags::{NVIE, VIE};
use cpu_z8000::{InputLine, LineState, Observable, Value, Z8000};

/// Point a PSAP vector (FCW/PC pair) at a handler address.
fn set_vector(bus: &mut TestBus, trap: u16, handler: u16) {
    bus.poke_word(trap * 4 + 2, RESET_FCW);
    bus.poke_word(trap * 4 + 4, handler);
}

#[test]
fn undefined_opcode_takes_extended_trap() {
    // 0x0E00 is an unassigned EPU template.
    let (mut cpu, mut bus) = setup(&[0x0E00, 0x7A00]);
    set_vector(&mut bus, 1, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0202, "halted inside the trap handler");
    // Old PC then old FCW, no identifier word.
    assert_eq!(bus.peek_word(INITIAL_SP - 2), RESET_FCW);
    assert_eq!(bus.peek_word(INITIAL_SP - 4), PROGRAM_BASE + 2);
}

#[test]
fn halt_in_normal_mode_is_a_privileged_trap() {
    let (mut cpu, mut bus) = setup(&[0x7A00]);
    set_vector(&mut bus, 2, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    cpu.set_fcw(0); // drop to normal mode
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0202);
    assert_eq!(bus.peek_word(INITIAL_SP - 2), 0, "saved FCW is the normal-mode one");
    assert_eq!(bus.peek_word(INITIAL_SP - 4), PROGRAM_BASE + 2);
}

#[test]
fn normal_mode_pushes_on_the_system_stack() {
    let (mut cpu, mut bus) = setup(&[0x7A00]);
    set_vector(&mut bus, 2, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    // Normal-mode R15 is separate from the system one.
    cpu.set_fcw(0);
    cpu.regs.set_word(15, 0x0F00);
    run_until_halt(&mut cpu, &mut bus);
    // The frame landed on the system stack, not at 0x0F00.
    assert_eq!(bus.peek_word(INITIAL_SP - 2), 0);
    assert_eq!(cpu.regs.word(15), INITIAL_SP - 4);
}

#[test]
fn system_call_pushes_identifier() {
    // SC #0x42
    let (mut cpu, mut bus) = setup(&[0x7F42, 0x7A00]);
    set_vector(&mut bus, 3, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(INITIAL_SP - 2), RESET_FCW);
    assert_eq!(bus.peek_word(INITIAL_SP - 4), PROGRAM_BASE + 2);
    assert_eq!(bus.peek_word(INITIAL_SP - 6), 0x0042);
    assert_eq!(cpu.regs.word(15), INITIAL_SP - 6);
}

#[test]
fn privileged_instructions_trap_in_normal_mode() {
    for &opcode in &[
        0x7C04_u16, // EI
        0x7D12,     // LDCTL R1,FCW
        0x3D25,     // IN R5,@R2
        0x7B00,     // IRET
    ] {
        let (mut cpu, mut bus) = setup(&[opcode, 0x7A00]);
        set_vector(&mut bus, 2, 0x0200);
        bus.poke_word(0x0200, 0x7A00);
        cpu.set_fcw(0);
        run_until_halt(&mut cpu, &mut bus);
        assert_eq!(
            cpu.pc(),
            0x0202,
            "opcode {opcode:#06X} must take the privileged trap"
        );
    }
}

#[test]
fn register_zero_indirect_traps() {
    // ADD R1,@R0 is reserved (the zero slot encodes immediates), so use
    // a store through @R0: LD @R0,R1.
    let (mut cpu, mut bus) = setup(&[0x2F01, 0x7A00]);
    set_vector(&mut bus, 1, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0202);
}

#[test]
fn odd_long_register_traps() {
    // LDL RR3,#... has an odd pair index.
    let (mut cpu, mut bus) = setup(&[0x1403, 0x1111, 0x2222, 0x7A00]);
    set_vector(&mut bus, 1, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0202);
}

#[test]
fn iret_returns_from_system_call() {
    // SC #7; LD R1,#1; HALT / handler: POP R2,@R15 (discard id); IRET
    let (mut cpu, mut bus) = setup(&[0x7F07, 0x2101, 0x0001, 0x7A00]);
    set_vector(&mut bus, 3, 0x0200);
    bus.load_words(0x0200, &[0x97F2, 0x7B00]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(2), 7, "handler saw the call identifier");
    assert_eq!(cpu.regs.word(1), 1, "execution resumed after SC");
    assert_eq!(cpu.regs.word(15), INITIAL_SP);
}

#[test]
fn nmi_is_edge_latched_until_accepted() {
    // Loop forever: JR T,self
    let (mut cpu, mut bus) = setup(&[0xE8FF]);
    set_vector(&mut bus, 5, 0x0200);
    bus.poke_word(0x0200, 0x7A00);

    cpu.execute_instruction(&mut bus);
    cpu.set_input_line(InputLine::Nmi, LineState::Assert);
    cpu.set_input_line(InputLine::Nmi, LineState::Clear);
    cpu.execute_instruction(&mut bus);
    assert_eq!(cpu.pc(), 0x0200, "latched NMI accepted after the line dropped");
}

#[test]
fn vectored_interrupt_pushes_vector_byte() {
    let (mut cpu, mut bus) = setup(&[0xE8FF]);
    set_vector(&mut bus, 7, 0x0200);
    bus.poke_word(0x0200, 0x7A00);

    cpu.set_fcw(RESET_FCW | VIE);
    cpu.set_irq_vector(0x33);
    cpu.set_input_line(InputLine::Vi, LineState::Assert);
    cpu.execute_instruction(&mut bus);
    cpu.set_input_line(InputLine::Vi, LineState::Clear);

    assert_eq!(cpu.pc(), 0x0200);
    assert_eq!(bus.peek_word(INITIAL_SP - 6), 0x0033);
}

#[test]
fn masked_interrupts_wait_for_enable() {
    // EI NVI; loop
    let (mut cpu, mut bus) = setup(&[0x7C06, 0xE8FF]);
    set_vector(&mut bus, 6, 0x0200);
    bus.poke_word(0x0200, 0x7A00);

    cpu.set_input_line(InputLine::Nvi, LineState::Assert);
    cpu.execute_instruction(&mut bus); // EI NVI (NVIE was clear, line waits)
    assert_ne!(cpu.pc(), 0x0200, "request held off while masked");
    assert_ne!(cpu.fcw() & NVIE, 0);
    cpu.execute_instruction(&mut bus); // boundary: now accepted
    assert_eq!(cpu.pc(), 0x0200);
}

#[test]
fn halt_waits_for_interrupt_then_resumes_after() {
    // HALT; LD R1,#1; HALT
    let (mut cpu, mut bus) = setup(&[0x7A00, 0x2101, 0x0001, 0x7A00]);
    set_vector(&mut bus, 5, 0x0200);
    bus.poke_word(0x0200, 0x7B00); // handler: IRET

    cpu.execute_instruction(&mut bus); // HALT
    assert!(cpu.is_halted());
    let idle = cpu.execute_instruction(&mut bus);
    assert!(idle > 0, "halted CPU still burns cycles");
    assert!(cpu.is_halted());

    cpu.set_input_line(InputLine::Nmi, LineState::Assert);
    cpu.execute_instruction(&mut bus); // NMI entry
    assert!(!cpu.is_halted());
    cpu.execute_instruction(&mut bus); // IRET
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(1), 1, "resumed after the HALT instruction");
}

#[test]
fn ldir_moves_block_and_rewinds_between_iterations() {
    // LDIR @R5,@R4,R6; HALT
    let (mut cpu, mut bus) = setup(&[0xBB41, 0x0650, 0x7A00]);
    bus.load_words(0x1000, &[0x1111, 0x2222, 0x3333]);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 0x1100);
    cpu.regs.set_word(6, 3);

    // One iteration leaves PC on the instruction itself.
    cpu.execute_instruction(&mut bus);
    assert_eq!(cpu.pc(), PROGRAM_BASE);
    assert_eq!(cpu.regs.word(6), 2);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(0x1100), 0x1111);
    assert_eq!(bus.peek_word(0x1102), 0x2222);
    assert_eq!(bus.peek_word(0x1104), 0x3333);
    assert_eq!(cpu.regs.word(4), 0x1006);
    assert_eq!(cpu.regs.word(5), 0x1106);
    assert_eq!(cpu.regs.word(6), 0);
    assert!(cpu.snapshot().overflow(), "V marks count exhaustion");
}

#[test]
fn ldi_performs_exactly_one_step() {
    // LDI @R5,@R4,R6; HALT
    let (mut cpu, mut bus) = setup(&[0xBB41, 0x0658, 0x7A00]);
    bus.load_words(0x1000, &[0xAAAA, 0xBBBB]);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 0x1100);
    cpu.regs.set_word(6, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(0x1100), 0xAAAA);
    assert_eq!(bus.peek_word(0x1102), 0, "second element untouched");
    assert_eq!(cpu.regs.word(6), 1);
    assert!(!cpu.snapshot().overflow());
}

#[test]
fn lddr_walks_backwards() {
    // LDDR @R5,@R4,R6; HALT
    let (mut cpu, mut bus) = setup(&[0xBB49, 0x0650, 0x7A00]);
    bus.load_words(0x1000, &[0x1111, 0x2222]);
    cpu.regs.set_word(4, 0x1002);
    cpu.regs.set_word(5, 0x1102);
    cpu.regs.set_word(6, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(0x1102), 0x2222);
    assert_eq!(bus.peek_word(0x1100), 0x1111);
    assert_eq!(cpu.regs.word(4), 0x0FFE);
    assert_eq!(cpu.regs.word(5), 0x10FE);
}

#[test]
fn byte_block_move_steps_by_one() {
    // LDIRB @R5,@R4,R6; HALT
    let (mut cpu, mut bus) = setup(&[0xBA41, 0x0650, 0x7A00]);
    bus.ram[0x1000] = 0xDE;
    bus.ram[0x1001] = 0xAD;
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 0x1100);
    cpu.regs.set_word(6, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.ram[0x1100], 0xDE);
    assert_eq!(bus.ram[0x1101], 0xAD);
    assert_eq!(cpu.regs.word(4), 0x1002);
}

#[test]
fn cpir_stops_on_first_match() {
    // CPIR R3,@R4,R5,EQ; HALT
    let (mut cpu, mut bus) = setup(&[0xBB44, 0x0536, 0x7A00]);
    bus.load_words(0x1000, &[0x1111, 0x2222, 0x3333, 0x4444, 0x5555]);
    cpu.regs.set_word(3, 0x3333);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 5);
    run_until_halt(&mut cpu, &mut bus);
    assert!(cpu.snapshot().zero(), "match leaves Z set");
    assert_eq!(cpu.regs.word(4), 0x1006, "pointer passed the match");
    assert_eq!(cpu.regs.word(5), 2);
}

#[test]
fn cpir_without_match_exhausts_count() {
    let (mut cpu, mut bus) = setup(&[0xBB44, 0x0536, 0x7A00]);
    bus.load_words(0x1000, &[0x1111, 0x2222]);
    cpu.regs.set_word(3, 0x9999);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(5), 0);
    assert!(cpu.snapshot().overflow());
    assert!(!cpu.snapshot().zero());
}

#[test]
fn cpsi_compares_memory_with_memory() {
    // CPSI @R2,@R4,R5,EQ; HALT
    let (mut cpu, mut bus) = setup(&[0xBB42, 0x0526, 0x7A00]);
    bus.poke_word(0x1000, 0x1234);
    bus.poke_word(0x2000, 0x1234);
    cpu.regs.set_word(2, 0x2000);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 1);
    run_until_halt(&mut cpu, &mut bus);
    assert!(cpu.snapshot().zero());
    assert_eq!(cpu.regs.word(2), 0x2002);
    assert_eq!(cpu.regs.word(4), 0x1002);
}

#[test]
fn block_instruction_interruptible_between_iterations() {
    // LDIR with an NMI arriving mid-block; handler returns with IRET.
    let (mut cpu, mut bus) = setup(&[0xBB41, 0x0650, 0x7A00]);
    set_vector(&mut bus, 5, 0x0200);
    bus.poke_word(0x0200, 0x7B00); // IRET
    bus.load_words(0x1000, &[0x1111, 0x2222, 0x3333]);
    cpu.regs.set_word(4, 0x1000);
    cpu.regs.set_word(5, 0x1100);
    cpu.regs.set_word(6, 3);

    cpu.execute_instruction(&mut bus); // first iteration
    cpu.set_input_line(InputLine::Nmi, LineState::Assert);
    cpu.execute_instruction(&mut bus); // NMI entry
    assert_eq!(
        bus.peek_word(INITIAL_SP - 4),
        PROGRAM_BASE,
        "saved PC points at the block instruction"
    );
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(6), 0, "block completed after the interrupt");
    assert_eq!(bus.peek_word(0x1104), 0x3333);
}

#[test]
fn out_then_in_round_trips_a_port() {
    // LD R3,#0xBEEF; OUT #0,R3; IN R4,#0; HALT
    let (mut cpu, mut bus) = setup(&[0x2103, 0xBEEF, 0x3B36, 0x0000, 0x3B44, 0x0000, 0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(4), 0xBEEF);
}

#[test]
fn special_io_space_is_disjoint() {
    // LD R3,#0x1111; OUT #5,R3; LD R3,#0x2222; SOUT #5,R3;
    // IN R4,#5; SIN R6,#5; HALT
    let (mut cpu, mut bus) = setup(&[
        0x2103, 0x1111, 0x3B36, 0x0005, 0x2103, 0x2222, 0x3B37, 0x0005, 0x3B44, 0x0005, 0x3B65,
        0x0005, 0x7A00,
    ]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(4), 0x1111);
    assert_eq!(cpu.regs.word(6), 0x2222);
}

#[test]
fn indirect_port_addressing() {
    // LD R2,#0x10; LD R3,#0x0DDC; OUT @R2,R3; IN R5,@R2; HALT
    let (mut cpu, mut bus) = setup(&[
        0x2102, 0x0010, 0x2103, 0x0DDC, 0x3F23, 0x3D25, 0x7A00,
    ]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.word(5), 0x0DDC);
    assert_eq!(bus.ports[0x10], 0x0DDC);
}

#[test]
fn block_input_fills_memory() {
    // INIR @R2,@R3,R4; HALT
    let (mut cpu, mut bus) = setup(&[0x3B30, 0x0420, 0x7A00]);
    bus.ports[0x20] = 0xABCD;
    cpu.regs.set_word(2, 0x3000);
    cpu.regs.set_word(3, 0x0020);
    cpu.regs.set_word(4, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(0x3000), 0xABCD);
    assert_eq!(bus.peek_word(0x3002), 0xABCD);
    assert_eq!(cpu.regs.word(2), 0x3004);
    assert_eq!(cpu.regs.word(4), 0);
    assert!(cpu.snapshot().overflow());
}

#[test]
fn block_output_drains_memory() {
    // OTIR @R3,@R2,R4; HALT
    let (mut cpu, mut bus) = setup(&[0x3B22, 0x0430, 0x7A00]);
    bus.poke_word(0x3000, 0x5A5A);
    bus.poke_word(0x3002, 0xA5A5);
    cpu.regs.set_word(2, 0x3000);
    cpu.regs.set_word(3, 0x0040);
    cpu.regs.set_word(4, 2);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.ports[0x40], 0xA5A5, "last element written wins");
    assert_eq!(cpu.regs.word(2), 0x3004);
}

#[test]
fn ldps_loads_complete_program_status() {
    // LD R1,#0x0300; LDPS @R1  /  status block: FCW with carry, PC 0x0200
    let (mut cpu, mut bus) = setup(&[0x2101, 0x0300, 0x3910]);
    bus.poke_word(0x0300, RESET_FCW | 0x0080);
    bus.poke_word(0x0302, 0x0200);
    bus.poke_word(0x0200, 0x7A00);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0202);
    assert!(cpu.snapshot().carry());
}

#[test]
fn ldctl_moves_control_registers() {
    // LD R2,#0x0400; LDCTL PSAP,R2; LDCTL R1,FCW; HALT
    let (mut cpu, mut bus) = setup(&[0x2102, 0x0400, 0x7D2D, 0x7D12, 0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.psap(), 0x0400);
    assert_eq!(cpu.regs.word(1), RESET_FCW);
}

#[test]
fn ldctlb_transfers_flag_byte_without_privilege() {
    // SETFLG C,Z; LDCTLB RL0,FLAGS; HALT — in normal mode.
    let (mut cpu, mut bus) = setup(&[0x8DC1, 0x8C81, 0x7A00]);
    set_vector(&mut bus, 2, 0x0300);
    bus.poke_word(0x0300, 0x7A00);
    cpu.set_fcw(0);
    run_until_halt(&mut cpu, &mut bus);
    // HALT trapped (normal mode), but the two flag ops ran unprivileged.
    assert_eq!(cpu.regs.byte(8) & 0xC0, 0xC0);
}

#[test]
fn refresh_row_counts_fetches_when_enabled() {
    // LD R2,#0x8000; LDCTL REFRESH,R2; NOP; NOP; HALT
    let (mut cpu, mut bus) = setup(&[0x2102, 0x8000, 0x7D2B, 0x8D07, 0x8D07, 0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    let row = (cpu.refresh() >> 1) & 0x1FF;
    assert_eq!(row, 3, "one bump per fetched word after enabling");
    assert_ne!(cpu.refresh() & 0x8000, 0);
}

#[test]
fn run_honours_budget_and_stop_requests() {
    // Tight loop.
    let (mut cpu, mut bus) = setup(&[0xE8FF]);
    let spent = cpu.run(&mut bus, 120);
    assert!(spent >= 120);
    assert!(!cpu.is_halted());

    cpu.request_stop();
    let spent = cpu.run(&mut bus, 1_000_000);
    assert_eq!(spent, 0, "stop request honoured at the loop head");
}

#[test]
fn run_exits_when_halted_with_nothing_pending() {
    let (mut cpu, mut bus) = setup(&[0x7A00]);
    let spent = cpu.run(&mut bus, 1_000_000);
    assert!(cpu.is_halted());
    assert!(spent < 1_000_000);
}

#[test]
fn query_paths_expose_registers_and_flags() {
    let (mut cpu, mut bus) = setup(&[0x2103, 0xFFFF, 0x0103, 0x0001, 0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.query("r3"), Some(Value::U16(0)));
    assert_eq!(cpu.query("flags.c"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("flags.sys"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("halted"), Some(Value::Bool(true)));
    assert!(cpu.query("bogus").is_none());
    assert!(cpu.query_paths().contains(&"rr14"));
}

#[test]
fn snapshot_serializes_and_restores() {
    let (mut cpu, mut bus) = setup(&[0x2101, 0x1234, 0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    let snap = cpu.snapshot();
    let json = serde_json::to_string(&snap).expect("snapshot serializes");
    let back: cpu_z8000::CpuSnapshot = serde_json::from_str(&json).expect("snapshot parses");
    assert_eq!(snap, back);
    assert_eq!(back.regs[1], 0x1234);
    assert!(back.halted);
}

#[test]
fn reset_reloads_program_status_and_clears_state() {
    let (mut cpu, mut bus) = setup(&[0x7A00]);
    run_until_halt(&mut cpu, &mut bus);
    assert!(cpu.is_halted());
    cpu.reset(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.pc(), PROGRAM_BASE);
    assert_eq!(cpu.fcw(), RESET_FCW);
    assert_eq!(cpu.psap(), 0);
}

fn fresh_cpu() -> Z8000 {
    Z8000::new()
}

#[test]
fn new_cpu_starts_in_system_mode() {
    let cpu = fresh_cpu();
    assert_eq!(cpu.query("flags.sys"), Some(Value::Bool(true)));
    assert_eq!(cpu.total_cycles(), 0);
}
