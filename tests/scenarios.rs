//! End-to-end scenario runner.
//!
//! Each vector in `tests/data/scenarios.json` describes initial memory
//! (hex words), optional initial registers, and the expected register,
//! flag and memory state after the program reaches HALT. The reset
//! vector points at 0x0100 and R15 starts at 0x1E00.

mod common;

use std::collections::BTreeMap;

use common::{run_until_halt, setup, TestBus};
use cpu_z8000::Z8000;
use serde::Deserialize;

#[derive(Deserialize)]
struct Scenario {
    name: String,
    #[serde(default)]
    memory: BTreeMap<String, String>,
    #[serde(default)]
    regs: BTreeMap<String, String>,
    #[serde(rename = "final")]
    expect: Expect,
}

#[derive(Deserialize)]
struct Expect {
    #[serde(default)]
    regs: BTreeMap<String, String>,
    #[serde(default)]
    memory: BTreeMap<String, String>,
    #[serde(default)]
    flags: Option<String>,
}

fn hex16(text: &str) -> u16 {
    u16::from_str_radix(text.trim(), 16)
        .unwrap_or_else(|_| panic!("bad hex word {text:?} in scenario data"))
}

fn reg_index(name: &str) -> u8 {
    name.strip_prefix('r')
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("bad register name {name:?} in scenario data"))
}

fn words(text: &str) -> Vec<u16> {
    text.split_whitespace().map(hex16).collect()
}

fn apply(scenario: &Scenario, cpu: &mut Z8000, bus: &mut TestBus) {
    for (addr, image) in &scenario.memory {
        bus.load_words(hex16(addr), &words(image));
    }
    for (reg, value) in &scenario.regs {
        cpu.regs.set_word(reg_index(reg), hex16(value));
    }
}

fn check(scenario: &Scenario, cpu: &Z8000, bus: &TestBus) -> Vec<String> {
    let mut errors = Vec::new();
    for (reg, value) in &scenario.expect.regs {
        let want = hex16(value);
        let got = cpu.regs.word(reg_index(reg));
        if got != want {
            errors.push(format!("{reg}: got {got:#06X}, want {want:#06X}"));
        }
    }
    for (addr, image) in &scenario.expect.memory {
        let base = hex16(addr);
        for (i, &want) in words(image).iter().enumerate() {
            let at = base + i as u16 * 2;
            let got = bus.peek_word(at);
            if got != want {
                errors.push(format!("mem[{at:#06X}]: got {got:#06X}, want {want:#06X}"));
            }
        }
    }
    if let Some(flags) = &scenario.expect.flags {
        let snap = cpu.snapshot();
        for clause in flags.split_whitespace() {
            let (flag, value) = clause
                .split_once('=')
                .unwrap_or_else(|| panic!("bad flag clause {clause:?}"));
            let want = value == "1";
            let got = match flag {
                "c" => snap.carry(),
                "z" => snap.zero(),
                "s" => snap.sign(),
                "v" => snap.overflow(),
                "h" => snap.half_carry(),
                _ => panic!("unknown flag {flag:?}"),
            };
            if got != want {
                errors.push(format!("flag {flag}: got {got}, want {want}"));
            }
        }
    }
    errors
}

#[test]
fn scenarios_from_vectors() {
    let data = include_str!("data/scenarios.json");
    let scenarios: Vec<Scenario> = serde_json::from_str(data).expect("scenario data parses");
    assert!(!scenarios.is_empty());

    let mut failures = Vec::new();
    for scenario in &scenarios {
        let (mut cpu, mut bus) = setup(&[]);
        apply(scenario, &mut cpu, &mut bus);
        run_until_halt(&mut cpu, &mut bus);
        for error in check(scenario, &cpu, &bus) {
            failures.push(format!("{}: {error}", scenario.name));
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}
