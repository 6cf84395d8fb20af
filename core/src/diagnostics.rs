//! Text dumps of machine state for interactive debugging.
//! None of these touch the state they describe.

use std::fmt::Write;

use crate::constants::REGISTER_COUNT;
use crate::state::State;

pub fn dump_pc(state: &State, opcode: u16) -> String {
    format!(
        "Dump Program Counter:\nPC: 0x{:04X}\nOpcode: 0x{:04X}\n",
        state.pc, opcode
    )
}

/// Four registers per line
pub fn dump_registers(state: &State) -> String {
    let mut out = String::from("Dump Registers:\n");
    for row in (0..REGISTER_COUNT).step_by(4) {
        let line: Vec<String> = (row..row + 4)
            .map(|r| format!("V{:X}=0x{:X}", r, state.v[r]))
            .collect();
        // writing to a String can't fail
        let _ = writeln!(out, "{}", line.join("\t"));
    }
    out
}

/// Eight bytes per line, prefixed with the address of the first
pub fn dump_memory(state: &State) -> String {
    let mut out = String::from("Dump Memory(hex):\n");
    for (line, chunk) in state.memory.chunks(8).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        let _ = writeln!(out, "{:04X}:  {}", line * 8, bytes.join(" "));
    }
    out
}
