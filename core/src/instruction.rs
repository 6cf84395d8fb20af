use std::fmt;

use rand::Rng;

use crate::error::Result;
use crate::opcode::Opcode;
use crate::operations::{self, Keypad};
use crate::state::State;

/// A decoded Chip-8 instruction.
///
/// Operands are register indices (`x`, `y`), an immediate byte (`nn`),
/// a 12-bit address (`addr`) or a sprite height (`n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Clear,
    /// 00EE
    Return,
    /// 1NNN
    Jump { addr: u16 },
    /// 2NNN
    Call { addr: u16 },
    /// 3XNN
    SkipEqualImm { x: u8, nn: u8 },
    /// 4XNN
    SkipNotEqualImm { x: u8, nn: u8 },
    /// 5XY0
    SkipEqual { x: u8, y: u8 },
    /// 6XNN
    LoadImm { x: u8, nn: u8 },
    /// 7XNN
    AddImm { x: u8, nn: u8 },
    /// 8XY0
    Move { x: u8, y: u8 },
    /// 8XY1
    Or { x: u8, y: u8 },
    /// 8XY2
    And { x: u8, y: u8 },
    /// 8XY3
    Xor { x: u8, y: u8 },
    /// 8XY4
    Add { x: u8, y: u8 },
    /// 8XY5
    Sub { x: u8, y: u8 },
    /// 8XY6
    ShiftRight { x: u8 },
    /// 8XY7
    SubN { x: u8, y: u8 },
    /// 8XYE
    ShiftLeft { x: u8 },
    /// 9XY0
    SkipNotEqual { x: u8, y: u8 },
    /// ANNN
    LoadIndex { addr: u16 },
    /// BNNN
    JumpOffset { addr: u16 },
    /// CXNN
    Random { x: u8, nn: u8 },
    /// DXYN
    Draw { x: u8, y: u8, n: u8 },
    /// EX9E
    SkipPressed { x: u8 },
    /// EXA1
    SkipNotPressed { x: u8 },
    /// FX07
    LoadDelay { x: u8 },
    /// FX0A
    WaitKey { x: u8 },
    /// FX15
    SetDelay { x: u8 },
    /// FX18
    SetSound { x: u8 },
    /// FX1E
    AddIndex { x: u8 },
    /// FX29
    LoadGlyph { x: u8 },
    /// FX33
    StoreBcd { x: u8 },
    /// FX55
    StoreRegisters { x: u8 },
    /// FX65
    LoadRegisters { x: u8 },
    /// Anything else; executes as a no-op that advances the pc
    Unknown(u16),
}

/// What the pc did after an instruction ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Moved on (advanced, skipped, jumped, called or returned)
    Continue,
    /// Stayed on a key wait that found no pressed key
    Wait,
}

impl Instruction {
    /// Selects the correct Instruction for a given Opcode
    pub fn decode(op: u16) -> Self {
        use Instruction::*;

        let (x, y, n, nn, addr) = (op.x(), op.y(), op.n(), op.nn(), op.nnn());
        match op.nibbles() {
            (0x0, _, 0xE, 0x0) => Clear,
            (0x0, _, 0xE, 0xE) => Return,
            (0x1, ..) => Jump { addr },
            (0x2, ..) => Call { addr },
            (0x3, ..) => SkipEqualImm { x, nn },
            (0x4, ..) => SkipNotEqualImm { x, nn },
            (0x5, ..) => SkipEqual { x, y },
            (0x6, ..) => LoadImm { x, nn },
            (0x7, ..) => AddImm { x, nn },
            (0x8, .., 0x0) => Move { x, y },
            (0x8, .., 0x1) => Or { x, y },
            (0x8, .., 0x2) => And { x, y },
            (0x8, .., 0x3) => Xor { x, y },
            (0x8, .., 0x4) => Add { x, y },
            (0x8, .., 0x5) => Sub { x, y },
            (0x8, .., 0x6) => ShiftRight { x },
            (0x8, .., 0x7) => SubN { x, y },
            (0x8, .., 0xE) => ShiftLeft { x },
            (0x9, ..) => SkipNotEqual { x, y },
            (0xA, ..) => LoadIndex { addr },
            (0xB, ..) => JumpOffset { addr },
            (0xC, ..) => Random { x, nn },
            (0xD, ..) => Draw { x, y, n },
            (0xE, .., 0x9, 0xE) => SkipPressed { x },
            (0xE, .., 0xA, 0x1) => SkipNotPressed { x },
            (0xF, .., 0x0, 0x7) => LoadDelay { x },
            (0xF, .., 0x0, 0xA) => WaitKey { x },
            (0xF, .., 0x1, 0x5) => SetDelay { x },
            (0xF, .., 0x1, 0x8) => SetSound { x },
            (0xF, .., 0x1, 0xE) => AddIndex { x },
            (0xF, .., 0x2, 0x9) => LoadGlyph { x },
            (0xF, .., 0x3, 0x3) => StoreBcd { x },
            (0xF, .., 0x5, 0x5) => StoreRegisters { x },
            (0xF, .., 0x6, 0x5) => LoadRegisters { x },
            _ => Unknown(op),
        }
    }

    /// Runs the instruction against `state`.
    ///
    /// Faults (stack over/underflow, out of bounds memory) are reported before
    /// anything is written, so a failed instruction leaves `state` untouched.
    pub fn execute(
        self,
        state: &mut State,
        pressed_keys: &Keypad,
        rng: &mut impl Rng,
    ) -> Result<Flow> {
        use Instruction::*;

        match self {
            Clear => operations::clr(state),
            Return => operations::rts(state)?,
            Jump { addr } => operations::jump(state, addr),
            Call { addr } => operations::call(state, addr)?,
            SkipEqualImm { x, nn } => operations::ske(state, x, nn),
            SkipNotEqualImm { x, nn } => operations::skne(state, x, nn),
            SkipEqual { x, y } => operations::skre(state, x, y),
            LoadImm { x, nn } => operations::load(state, x, nn),
            AddImm { x, nn } => operations::add(state, x, nn),
            Move { x, y } => operations::mv(state, x, y),
            Or { x, y } => operations::or(state, x, y),
            And { x, y } => operations::and(state, x, y),
            Xor { x, y } => operations::xor(state, x, y),
            Add { x, y } => operations::addr(state, x, y),
            Sub { x, y } => operations::sub(state, x, y),
            ShiftRight { x } => operations::shr(state, x),
            SubN { x, y } => operations::subn(state, x, y),
            ShiftLeft { x } => operations::shl(state, x),
            SkipNotEqual { x, y } => operations::skrne(state, x, y),
            LoadIndex { addr } => operations::loadi(state, addr),
            JumpOffset { addr } => operations::jumpi(state, addr),
            Random { x, nn } => operations::rand(state, x, nn, rng),
            Draw { x, y, n } => operations::draw(state, x, y, n)?,
            SkipPressed { x } => operations::skpr(state, x, pressed_keys),
            SkipNotPressed { x } => operations::skup(state, x, pressed_keys),
            LoadDelay { x } => operations::moved(state, x),
            WaitKey { x } => {
                if !operations::keyd(state, x, pressed_keys) {
                    return Ok(Flow::Wait);
                }
            }
            SetDelay { x } => operations::loads(state, x),
            SetSound { x } => operations::ld(state, x),
            AddIndex { x } => operations::addi(state, x),
            LoadGlyph { x } => operations::ldspr(state, x),
            StoreBcd { x } => operations::bcd(state, x)?,
            StoreRegisters { x } => operations::stor(state, x)?,
            LoadRegisters { x } => operations::read(state, x)?,
            Unknown(_) => state.pc += 0x2,
        }
        Ok(Flow::Continue)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Clear => write!(f, "cls"),
            Return => write!(f, "ret"),
            Jump { addr } => write!(f, "jp {:#05X}", addr),
            Call { addr } => write!(f, "call {:#05X}", addr),
            SkipEqualImm { x, nn } => write!(f, "se v{:X}, {:#04X}", x, nn),
            SkipNotEqualImm { x, nn } => write!(f, "sne v{:X}, {:#04X}", x, nn),
            SkipEqual { x, y } => write!(f, "se v{:X}, v{:X}", x, y),
            LoadImm { x, nn } => write!(f, "ld v{:X}, {:#04X}", x, nn),
            AddImm { x, nn } => write!(f, "add v{:X}, {:#04X}", x, nn),
            Move { x, y } => write!(f, "ld v{:X}, v{:X}", x, y),
            Or { x, y } => write!(f, "or v{:X}, v{:X}", x, y),
            And { x, y } => write!(f, "and v{:X}, v{:X}", x, y),
            Xor { x, y } => write!(f, "xor v{:X}, v{:X}", x, y),
            Add { x, y } => write!(f, "add v{:X}, v{:X}", x, y),
            Sub { x, y } => write!(f, "sub v{:X}, v{:X}", x, y),
            ShiftRight { x } => write!(f, "shr v{:X}", x),
            SubN { x, y } => write!(f, "subn v{:X}, v{:X}", x, y),
            ShiftLeft { x } => write!(f, "shl v{:X}", x),
            SkipNotEqual { x, y } => write!(f, "sne v{:X}, v{:X}", x, y),
            LoadIndex { addr } => write!(f, "ld I, {:#05X}", addr),
            JumpOffset { addr } => write!(f, "jp v0, {:#05X}", addr),
            Random { x, nn } => write!(f, "rnd v{:X}, {:#04X}", x, nn),
            Draw { x, y, n } => write!(f, "drw v{:X}, v{:X}, {:#03X}", x, y, n),
            SkipPressed { x } => write!(f, "skp v{:X}", x),
            SkipNotPressed { x } => write!(f, "sknp v{:X}", x),
            LoadDelay { x } => write!(f, "ld v{:X}, DT", x),
            WaitKey { x } => write!(f, "ld v{:X}, K", x),
            SetDelay { x } => write!(f, "ld DT, v{:X}", x),
            SetSound { x } => write!(f, "ld ST, v{:X}", x),
            AddIndex { x } => write!(f, "add I, v{:X}", x),
            LoadGlyph { x } => write!(f, "ld F, v{:X}", x),
            StoreBcd { x } => write!(f, "ld B, v{:X}", x),
            StoreRegisters { x } => write!(f, "ld [I], v{:X}", x),
            LoadRegisters { x } => write!(f, "ld v{:X}, [I]", x),
            Unknown(op) => write!(f, "raw {:#06X}", op),
        }
    }
}

#[cfg(test)]
mod test_instruction {
    use super::*;
    use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
    use crate::error::Error;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(op: u16, state: &mut State) -> Flow {
        run_with_keys(op, state, [false; 16])
    }

    fn run_with_keys(op: u16, state: &mut State, pressed_keys: Keypad) -> Flow {
        let mut rng = StdRng::seed_from_u64(0x8);
        Instruction::decode(op)
            .execute(state, &pressed_keys, &mut rng)
            .unwrap()
    }

    #[test]
    fn test_decode_secondary_fields() {
        assert_eq!(Instruction::decode(0x00E0), Instruction::Clear);
        assert_eq!(Instruction::decode(0x00EE), Instruction::Return);
        assert_eq!(Instruction::decode(0x812E), Instruction::ShiftLeft { x: 1 });
        assert_eq!(Instruction::decode(0xE3A1), Instruction::SkipNotPressed { x: 3 });
        assert_eq!(Instruction::decode(0xF265), Instruction::LoadRegisters { x: 2 });
    }

    #[test]
    fn test_decode_unmatched_secondary_fields() {
        for op in [0x0000, 0x00E1, 0x0123, 0x8128, 0x812F, 0xE19F, 0xF100, 0xF1FF] {
            assert_eq!(Instruction::decode(op), Instruction::Unknown(op));
        }
    }

    #[test]
    fn test_display_mnemonics() {
        assert_eq!(Instruction::decode(0x00E0).to_string(), "cls");
        assert_eq!(Instruction::decode(0x1200).to_string(), "jp 0x200");
        assert_eq!(Instruction::decode(0x6A2B).to_string(), "ld vA, 0x2B");
        assert_eq!(Instruction::decode(0xD125).to_string(), "drw v1, v2, 0x5");
        assert_eq!(Instruction::decode(0xF10A).to_string(), "ld v1, K");
        assert_eq!(Instruction::decode(0x0123).to_string(), "raw 0x0123");
    }

    #[test]
    fn test_unknown_advances_pc() {
        let mut state = State::new();
        let flow = run(0x0123, &mut state);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_00e0_cls() {
        let mut state = State::new();
        state.frame_buffer[0][0] = 1;
        state.frame_buffer[31][63] = 1;
        run(0x00E0, &mut state);
        assert!(state.frame_buffer.iter().all(|row| row.iter().all(|&p| p == 0)));
        assert!(state.draw_flag);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_00ee_ret() {
        let mut state = State::new();
        state.sp = 0x1;
        state.stack[0] = 0x0ABC;
        run(0x00EE, &mut state);
        assert_eq!(state.sp, 0x0);
        assert_eq!(state.pc, 0x0ABC);
    }

    #[test]
    fn test_00ee_ret_underflow() {
        let mut state = State::new();
        let mut rng = StdRng::seed_from_u64(0x8);
        let result = Instruction::Return.execute(&mut state, &[false; 16], &mut rng);
        assert!(matches!(result, Err(Error::StackUnderflow { pc: 0x200 })));
        assert_eq!(state.pc, 0x200);
    }

    #[test]
    fn test_1nnn_jp() {
        let mut state = State::new();
        run(0x1ABC, &mut state);
        assert_eq!(state.pc, 0x0ABC);
    }

    #[test]
    fn test_2nnn_call() {
        let mut state = State::new();
        state.pc = 0x0ABC;
        run(0x2123, &mut state);
        assert_eq!(state.sp, 0x1);
        assert_eq!(state.stack[0], 0x0ABE);
        assert_eq!(state.pc, 0x0123);
    }

    #[test]
    fn test_2nnn_then_00ee_returns_past_call() {
        let mut state = State::new();
        state.pc = 0x0300;
        run(0x2400, &mut state);
        run(0x00EE, &mut state);
        assert_eq!(state.pc, 0x0302);
        assert_eq!(state.sp, 0x0);
    }

    #[test]
    fn test_2nnn_call_overflow() {
        let mut state = State::new();
        state.sp = 16;
        let mut rng = StdRng::seed_from_u64(0x8);
        let result = Instruction::decode(0x2123).execute(&mut state, &[false; 16], &mut rng);
        assert!(matches!(result, Err(Error::StackOverflow { pc: 0x200 })));
        assert_eq!(state.pc, 0x200);
    }

    #[test]
    fn test_3xnn_se_skips() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        run(0x3111, &mut state);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_3xnn_se_doesntskip() {
        let mut state = State::new();
        run(0x3111, &mut state);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_4xnn_sne_skips() {
        let mut state = State::new();
        run(0x4111, &mut state);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_4xnn_sne_doesntskip() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        run(0x4111, &mut state);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_5xy0_se_skips() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        state.v[0x2] = 0x11;
        run(0x5120, &mut state);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_5xy0_se_doesntskip() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        run(0x5120, &mut state);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_6xnn_ld() {
        let mut state = State::new();
        run(0x6122, &mut state);
        assert_eq!(state.v[0x1], 0x22);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_7xnn_add_wraps_without_flag() {
        let mut state = State::new();
        state.v[0x1] = 0xFF;
        state.v[0xF] = 0x7;
        run(0x7102, &mut state);
        assert_eq!(state.v[0x1], 0x01);
        assert_eq!(state.v[0xF], 0x7);
    }

    #[test]
    fn test_8xy0_ld() {
        let mut state = State::new();
        state.v[0x2] = 0x1;
        run(0x8120, &mut state);
        assert_eq!(state.v[0x1], 0x1);
    }

    #[test]
    fn test_8xy1_or() {
        let mut state = State::new();
        state.v[0x1] = 0x6;
        state.v[0x2] = 0x3;
        run(0x8121, &mut state);
        assert_eq!(state.v[0x1], 0x7);
    }

    #[test]
    fn test_8xy2_and() {
        let mut state = State::new();
        state.v[0x1] = 0x6;
        state.v[0x2] = 0x3;
        run(0x8122, &mut state);
        assert_eq!(state.v[0x1], 0x2);
    }

    #[test]
    fn test_8xy3_xor() {
        let mut state = State::new();
        state.v[0x1] = 0x6;
        state.v[0x2] = 0x3;
        run(0x8123, &mut state);
        assert_eq!(state.v[0x1], 0x5);
    }

    #[test]
    fn test_8xy4_add_nocarry() {
        let mut state = State::new();
        state.v[0x1] = 0x01;
        state.v[0x2] = 0x01;
        run(0x8124, &mut state);
        assert_eq!(state.v[0x1], 0x02);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8xy4_add_carry() {
        let mut state = State::new();
        state.v[0x1] = 0xFF;
        state.v[0x2] = 0x01;
        run(0x8124, &mut state);
        assert_eq!(state.v[0x1], 0x00);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_8fy4_flag_overwrites_sum() {
        let mut state = State::new();
        state.v[0xF] = 0x10;
        state.v[0x2] = 0x10;
        run(0x8F24, &mut state);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8fy5_difference_overwrites_flag() {
        let mut state = State::new();
        state.v[0xF] = 0x05;
        state.v[0x2] = 0x03;
        run(0x8F25, &mut state);
        assert_eq!(state.v[0xF], 0x02);
    }

    #[test]
    fn test_8fy6_shifted_value_overwrites_flag() {
        let mut state = State::new();
        state.v[0xF] = 0x05;
        run(0x8F06, &mut state);
        assert_eq!(state.v[0xF], 0x02);
    }

    #[test]
    fn test_8fy7_difference_overwrites_flag() {
        let mut state = State::new();
        state.v[0xF] = 0x03;
        state.v[0x2] = 0x05;
        run(0x8F27, &mut state);
        assert_eq!(state.v[0xF], 0x02);
    }

    #[test]
    fn test_8fye_shifted_value_overwrites_flag() {
        let mut state = State::new();
        state.v[0xF] = 0x81;
        run(0x8F0E, &mut state);
        assert_eq!(state.v[0xF], 0x02);
    }

    #[test]
    fn test_8xy5_sub_noborrow() {
        let mut state = State::new();
        state.v[0x1] = 0x05;
        state.v[0x2] = 0x03;
        run(0x8125, &mut state);
        assert_eq!(state.v[0x1], 0x02);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_8xy5_sub_borrow() {
        let mut state = State::new();
        state.v[0x1] = 0x03;
        state.v[0x2] = 0x05;
        run(0x8125, &mut state);
        assert_eq!(state.v[0x1], 0xFE);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8xy5_sub_equal_clears_flag() {
        let mut state = State::new();
        state.v[0x1] = 0x03;
        state.v[0x2] = 0x03;
        run(0x8125, &mut state);
        assert_eq!(state.v[0x1], 0x00);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8xy6_shr_lsb() {
        let mut state = State::new();
        state.v[0x1] = 0b0000_0011;
        run(0x8106, &mut state);
        assert_eq!(state.v[0x1], 0b0000_0001);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_8xy6_shr_ignores_vy() {
        let mut state = State::new();
        state.v[0x1] = 0x4;
        state.v[0x2] = 0xFF;
        run(0x8126, &mut state);
        assert_eq!(state.v[0x1], 0x2);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8xy7_subn_noborrow() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        state.v[0x2] = 0x33;
        run(0x8127, &mut state);
        assert_eq!(state.v[0x1], 0x22);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_8xy7_subn_borrow() {
        let mut state = State::new();
        state.v[0x1] = 0x12;
        state.v[0x2] = 0x11;
        run(0x8127, &mut state);
        assert_eq!(state.v[0x1], 0xFF);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_8xye_shl_msb() {
        let mut state = State::new();
        state.v[0x1] = 0xFF;
        run(0x810E, &mut state);
        // 0xFF * 2 = 0x01FE
        assert_eq!(state.v[0x1], 0xFE);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_8xye_shl_nomsb() {
        let mut state = State::new();
        state.v[0x1] = 0x4;
        run(0x810E, &mut state);
        assert_eq!(state.v[0x1], 0x8);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_9xy0_sne_skips() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        run(0x9120, &mut state);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_9xy0_sne_doesntskip() {
        let mut state = State::new();
        state.v[0x1] = 0x11;
        state.v[0x2] = 0x11;
        run(0x9120, &mut state);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_annn_ld() {
        let mut state = State::new();
        run(0xAABC, &mut state);
        assert_eq!(state.i, 0xABC);
    }

    #[test]
    fn test_bnnn_jp() {
        let mut state = State::new();
        state.v[0x0] = 0x2;
        run(0xBABC, &mut state);
        assert_eq!(state.pc, 0xABE);
    }

    #[test]
    fn test_cxnn_rnd_is_masked() {
        let mut state = State::new();
        for _ in 0..32 {
            state.pc = 0x200;
            run(0xC10F, &mut state);
            assert_eq!(state.v[0x1] & 0xF0, 0x0);
        }
        run(0xC100, &mut state);
        assert_eq!(state.v[0x1], 0x0);
    }

    #[test]
    fn test_dxyn_drw_draws() {
        let mut state = State::new();
        state.v[0x0] = 0x1;
        // Draw the 0x0 glyph with a 1x 1y offset
        state.i = 0x50;
        run(0xD005, &mut state);
        let mut expected = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
        expected[1][1..5].copy_from_slice(&[1, 1, 1, 1]);
        expected[2][1..5].copy_from_slice(&[1, 0, 0, 1]);
        expected[3][1..5].copy_from_slice(&[1, 0, 0, 1]);
        expected[4][1..5].copy_from_slice(&[1, 0, 0, 1]);
        expected[5][1..5].copy_from_slice(&[1, 1, 1, 1]);
        assert!(state
            .frame_buffer
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| a[..] == b[..]));
        assert!(state.draw_flag);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_dxyn_drw_collides() {
        let mut state = State::new();
        state.i = 0x50;
        state.frame_buffer[0][0] = 1;
        run(0xD001, &mut state);
        assert_eq!(state.v[0xF], 0x1);
        assert_eq!(state.frame_buffer[0][0], 0);
    }

    #[test]
    fn test_dxyn_drw_xors() {
        let mut state = State::new();
        // 0 1 0 1 -> Set
        state.frame_buffer[0][2..6].copy_from_slice(&[0, 1, 0, 1]);
        // 1 1 0 0 -> Draw xor
        state.memory[0x300] = 0b1100_0000;
        state.i = 0x300;
        state.v[0x1] = 0x2;
        run(0xD121, &mut state);
        assert_eq!(state.frame_buffer[0][2..6], [1, 0, 0, 1]);
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_dxyn_drw_clips_at_edges() {
        let mut state = State::new();
        state.i = 0x50;
        state.v[0x1] = 60;
        state.v[0x2] = 30;
        // a lit pixel that would be hit if the sprite wrapped
        state.frame_buffer[0][0] = 1;
        run(0xD125, &mut state);

        // only the top two rows of the glyph fit, four columns wide
        assert_eq!(state.frame_buffer[30][60..64], [1, 1, 1, 1]);
        assert_eq!(state.frame_buffer[31][60..64], [1, 0, 0, 1]);
        let lit: usize = state
            .frame_buffer
            .iter()
            .map(|row| row.iter().filter(|&&p| p == 1).count())
            .sum();
        assert_eq!(lit, 6 + 1);
        assert_eq!(state.frame_buffer[0][0], 1);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_dxyn_drw_clips_columns() {
        let mut state = State::new();
        state.memory[0x300] = 0xFF;
        state.i = 0x300;
        state.v[0x1] = 62;
        run(0xD121, &mut state);
        assert_eq!(state.frame_buffer[0][62..64], [1, 1]);
        // nothing wrapped around to the left edge
        assert!(state.frame_buffer[0][..62].iter().all(|&p| p == 0));
        assert!(state.frame_buffer[1].iter().all(|&p| p == 0));
    }

    #[test]
    fn test_dxyn_drw_origin_offscreen() {
        let mut state = State::new();
        state.i = 0x50;
        state.v[0x1] = 0xFF;
        run(0xD125, &mut state);
        assert!(state.frame_buffer.iter().all(|row| row.iter().all(|&p| p == 0)));
        assert_eq!(state.v[0xF], 0x0);
        assert!(state.draw_flag);
    }

    #[test]
    fn test_dxy0_draws_nothing_from_index_zero() {
        let mut state = State::new();
        state.v[0xF] = 0x1;
        state.frame_buffer[0][0] = 1;
        let before = state.frame_buffer;
        assert_eq!(state.i, 0);
        assert_eq!(run(0xD120, &mut state), Flow::Continue);
        assert_eq!(state.v[0xF], 0x0);
        assert_eq!(state.frame_buffer, before);
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn test_dxyn_drw_reads_past_memory() {
        let mut state = State::new();
        state.i = 0xFFE;
        let mut rng = StdRng::seed_from_u64(0x8);
        let result = Instruction::decode(0xD005).execute(&mut state, &[false; 16], &mut rng);
        assert!(matches!(result, Err(Error::MemoryOutOfBounds { .. })));
        assert!(!state.draw_flag);
        assert_eq!(state.pc, 0x200);
    }

    #[test]
    fn test_ex9e_skp_skips() {
        let mut state = State::new();
        let mut pressed_keys = [false; 16];
        pressed_keys[0xE] = true;
        state.v[0x1] = 0xE;
        run_with_keys(0xE19E, &mut state, pressed_keys);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_ex9e_skp_doesntskip() {
        let mut state = State::new();
        run(0xE19E, &mut state);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_exa1_sknp_skips() {
        let mut state = State::new();
        run(0xE1A1, &mut state);
        assert_eq!(state.pc, 0x0204);
    }

    #[test]
    fn test_exa1_sknp_doesntskip() {
        let mut state = State::new();
        let mut pressed_keys = [false; 16];
        pressed_keys[0xE] = true;
        state.v[0x1] = 0xE;
        run_with_keys(0xE1A1, &mut state, pressed_keys);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_fx07_ld() {
        let mut state = State::new();
        state.delay_timer = 0xF;
        run(0xF107, &mut state);
        assert_eq!(state.v[0x1], 0xF);
    }

    #[test]
    fn test_fx0a_waits_without_key() {
        let mut state = State::new();
        for _ in 0..3 {
            assert_eq!(run(0xF10A, &mut state), Flow::Wait);
            assert_eq!(state.pc, 0x0200);
        }
    }

    #[test]
    fn test_fx0a_takes_last_pressed_key() {
        let mut state = State::new();
        let mut pressed_keys = [false; 16];
        pressed_keys[0x3] = true;
        pressed_keys[0xB] = true;
        let flow = run_with_keys(0xF10A, &mut state, pressed_keys);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(state.v[0x1], 0xB);
        assert_eq!(state.pc, 0x0202);
    }

    #[test]
    fn test_fx15_ld() {
        let mut state = State::new();
        state.v[0x1] = 0xF;
        run(0xF115, &mut state);
        assert_eq!(state.delay_timer, 0xF);
    }

    #[test]
    fn test_fx18_ld() {
        let mut state = State::new();
        state.v[0x1] = 0xF;
        run(0xF118, &mut state);
        assert_eq!(state.sound_timer, 0xF);
    }

    #[test]
    fn test_fx1e_add() {
        let mut state = State::new();
        state.i = 0x1;
        state.v[0x1] = 0x1;
        state.v[0xF] = 0x0;
        run(0xF11E, &mut state);
        assert_eq!(state.i, 0x2);
        assert_eq!(state.v[0xF], 0x0);
    }

    #[test]
    fn test_fx29_ld() {
        let mut state = State::new();
        state.v[0x1] = 0x2;
        run(0xF129, &mut state);
        assert_eq!(state.i, 0x50 + 0xA);
        assert_eq!(state.memory[state.i as usize], 0xF0);
    }

    #[test]
    fn test_fx33_ld() {
        let mut state = State::new();
        // 0x7B -> 123
        state.v[0x1] = 0x7B;
        state.i = 0x300;
        run(0xF133, &mut state);
        assert_eq!(state.memory[0x300..0x303], [0x1, 0x2, 0x3]);
    }

    #[test]
    fn test_fx55_ld() {
        let mut state = State::new();
        state.i = 0x300;
        state.v[0x0..0x5].copy_from_slice(&[0x1, 0x2, 0x3, 0x4, 0x5]);
        run(0xF455, &mut state);
        assert_eq!(state.memory[0x300..0x306], [0x1, 0x2, 0x3, 0x4, 0x5, 0x0]);
        assert_eq!(state.i, 0x300);
    }

    #[test]
    fn test_fx55_past_end_of_memory() {
        let mut state = State::new();
        state.i = 0xFFE;
        state.v[0x0..0x3].copy_from_slice(&[0x1, 0x2, 0x3]);
        let mut rng = StdRng::seed_from_u64(0x8);
        let result = Instruction::decode(0xF255).execute(&mut state, &[false; 16], &mut rng);
        assert!(matches!(
            result,
            Err(Error::MemoryOutOfBounds { addr: 0x1000 })
        ));
        assert_eq!(state.memory[0xFFE..], [0x0, 0x0]);
    }

    #[test]
    fn test_fx65_ld() {
        let mut state = State::new();
        state.i = 0x300;
        state.memory[0x300..0x305].copy_from_slice(&[0x1, 0x2, 0x3, 0x4, 0x5]);
        run(0xF465, &mut state);
        assert_eq!(state.v[0x0..0x5], [0x1, 0x2, 0x3, 0x4, 0x5]);
        assert_eq!(state.v[0x5], 0x0);
    }

    proptest! {
        #[test]
        fn load_then_add_doubles(x in 0u8..16, nn in any::<u8>()) {
            let mut state = State::new();
            let x16 = u16::from(x);
            run(0x6000 | x16 << 8 | u16::from(nn), &mut state);
            run(0x7000 | x16 << 8 | u16::from(nn), &mut state);
            prop_assert_eq!(state.v[x as usize], nn.wrapping_add(nn));
            prop_assert_eq!(state.pc, 0x204);
        }

        #[test]
        fn every_opcode_decodes_and_runs(op in any::<u16>(), i in any::<u16>()) {
            let mut state = State::new();
            state.i = i;
            state.sp = 1;
            state.stack[0] = 0x300;
            let memory = state.memory;
            let mut rng = StdRng::seed_from_u64(0x8);
            let instruction = Instruction::decode(op);
            if let Instruction::Unknown(raw) = instruction {
                prop_assert_eq!(raw, op);
            }
            match instruction.execute(&mut state, &[false; 16], &mut rng) {
                Ok(Flow::Continue) => {
                    // only control transfers may land back on the same address
                    let transfer = matches!(
                        instruction,
                        Instruction::Jump { .. }
                            | Instruction::Call { .. }
                            | Instruction::JumpOffset { .. }
                    );
                    prop_assert!(transfer || state.pc != 0x200);
                }
                Ok(Flow::Wait) => {
                    let waits = matches!(instruction, Instruction::WaitKey { .. });
                    prop_assert!(waits);
                    prop_assert_eq!(state.pc, 0x200);
                }
                Err(_) => {
                    prop_assert_eq!(state.pc, 0x200);
                    prop_assert_eq!(state.sp, 1);
                    prop_assert_eq!(&state.memory[..], &memory[..]);
                }
            }
        }
    }
}
