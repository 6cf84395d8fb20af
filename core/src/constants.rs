/// Bytes of addressable memory
pub const MEMORY_SIZE: usize = 4096;

/// Where ROMs are loaded into memory and where execution starts
pub const PROGRAM_START: u16 = 0x200;

/// The largest ROM that fits between PROGRAM_START and the end of memory
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Number of V registers; the last one doubles as the flag register
pub const REGISTER_COUNT: usize = 16;
pub const FLAG_REGISTER: usize = 0xF;

/// Maximum depth of nested subroutine calls
pub const STACK_SIZE: usize = 16;

/// Keys on the hexadecimal keypad
pub const KEY_COUNT: usize = 16;

/// Default rate at which the host executes instructions (Hz)
pub const CLOCK_SPEED: u32 = 1000;

/// Rate at which the delay and sound timers count down (Hz)
pub const TIMER_SPEED: u32 = 60;

/// 0x050 - 0x0A0 holds the built-in font
pub const SPRITE_SHEET_START: u16 = 0x050;

/// Height in bytes (rows) of a single font glyph
pub const SPRITE_SIZE: u16 = 5;

/// # Sprite Sheet
/// Hexadecimal digits 0..F, each 4 pixels wide and 5 rows tall.
/// Only the high nibble of each row is drawn.
///
/// ```text
/// 0xF0  ****
/// 0x90  *  *
/// 0x90  *  *
/// 0x90  *  *
/// 0xF0  ****
/// ```
pub const SPRITE_SHEET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
