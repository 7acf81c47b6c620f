/// Total addressable memory in bytes
pub const MEMORY_SIZE: usize = 4096;

/// ROMs are loaded into memory starting at this address and the pc begins here
pub const PROGRAM_START: u16 = 0x200;

/// The largest program that fits between `PROGRAM_START` and the end of memory
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

pub const REGISTER_COUNT: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const KEY_COUNT: usize = 16;

/// VF doubles as the carry, borrow, shifted bit and collision flag
pub const FLAG_REGISTER: usize = 0xF;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Every instruction is two bytes wide
pub const INSTRUCTION_SIZE: u16 = 0x2;

/// Height in bytes of each built-in hexadecimal glyph
pub const GLYPH_SIZE: u16 = 5;

/// By default the timers decay once per executed step
pub const DEFAULT_STEPS_PER_TIMER_TICK: u8 = 1;

/// # Sprite Sheet
/// Sprites for the hexadecimal digits 0..F, each 8 pixels wide and 5 rows tall.
/// They are stored at 0x000 so that the sprite for digit `k` starts at `k * 5`.
///
/// e.g. the sprite for `0`
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
