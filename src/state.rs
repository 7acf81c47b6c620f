use log::debug;

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, KEY_COUNT, MAX_PROGRAM_SIZE, MEMORY_SIZE, PROGRAM_START,
    REGISTER_COUNT, SPRITE_SHEET, STACK_SIZE,
};
use crate::error::Fault;

/// The FrameBuffer is indexed as [y][x]; `true` is a lit pixel
pub type FrameBuffer = [[bool; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

/// A snapshot of the Chip-8 machine
///
/// ## CPU
/// Registers
/// - (v) 16 primary 8-bit registers (V0..VF)
///     - the first 15 (V0..VE) are general purpose registers
///     - the 16th (VF) is overwritten as a carry/borrow/collision flag
/// - (i) a 16-bit memory address register
///
/// Counter
/// - (pc) a 16-bit program counter pointing at the next instruction
///
/// Pointer
/// - (sp) an 8-bit stack pointer at the most recently pushed return address
///
/// Timers
/// - 2 8-bit timers (delay & sound) that count down to 0
///
/// ## Memory
/// - 16 slot stack of return addresses
///     - a call bumps `sp` before storing, so slot 0 is never written
/// - 4096 bytes of addressable memory
///     - 0x000..0x050 holds the hexadecimal sprite sheet
///     - 0x200.. holds the loaded program
/// - 32x64 frame buffer
///
/// ## Input
/// - pressed status of keys 0..F, written by whoever owns the keyboard
/// - execution parks on `awaiting_key` until one of them is pressed
///
/// ## Output
/// - `redraw_pending` when the last cycle changed the frame buffer
/// - `sound_pending` when the last cycle should beep
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MachineState {
    pub v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: [u16; STACK_SIZE],
    pub memory: [u8; MEMORY_SIZE],
    pub frame_buffer: FrameBuffer,
    pub keypad: [bool; KEY_COUNT],
    pub redraw_pending: bool,
    pub sound_pending: bool,
    pub awaiting_key: Option<u8>,
    pub timer_counter: u8,
}

impl MachineState {
    /// Builds a powered-on machine with `program` loaded at 0x200
    ///
    /// # Arguments
    /// * `program` the raw ROM image, at most 3584 bytes
    pub fn new(program: &[u8]) -> Result<Self, Fault> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(Fault::rom_too_large(program.len()));
        }

        let mut state = MachineState::default();
        let start = PROGRAM_START as usize;
        state.memory[start..start + program.len()].copy_from_slice(program);
        debug!("loaded {} byte program at {:#05X}", program.len(), start);

        Ok(state)
    }

    /// Returns the FrameBuffer if the display should be redrawn
    pub fn pending_frame(&self) -> Option<&FrameBuffer> {
        if self.redraw_pending {
            Some(&self.frame_buffer)
        } else {
            None
        }
    }
}

/// A machine with no program loaded
impl Default for MachineState {
    fn default() -> Self {
        // 0x000 - 0x050 is reserved for the sprite sheet
        let mut memory = [0; MEMORY_SIZE];
        memory[..SPRITE_SHEET.len()].copy_from_slice(&SPRITE_SHEET);

        MachineState {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_SIZE],
            memory,
            frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            keypad: [false; KEY_COUNT],
            redraw_pending: false,
            sound_pending: false,
            awaiting_key: None,
            timer_counter: 0,
        }
    }
}
