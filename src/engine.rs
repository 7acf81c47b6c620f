use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Config, UnknownOpcodePolicy};
use crate::constants::{INSTRUCTION_SIZE, MEMORY_SIZE};
use crate::error::Fault;
use crate::instruction::Instruction;
use crate::opcode;
use crate::operations::*;
use crate::state::MachineState;

/// # Engine
/// Interprets Chip-8 programs one cycle at a time.
///
/// Each call to `step`:
/// - clears the `redraw_pending` and `sound_pending` flags
/// - fetches, decodes and executes the instruction at the pc
///     - or, while parked on Fx0A, polls the keypad instead
/// - advances the timers
///
/// The engine never sleeps; whoever calls `step` decides how fast the machine runs.
/// Timers decay once every `Config::steps_per_timer_tick` steps.
pub struct Engine {
    config: Config,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Engine { config, rng }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Advances the machine by a single cycle
    ///
    /// A fault leaves `state` exactly as it was, except an `UnknownOpcode` under
    /// `UnknownOpcodePolicy::Skip`, which steps over the opcode.
    pub fn step(&mut self, state: &mut MachineState) -> Result<(), Fault> {
        if let Some(register) = state.awaiting_key {
            Self::begin_cycle(state);
            keyd(state, register);
            if state.awaiting_key.is_none() {
                debug!("key {:X} stored in V{:X}", state.v[register as usize], register);
            }
            self.advance_timers(state);
            return Ok(());
        }

        let address = state.pc;
        let op = Self::fetch(state)?;
        let instruction = match Instruction::decode(op) {
            Ok(instruction) => instruction,
            Err(fault) => return self.unknown_opcode(state, address, fault),
        };
        trace!(
            "{:03X}: {:04X} {:<16} v{:02X?} i{:04X}",
            address,
            op,
            instruction.to_string(),
            state.v,
            state.i
        );

        let flags = (state.redraw_pending, state.sound_pending);
        Self::begin_cycle(state);
        if let Err(fault) = self.execute(instruction, state) {
            // operations fault before mutating; put back what begin_cycle cleared
            state.redraw_pending = flags.0;
            state.sound_pending = flags.1;
            return Err(fault);
        }
        if let Some(register) = state.awaiting_key {
            debug!("{:03X}: waiting for a key for V{:X}", address, register);
        }
        self.advance_timers(state);
        Ok(())
    }

    /// Gets the opcode currently pointed at by the pc.
    /// Memory is stored as bytes, but opcodes are 16 bits so we combine two subsequent bytes.
    fn fetch(state: &MachineState) -> Result<u16, Fault> {
        let pc = state.pc as usize;
        if pc + 1 >= MEMORY_SIZE {
            return Err(Fault::OutOfBounds { address: pc + 1 });
        }
        Ok(opcode::from_bytes(state.memory[pc], state.memory[pc + 1]))
    }

    fn begin_cycle(state: &mut MachineState) {
        state.redraw_pending = false;
        state.sound_pending = false;
    }

    fn unknown_opcode(
        &self,
        state: &mut MachineState,
        address: u16,
        fault: Fault,
    ) -> Result<(), Fault> {
        warn!("{:03X}: {}", address, fault);
        if self.config.unknown_opcode == UnknownOpcodePolicy::Skip {
            Self::begin_cycle(state);
            state.pc = state.pc.wrapping_add(INSTRUCTION_SIZE);
            self.advance_timers(state);
        }
        Err(fault)
    }

    /// Dispatches a decoded instruction to its operation
    fn execute(&mut self, instruction: Instruction, state: &mut MachineState) -> Result<(), Fault> {
        use Instruction::*;
        match instruction {
            Clear => clr(state),
            Return => rts(state)?,
            Jump(nnn) => jump(state, nnn),
            Call(nnn) => call(state, nnn)?,
            SkipIfEqual { x, nn } => ske(state, x, nn),
            SkipIfNotEqual { x, nn } => skne(state, x, nn),
            SkipIfRegistersEqual { x, y } => skre(state, x, y),
            Load { x, nn } => load(state, x, nn),
            Add { x, nn } => add(state, x, nn),
            Move { x, y } => mv(state, x, y),
            Or { x, y } => or(state, x, y),
            And { x, y } => and(state, x, y),
            Xor { x, y } => xor(state, x, y),
            AddRegisters { x, y } => addr(state, x, y),
            Sub { x, y } => sub(state, x, y),
            ShiftRight { x, .. } => shr(state, x),
            SubN { x, y } => subn(state, x, y),
            ShiftLeft { x, .. } => shl(state, x),
            SkipIfRegistersNotEqual { x, y } => skrne(state, x, y),
            LoadIndex(nnn) => loadi(state, nnn),
            JumpOffset(nnn) => jumpi(state, nnn),
            Random { x, nn } => rnd(state, x, nn, self.rng.gen()),
            Draw { x, y, n } => draw(state, x, y, n, self.config.sprite_edges)?,
            SkipIfPressed { x } => skpr(state, x),
            SkipIfNotPressed { x } => skup(state, x),
            LoadDelay { x } => moved(state, x),
            WaitKey { x } => keyd(state, x),
            SetDelay { x } => loads(state, x),
            SetSound { x } => ld(state, x),
            AddIndex { x } => addi(state, x),
            LoadGlyph { x } => ldspr(state, x),
            StoreBcd { x } => bcd(state, x)?,
            StoreRegisters { x } => stor(state, x)?,
            LoadRegisters { x } => read(state, x)?,
        }
        Ok(())
    }

    /// Handles the step counter and timers
    /// - counts steps down to the next timer tick
    /// - flags a beep while the sound timer is running
    /// - decrements both timers on the tick
    fn advance_timers(&self, state: &mut MachineState) {
        if state.sound_timer > 0 {
            state.sound_pending = true;
        }

        if state.timer_counter > 1 {
            state.timer_counter -= 1;
            return;
        }
        state.timer_counter = self.config.steps_per_timer_tick;

        if state.delay_timer > 0 {
            state.delay_timer -= 1;
        }

        if state.sound_timer > 0 {
            state.sound_timer -= 1;
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpriteEdges;

    fn engine() -> Engine {
        Engine::new(Config::default().with_rng_seed(0x8))
    }

    fn machine(program: &[u8]) -> MachineState {
        MachineState::new(program).unwrap()
    }

    #[test]
    fn test_steps_through_program() {
        // LD V0, 0x05; ADD V0, 0x03; LD V1, V0
        let mut state = machine(&[0x60, 0x05, 0x70, 0x03, 0x81, 0x00]);
        let mut engine = engine();
        for _ in 0..3 {
            engine.step(&mut state).unwrap();
        }
        assert_eq!(state.v[0x0], 0x08);
        assert_eq!(state.v[0x1], 0x08);
        assert_eq!(state.pc, 0x206);
    }

    #[test]
    fn test_fetch_past_end_of_memory() {
        let mut state = machine(&[]);
        state.pc = 0xFFF;
        let before = state;
        assert_eq!(engine().step(&mut state), Err(Fault::OutOfBounds { address: 0x1000 }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_fetches_last_instruction_in_memory() {
        let mut state = machine(&[]);
        state.memory[0xFFE..].copy_from_slice(&[0x61, 0x01]);
        state.pc = 0xFFE;
        engine().step(&mut state).unwrap();
        assert_eq!(state.v[0x1], 0x01);
        assert_eq!(state.pc, 0x1000);
    }

    #[test]
    fn test_call_then_return() {
        // 200: CALL 0x206; 202: LD V0, 1; 204: JP 0x204; 206: RET
        let mut state = machine(&[0x22, 0x06, 0x60, 0x01, 0x12, 0x04, 0x00, 0xEE]);
        let mut engine = engine();
        engine.step(&mut state).unwrap();
        assert_eq!(state.pc, 0x206);
        assert_eq!(state.sp, 1);
        engine.step(&mut state).unwrap();
        assert_eq!(state.pc, 0x202);
        assert_eq!(state.sp, 0);
        engine.step(&mut state).unwrap();
        assert_eq!(state.v[0x0], 0x01);
    }

    #[test]
    fn test_nested_calls_overflow() {
        // 200: CALL 0x200 forever
        let mut state = machine(&[0x22, 0x00]);
        let mut engine = engine();
        for _ in 0..15 {
            engine.step(&mut state).unwrap();
        }
        assert_eq!(engine.step(&mut state), Err(Fault::StackOverflow));
    }

    #[test]
    fn test_return_with_empty_stack() {
        let mut state = machine(&[0x00, 0xEE]);
        assert_eq!(engine().step(&mut state), Err(Fault::StackUnderflow));
    }

    #[test]
    fn test_skip_advances_by_four() {
        // SE V0, 0x00 with V0 = 0
        let mut state = machine(&[0x30, 0x00]);
        engine().step(&mut state).unwrap();
        assert_eq!(state.pc, 0x204);
    }

    #[test]
    fn test_flags_cleared_each_cycle() {
        // CLS; LD V0, 1
        let mut state = machine(&[0x00, 0xE0, 0x60, 0x01]);
        let mut engine = engine();
        engine.step(&mut state).unwrap();
        assert!(state.redraw_pending);
        assert!(state.pending_frame().is_some());
        engine.step(&mut state).unwrap();
        assert!(!state.redraw_pending);
        assert!(state.pending_frame().is_none());
    }

    #[test]
    fn test_draws_glyph_zero() {
        // LD V0, 0; LD F, V0; DRW V0, V0, 5; DRW V0, V0, 5
        let mut state = machine(&[0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05, 0xD0, 0x05]);
        let mut engine = engine();
        for _ in 0..3 {
            engine.step(&mut state).unwrap();
        }
        assert_eq!(state.i, 0x0);
        assert_eq!(state.frame_buffer[0][0..4], [true, true, true, true]);
        assert_eq!(state.frame_buffer[2][0..4], [true, false, false, true]);
        assert_eq!(state.v[0xF], 0x0);
        assert!(state.redraw_pending);

        engine.step(&mut state).unwrap();
        assert!(state.frame_buffer.iter().flatten().all(|&p| !p));
        assert_eq!(state.v[0xF], 0x1);
    }

    #[test]
    fn test_clip_config_reaches_draw() {
        // LD V0, 0x3F; DRW V0, V1, 1
        let mut state = machine(&[0x60, 0x3F, 0xD0, 0x11]);
        let mut engine = Engine::new(Config::default().with_sprite_edges(SpriteEdges::Clip));
        assert_eq!(engine.config().sprite_edges, SpriteEdges::Clip);
        engine.step(&mut state).unwrap();
        engine.step(&mut state).unwrap();
        assert!(state.frame_buffer[0][63]);
        assert!(!state.frame_buffer[0][0]);
    }

    #[test]
    fn test_random_with_zero_mask() {
        // RND V3, 0x00
        let mut engine = Engine::default();
        for _ in 0..32 {
            let mut state = machine(&[0xC3, 0x00]);
            state.v[0x3] = 0xAA;
            engine.step(&mut state).unwrap();
            assert_eq!(state.v[0x3], 0x00);
        }
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let program = [0xC0, 0xFF, 0xC1, 0xFF, 0xC2, 0xFF];
        let run = || {
            let mut state = machine(&program);
            let mut engine = Engine::new(Config::default().with_rng_seed(1234));
            for _ in 0..3 {
                engine.step(&mut state).unwrap();
            }
            state.v
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_unknown_opcode_stalls() {
        let mut state = machine(&[0xFF, 0xFF]);
        state.delay_timer = 0x5;
        state.redraw_pending = true;
        let before = state;
        assert_eq!(engine().step(&mut state), Err(Fault::UnknownOpcode(0xFFFF)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_unknown_opcode_skips() {
        let mut state = machine(&[0x01, 0x23, 0x60, 0x07]);
        state.delay_timer = 0x5;
        let mut engine =
            Engine::new(Config::default().with_unknown_opcode(UnknownOpcodePolicy::Skip));
        assert_eq!(engine.step(&mut state), Err(Fault::UnknownOpcode(0x0123)));
        assert_eq!(state.pc, 0x202);
        assert_eq!(state.delay_timer, 0x4);
        engine.step(&mut state).unwrap();
        assert_eq!(state.v[0x0], 0x07);
    }

    #[test]
    fn test_waits_for_key() {
        // LD V5, K; LD V6, 1
        let mut state = machine(&[0xF5, 0x0A, 0x66, 0x01]);
        let mut engine = engine();

        engine.step(&mut state).unwrap();
        assert_eq!(state.awaiting_key, Some(0x5));
        assert_eq!(state.pc, 0x200);

        // nothing pressed; still parked
        engine.step(&mut state).unwrap();
        assert_eq!(state.awaiting_key, Some(0x5));
        assert_eq!(state.pc, 0x200);

        state.keypad[0xB] = true;
        engine.step(&mut state).unwrap();
        assert_eq!(state.awaiting_key, None);
        assert_eq!(state.v[0x5], 0xB);
        assert_eq!(state.pc, 0x202);

        engine.step(&mut state).unwrap();
        assert_eq!(state.v[0x6], 0x01);
    }

    #[test]
    fn test_key_already_held_does_not_park() {
        let mut state = machine(&[0xF5, 0x0A]);
        state.keypad[0x2] = true;
        engine().step(&mut state).unwrap();
        assert_eq!(state.awaiting_key, None);
        assert_eq!(state.v[0x5], 0x2);
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn test_timers_run_while_waiting_for_key() {
        let mut state = machine(&[0xF0, 0x0A]);
        state.delay_timer = 0x3;
        state.sound_timer = 0x3;
        let mut engine = engine();
        engine.step(&mut state).unwrap();
        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x1);
        assert_eq!(state.sound_timer, 0x1);
        assert!(state.sound_pending);
    }

    #[test]
    fn test_timers_decrement_each_step() {
        // LD V0, 3; LD DT, V0; LD ST, V0; JP 0x206
        let mut state = machine(&[0x60, 0x03, 0xF0, 0x15, 0xF0, 0x18, 0x12, 0x06]);
        let mut engine = engine();
        engine.step(&mut state).unwrap();
        engine.step(&mut state).unwrap();
        // set to 3 then ticked
        assert_eq!(state.delay_timer, 0x2);
        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x1);
        assert_eq!(state.sound_timer, 0x2);
        assert!(state.sound_pending);

        engine.step(&mut state).unwrap();
        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x0);
        assert_eq!(state.sound_timer, 0x0);
        assert!(state.sound_pending);

        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x0);
        assert!(!state.sound_pending);
    }

    #[test]
    fn test_timers_decay_at_configured_cadence() {
        // JP 0x200
        let mut state = machine(&[0x12, 0x00]);
        state.delay_timer = 0x2;
        let mut engine = Engine::new(Config::default().with_steps_per_timer_tick(4));

        // first step ticks and arms the counter
        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x1);
        for _ in 0..3 {
            engine.step(&mut state).unwrap();
            assert_eq!(state.delay_timer, 0x1);
        }
        engine.step(&mut state).unwrap();
        assert_eq!(state.delay_timer, 0x0);
    }

    #[test]
    fn test_zero_cadence_ticks_every_step() {
        // JP 0x200
        let mut state = machine(&[0x12, 0x00]);
        state.delay_timer = 0x3;
        let mut engine = Engine::new(Config::default().with_steps_per_timer_tick(0));
        for expected in &[0x2, 0x1, 0x0] {
            engine.step(&mut state).unwrap();
            assert_eq!(state.delay_timer, *expected);
        }
    }

    #[test]
    fn test_sound_pending_between_timer_ticks() {
        // JP 0x200
        let mut state = machine(&[0x12, 0x00]);
        state.sound_timer = 0x2;
        let mut engine = Engine::new(Config::default().with_steps_per_timer_tick(4));

        engine.step(&mut state).unwrap();
        assert_eq!(state.sound_timer, 0x1);
        assert!(state.sound_pending);
        for _ in 0..3 {
            engine.step(&mut state).unwrap();
            assert_eq!(state.sound_timer, 0x1);
            assert!(state.sound_pending);
        }

        // last tick still beeps, then silence
        engine.step(&mut state).unwrap();
        assert_eq!(state.sound_timer, 0x0);
        assert!(state.sound_pending);
        engine.step(&mut state).unwrap();
        assert!(!state.sound_pending);
    }

    #[test]
    fn test_faulting_instruction_keeps_flags() {
        // CLS; LD I, 0xFFE; LD B, V0
        let mut state = machine(&[0x00, 0xE0, 0xAF, 0xFE, 0xF0, 0x33]);
        let mut engine = engine();
        engine.step(&mut state).unwrap();
        engine.step(&mut state).unwrap();
        state.redraw_pending = true;
        state.sound_pending = true;
        let before = state;
        assert_eq!(engine.step(&mut state), Err(Fault::OutOfBounds { address: 0x1000 }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_load_delay_reads_before_tick() {
        // LD V0, DT
        let mut state = machine(&[0xF0, 0x07]);
        state.delay_timer = 0x9;
        engine().step(&mut state).unwrap();
        assert_eq!(state.v[0x0], 0x9);
        assert_eq!(state.delay_timer, 0x8);
    }
}
