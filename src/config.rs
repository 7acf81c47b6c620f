use crate::constants::DEFAULT_STEPS_PER_TIMER_TICK;

/// What the engine does with an opcode it can't decode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnknownOpcodePolicy {
    /// Leave the machine untouched; the same opcode is fetched again next step
    Stall,
    /// Step over the opcode as if it were a no-op (timers still tick)
    Skip,
}

/// How sprites that cross the edge of the display are drawn
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpriteEdges {
    /// Pixels past an edge reappear on the opposite side
    Wrap,
    /// Pixels past an edge are dropped; only the origin is wrapped onto the screen
    Clip,
}

/// Engine configuration
///
/// ```
/// use chip8_vm::{Config, SpriteEdges};
///
/// let config = Config::default()
///     .with_sprite_edges(SpriteEdges::Clip)
///     .with_rng_seed(8);
/// assert_eq!(config.rng_seed, Some(8));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub unknown_opcode: UnknownOpcodePolicy,
    pub sprite_edges: SpriteEdges,
    /// Number of steps between timer decrements; 0 is treated as 1
    pub steps_per_timer_tick: u8,
    /// Seed for the generator behind Cxnn; seeded from entropy when `None`
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn with_unknown_opcode(mut self, policy: UnknownOpcodePolicy) -> Self {
        self.unknown_opcode = policy;
        self
    }

    pub fn with_sprite_edges(mut self, edges: SpriteEdges) -> Self {
        self.sprite_edges = edges;
        self
    }

    /// Decouple the timers from the step rate.
    ///
    /// e.g. a driver stepping at 480Hz gets 60Hz timers with `8`
    pub fn with_steps_per_timer_tick(mut self, steps: u8) -> Self {
        self.steps_per_timer_tick = steps;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            unknown_opcode: UnknownOpcodePolicy::Stall,
            sprite_edges: SpriteEdges::Wrap,
            steps_per_timer_tick: DEFAULT_STEPS_PER_TIMER_TICK,
            rng_seed: None,
        }
    }
}
