//! A Chip-8 interpreter core.
//!
//! [`MachineState`] holds everything the virtual machine knows and [`Engine::step`] advances it
//! by one cycle. Loading ROM files, drawing the frame buffer, reading the keyboard and playing
//! sound are left to whoever drives the engine.
//!
//! ```
//! use chip8_vm::{Config, Engine, MachineState};
//!
//! // LD V0, 0x2A; JP 0x202
//! let mut state = MachineState::new(&[0x60, 0x2A, 0x12, 0x02]).unwrap();
//! let mut engine = Engine::new(Config::default());
//! for _ in 0..4 {
//!     engine.step(&mut state).unwrap();
//! }
//! assert_eq!(state.v[0], 0x2A);
//! assert_eq!(state.pc, 0x202);
//! ```
pub use config::{Config, SpriteEdges, UnknownOpcodePolicy};
pub use engine::Engine;
pub use error::Fault;
pub use instruction::Instruction;
pub use state::{FrameBuffer, MachineState};

mod config;
pub mod constants;
mod engine;
mod error;
mod instruction;
mod opcode;
mod operations;
mod state;
