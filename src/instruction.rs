use std::fmt;

use crate::error::Fault;
use crate::opcode::Fields;

/// A decoded Chip-8 instruction along with its operands
///
/// `x` and `y` are register indices, `nn` is an immediate byte, `n` an immediate nibble
/// and addresses are the 12-bit `nnn` field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Clear,
    /// 00EE
    Return,
    /// 1nnn
    Jump(u16),
    /// 2nnn
    Call(u16),
    /// 3xnn
    SkipIfEqual { x: u8, nn: u8 },
    /// 4xnn
    SkipIfNotEqual { x: u8, nn: u8 },
    /// 5xy0
    SkipIfRegistersEqual { x: u8, y: u8 },
    /// 6xnn
    Load { x: u8, nn: u8 },
    /// 7xnn
    Add { x: u8, nn: u8 },
    /// 8xy0
    Move { x: u8, y: u8 },
    /// 8xy1
    Or { x: u8, y: u8 },
    /// 8xy2
    And { x: u8, y: u8 },
    /// 8xy3
    Xor { x: u8, y: u8 },
    /// 8xy4
    AddRegisters { x: u8, y: u8 },
    /// 8xy5
    Sub { x: u8, y: u8 },
    /// 8xy6
    ShiftRight { x: u8, y: u8 },
    /// 8xy7
    SubN { x: u8, y: u8 },
    /// 8xyE
    ShiftLeft { x: u8, y: u8 },
    /// 9xy0
    SkipIfRegistersNotEqual { x: u8, y: u8 },
    /// Annn
    LoadIndex(u16),
    /// Bnnn
    JumpOffset(u16),
    /// Cxnn
    Random { x: u8, nn: u8 },
    /// Dxyn
    Draw { x: u8, y: u8, n: u8 },
    /// Ex9E
    SkipIfPressed { x: u8 },
    /// ExA1
    SkipIfNotPressed { x: u8 },
    /// Fx07
    LoadDelay { x: u8 },
    /// Fx0A
    WaitKey { x: u8 },
    /// Fx15
    SetDelay { x: u8 },
    /// Fx18
    SetSound { x: u8 },
    /// Fx1E
    AddIndex { x: u8 },
    /// Fx29
    LoadGlyph { x: u8 },
    /// Fx33
    StoreBcd { x: u8 },
    /// Fx55
    StoreRegisters { x: u8 },
    /// Fx65
    LoadRegisters { x: u8 },
}

impl Instruction {
    /// Selects the correct Instruction for a given Opcode
    pub fn decode(op: u16) -> Result<Self, Fault> {
        let fields = Fields::from(op);
        let Fields { x, y, n, nn, nnn, .. } = fields;
        let instruction = match fields.nibbles() {
            (0x0, 0x0, 0xE, 0x0) => Instruction::Clear,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Return,
            (0x1, ..) => Instruction::Jump(nnn),
            (0x2, ..) => Instruction::Call(nnn),
            (0x3, ..) => Instruction::SkipIfEqual { x, nn },
            (0x4, ..) => Instruction::SkipIfNotEqual { x, nn },
            (0x5, .., 0x0) => Instruction::SkipIfRegistersEqual { x, y },
            (0x6, ..) => Instruction::Load { x, nn },
            (0x7, ..) => Instruction::Add { x, nn },
            (0x8, .., 0x0) => Instruction::Move { x, y },
            (0x8, .., 0x1) => Instruction::Or { x, y },
            (0x8, .., 0x2) => Instruction::And { x, y },
            (0x8, .., 0x3) => Instruction::Xor { x, y },
            (0x8, .., 0x4) => Instruction::AddRegisters { x, y },
            (0x8, .., 0x5) => Instruction::Sub { x, y },
            (0x8, .., 0x6) => Instruction::ShiftRight { x, y },
            (0x8, .., 0x7) => Instruction::SubN { x, y },
            (0x8, .., 0xE) => Instruction::ShiftLeft { x, y },
            (0x9, .., 0x0) => Instruction::SkipIfRegistersNotEqual { x, y },
            (0xA, ..) => Instruction::LoadIndex(nnn),
            (0xB, ..) => Instruction::JumpOffset(nnn),
            (0xC, ..) => Instruction::Random { x, nn },
            (0xD, ..) => Instruction::Draw { x, y, n },
            (0xE, .., 0x9, 0xE) => Instruction::SkipIfPressed { x },
            (0xE, .., 0xA, 0x1) => Instruction::SkipIfNotPressed { x },
            (0xF, .., 0x0, 0x7) => Instruction::LoadDelay { x },
            (0xF, .., 0x0, 0xA) => Instruction::WaitKey { x },
            (0xF, .., 0x1, 0x5) => Instruction::SetDelay { x },
            (0xF, .., 0x1, 0x8) => Instruction::SetSound { x },
            (0xF, .., 0x1, 0xE) => Instruction::AddIndex { x },
            (0xF, .., 0x2, 0x9) => Instruction::LoadGlyph { x },
            (0xF, .., 0x3, 0x3) => Instruction::StoreBcd { x },
            (0xF, .., 0x5, 0x5) => Instruction::StoreRegisters { x },
            (0xF, .., 0x6, 0x5) => Instruction::LoadRegisters { x },
            _ => return Err(Fault::UnknownOpcode(op)),
        };
        Ok(instruction)
    }
}

/// Formats the instruction as assembly, e.g. `DRW V0, V1, 5`
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Clear => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Jump(nnn) => write!(f, "JP {:#05X}", nnn),
            Call(nnn) => write!(f, "CALL {:#05X}", nnn),
            SkipIfEqual { x, nn } => write!(f, "SE V{:X}, {:#04X}", x, nn),
            SkipIfNotEqual { x, nn } => write!(f, "SNE V{:X}, {:#04X}", x, nn),
            SkipIfRegistersEqual { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            Load { x, nn } => write!(f, "LD V{:X}, {:#04X}", x, nn),
            Add { x, nn } => write!(f, "ADD V{:X}, {:#04X}", x, nn),
            Move { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddRegisters { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            ShiftRight { x, y } => write!(f, "SHR V{:X}, V{:X}", x, y),
            SubN { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            ShiftLeft { x, y } => write!(f, "SHL V{:X}, V{:X}", x, y),
            SkipIfRegistersNotEqual { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            LoadIndex(nnn) => write!(f, "LD I, {:#05X}", nnn),
            JumpOffset(nnn) => write!(f, "JP V0, {:#05X}", nnn),
            Random { x, nn } => write!(f, "RND V{:X}, {:#04X}", x, nn),
            Draw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            SkipIfPressed { x } => write!(f, "SKP V{:X}", x),
            SkipIfNotPressed { x } => write!(f, "SKNP V{:X}", x),
            LoadDelay { x } => write!(f, "LD V{:X}, DT", x),
            WaitKey { x } => write!(f, "LD V{:X}, K", x),
            SetDelay { x } => write!(f, "LD DT, V{:X}", x),
            SetSound { x } => write!(f, "LD ST, V{:X}", x),
            AddIndex { x } => write!(f, "ADD I, V{:X}", x),
            LoadGlyph { x } => write!(f, "LD F, V{:X}", x),
            StoreBcd { x } => write!(f, "LD B, V{:X}", x),
            StoreRegisters { x } => write!(f, "LD [I], V{:X}", x),
            LoadRegisters { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
