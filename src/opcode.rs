/// # Opcode fields
///
/// A Chip-8 opcode is 16 bits, `[kxyn]`, read big-endian out of memory.
/// `k` picks the instruction family; `n` or `nn` narrows it down for the 0, 5, 8, 9, E and F
/// families. The remaining fields are operands: `x`/`y` name registers, `nn` is an immediate
/// and `nnn` is an address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fields {
    pub kind: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nn: u8,
    pub nnn: u16,
}

impl Fields {
    /// Splits the two bytes at the pc into fields
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Fields {
            kind: high >> 4,
            x: high & 0xF,
            y: low >> 4,
            n: low & 0xF,
            nn: low,
            nnn: u16::from(high & 0xF) << 8 | u16::from(low),
        }
    }

    /// `(k, x, y, n)`, the shape `Instruction::decode` matches on
    pub fn nibbles(&self) -> (u8, u8, u8, u8) {
        (self.kind, self.x, self.y, self.n)
    }
}

impl From<u16> for Fields {
    fn from(op: u16) -> Self {
        let [high, low] = op.to_be_bytes();
        Fields::from_bytes(high, low)
    }
}

/// Combines the two bytes of an instruction into its opcode
pub fn from_bytes(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}
