use std::ops::Range;

use crate::config::SpriteEdges;
use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FLAG_REGISTER, GLYPH_SIZE, INSTRUCTION_SIZE, MEMORY_SIZE,
    STACK_SIZE,
};
use crate::error::Fault;
use crate::state::MachineState;

/// pc += 2
fn next(state: &mut MachineState) {
    state.pc = state.pc.wrapping_add(INSTRUCTION_SIZE);
}

/// pc += 4 if the condition holds, otherwise pc += 2
fn skip_if(state: &mut MachineState, condition: bool) {
    if condition {
        next(state);
    }
    next(state);
}

/// The memory addresses I..I+len, if they all exist
fn memory_range(i: u16, len: usize) -> Result<Range<usize>, Fault> {
    let start = i as usize;
    let end = start + len;
    if end > MEMORY_SIZE {
        return Err(Fault::OutOfBounds {
            address: start.max(MEMORY_SIZE),
        });
    }
    Ok(start..end)
}

/// Keys only go up to F so the register's upper nibble is ignored
fn key_index(state: &MachineState, x: u8) -> usize {
    (state.v[x as usize] & 0xF) as usize
}

/// The lowest numbered key that is currently held down
pub fn pressed_key(keypad: &[bool]) -> Option<u8> {
    keypad.iter().position(|&pressed| pressed).map(|key| key as u8)
}

/// clear
pub fn clr(state: &mut MachineState) {
    state.frame_buffer = [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    state.redraw_pending = true;
    next(state);
}

/// PC = STACK.pop()
/// The stored address is the call itself so execution resumes after it
pub fn rts(state: &mut MachineState) -> Result<(), Fault> {
    if state.sp == 0 {
        return Err(Fault::StackUnderflow);
    }
    state.pc = state.stack[state.sp as usize];
    state.sp -= 1;
    next(state);
    Ok(())
}

/// PC = addr
pub fn jump(state: &mut MachineState, nnn: u16) {
    state.pc = nnn;
}

/// STACK.push(PC); PC = addr
pub fn call(state: &mut MachineState, nnn: u16) -> Result<(), Fault> {
    if state.sp as usize + 1 >= STACK_SIZE {
        return Err(Fault::StackOverflow);
    }
    state.sp += 1;
    state.stack[state.sp as usize] = state.pc;
    state.pc = nnn;
    Ok(())
}

/// if Vx == nn then pc += 2
pub fn ske(state: &mut MachineState, x: u8, nn: u8) {
    let condition = state.v[x as usize] == nn;
    skip_if(state, condition);
}

/// if Vx != nn then pc += 2
pub fn skne(state: &mut MachineState, x: u8, nn: u8) {
    let condition = state.v[x as usize] != nn;
    skip_if(state, condition);
}

/// if Vx == Vy then pc += 2
pub fn skre(state: &mut MachineState, x: u8, y: u8) {
    let condition = state.v[x as usize] == state.v[y as usize];
    skip_if(state, condition);
}

/// Vx = nn
pub fn load(state: &mut MachineState, x: u8, nn: u8) {
    state.v[x as usize] = nn;
    next(state);
}

/// Vx += nn
/// Overflow is dropped and VF is left alone
pub fn add(state: &mut MachineState, x: u8, nn: u8) {
    state.v[x as usize] = state.v[x as usize].wrapping_add(nn);
    next(state);
}

/// Vx = Vy
pub fn mv(state: &mut MachineState, x: u8, y: u8) {
    state.v[x as usize] = state.v[y as usize];
    next(state);
}

/// Vx |= Vy
pub fn or(state: &mut MachineState, x: u8, y: u8) {
    state.v[x as usize] |= state.v[y as usize];
    next(state);
}

/// Vx &= Vy
pub fn and(state: &mut MachineState, x: u8, y: u8) {
    state.v[x as usize] &= state.v[y as usize];
    next(state);
}

/// Vx ^= Vy
pub fn xor(state: &mut MachineState, x: u8, y: u8) {
    state.v[x as usize] ^= state.v[y as usize];
    next(state);
}

// The 8xy4..8xyE family writes VF before Vx, so with x = F the result wins.

/// VF = carry; Vx += Vy
pub fn addr(state: &mut MachineState, x: u8, y: u8) {
    let (x, y) = (x as usize, y as usize);
    let carry = u16::from(state.v[x]) + u16::from(state.v[y]) > 0xFF;
    state.v[FLAG_REGISTER] = u8::from(carry);
    state.v[x] = state.v[x].wrapping_add(state.v[y]);
    next(state);
}

/// VF = Vx > Vy; Vx -= Vy
pub fn sub(state: &mut MachineState, x: u8, y: u8) {
    let (x, y) = (x as usize, y as usize);
    state.v[FLAG_REGISTER] = u8::from(state.v[x] > state.v[y]);
    state.v[x] = state.v[x].wrapping_sub(state.v[y]);
    next(state);
}

/// VF = lsb(Vx); Vx >>= 1
pub fn shr(state: &mut MachineState, x: u8) {
    let x = x as usize;
    state.v[FLAG_REGISTER] = state.v[x] & 0x1;
    state.v[x] >>= 1;
    next(state);
}

/// VF = Vy > Vx; Vx = Vy - Vx
pub fn subn(state: &mut MachineState, x: u8, y: u8) {
    let (x, y) = (x as usize, y as usize);
    state.v[FLAG_REGISTER] = u8::from(state.v[y] > state.v[x]);
    state.v[x] = state.v[y].wrapping_sub(state.v[x]);
    next(state);
}

/// VF = msb(Vx); Vx <<= 1
pub fn shl(state: &mut MachineState, x: u8) {
    let x = x as usize;
    state.v[FLAG_REGISTER] = (state.v[x] >> 7) & 0x1;
    state.v[x] <<= 1;
    next(state);
}

/// if Vx != Vy then pc += 2
pub fn skrne(state: &mut MachineState, x: u8, y: u8) {
    let condition = state.v[x as usize] != state.v[y as usize];
    skip_if(state, condition);
}

/// I = addr
pub fn loadi(state: &mut MachineState, nnn: u16) {
    state.i = nnn;
    next(state);
}

/// PC = V0 + addr
pub fn jumpi(state: &mut MachineState, nnn: u16) {
    state.pc = nnn.wrapping_add(u16::from(state.v[0x0]));
}

/// Vx = random_byte & nn
pub fn rnd(state: &mut MachineState, x: u8, nn: u8, random_byte: u8) {
    state.v[x as usize] = random_byte & nn;
    next(state);
}

/// Where a sprite pixel `offset` away from `origin` lands on an axis of `size` pixels
fn place(edges: SpriteEdges, origin: usize, offset: usize, size: usize) -> Option<usize> {
    match edges {
        SpriteEdges::Wrap => Some((origin + offset) % size),
        SpriteEdges::Clip => Some(origin % size + offset).filter(|&position| position < size),
    }
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs an 8 pixel wide sprite from memory I..I+n at position Vx, Vy on the FrameBuffer.
/// Sets VF if any pixels are erased
pub fn draw(
    state: &mut MachineState,
    x: u8,
    y: u8,
    n: u8,
    edges: SpriteEdges,
) -> Result<(), Fault> {
    let rows = memory_range(state.i, n as usize)?;
    let origin_x = state.v[x as usize] as usize;
    let origin_y = state.v[y as usize] as usize;

    // Reset the flag register (used for collision detection)
    state.v[FLAG_REGISTER] = 0x0;

    for (row, address) in rows.enumerate() {
        let sprite = state.memory[address];
        let py = match place(edges, origin_y, row, DISPLAY_HEIGHT) {
            Some(py) => py,
            None => continue,
        };
        for bit in 0..8 {
            if sprite & (0x80 >> bit) == 0 {
                continue;
            }
            if let Some(px) = place(edges, origin_x, bit, DISPLAY_WIDTH) {
                let pixel = &mut state.frame_buffer[py][px];
                if *pixel {
                    state.v[FLAG_REGISTER] = 0x1;
                }
                *pixel = !*pixel;
            }
        }
    }

    state.redraw_pending = true;
    next(state);
    Ok(())
}

/// if Vx.pressed then pc += 2
pub fn skpr(state: &mut MachineState, x: u8) {
    let condition = state.keypad[key_index(state, x)];
    skip_if(state, condition);
}

/// if !Vx.pressed then pc += 2
pub fn skup(state: &mut MachineState, x: u8) {
    let condition = !state.keypad[key_index(state, x)];
    skip_if(state, condition);
}

/// Vx = DT
pub fn moved(state: &mut MachineState, x: u8) {
    state.v[x as usize] = state.delay_timer;
    next(state);
}

/// await keypress for Vx
/// Parks the machine on `awaiting_key` without moving the pc until some key is held.
pub fn keyd(state: &mut MachineState, x: u8) {
    match pressed_key(&state.keypad) {
        Some(key) => {
            state.v[x as usize] = key;
            state.awaiting_key = None;
            next(state);
        }
        None => state.awaiting_key = Some(x),
    }
}

/// DT = Vx
pub fn loads(state: &mut MachineState, x: u8) {
    state.delay_timer = state.v[x as usize];
    next(state);
}

/// ST = Vx
pub fn ld(state: &mut MachineState, x: u8) {
    state.sound_timer = state.v[x as usize];
    next(state);
}

/// I += Vx
pub fn addi(state: &mut MachineState, x: u8) {
    state.i = state.i.wrapping_add(u16::from(state.v[x as usize]));
    next(state);
}

/// I = Vx * 5
/// Set I to the memory address of the sprite for Vx
/// See constants::SPRITE_SHEET for more details
pub fn ldspr(state: &mut MachineState, x: u8) {
    state.i = u16::from(state.v[x as usize]) * GLYPH_SIZE;
    next(state);
}

/// mem[I..I+3] = bcd(Vx)
/// Store BCD repr of Vx in memory starting at address i
pub fn bcd(state: &mut MachineState, x: u8) -> Result<(), Fault> {
    let range = memory_range(state.i, 3)?;
    let value = state.v[x as usize];
    state.memory[range].copy_from_slice(&[value / 100, value / 10 % 10, value % 10]);
    next(state);
    Ok(())
}

/// mem[I..=I+x] = V0..=Vx
pub fn stor(state: &mut MachineState, x: u8) -> Result<(), Fault> {
    let x = x as usize;
    let range = memory_range(state.i, x + 1)?;
    state.memory[range].copy_from_slice(&state.v[..=x]);
    next(state);
    Ok(())
}

/// V0..=Vx = mem[I..=I+x]
pub fn read(state: &mut MachineState, x: u8) -> Result<(), Fault> {
    let x = x as usize;
    let range = memory_range(state.i, x + 1)?;
    state.v[..=x].copy_from_slice(&state.memory[range]);
    next(state);
    Ok(())
}
