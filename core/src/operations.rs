use rand::Rng;

use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, SPRITE_SHEET_START, SPRITE_SIZE};
use crate::error::Result;
use crate::state::{FrameBuffer, State};

/// Pressed status of the keys 0..F
pub type Keypad = [bool; 16];

fn next(state: &mut State) {
    state.pc += 0x2;
}

fn skip_if(state: &mut State, condition: bool) {
    state.pc += if condition { 0x4 } else { 0x2 };
}

/// clear
pub fn clr(state: &mut State) {
    state.frame_buffer = [[0; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    state.draw_flag = true;
    next(state);
}

/// PC = STACK.pop()
/// The pushed address already points past the call.
pub fn rts(state: &mut State) -> Result<()> {
    state.pc = state.pop()?;
    Ok(())
}

/// PC = addr
pub fn jump(state: &mut State, addr: u16) {
    state.pc = addr;
}

/// STACK.push(PC + 2); PC = addr
pub fn call(state: &mut State, addr: u16) -> Result<()> {
    state.push(state.pc + 0x2)?;
    state.pc = addr;
    Ok(())
}

/// if Vx == nn then pc += 2
pub fn ske(state: &mut State, x: u8, nn: u8) {
    let condition = state.v[x as usize] == nn;
    skip_if(state, condition);
}

/// if Vx != nn then pc += 2
pub fn skne(state: &mut State, x: u8, nn: u8) {
    let condition = state.v[x as usize] != nn;
    skip_if(state, condition);
}

/// if Vx == Vy then pc += 2
pub fn skre(state: &mut State, x: u8, y: u8) {
    let condition = state.v[x as usize] == state.v[y as usize];
    skip_if(state, condition);
}

/// Vx = nn
pub fn load(state: &mut State, x: u8, nn: u8) {
    state.v[x as usize] = nn;
    next(state);
}

/// Vx += nn
/// Overflow is dropped and VF is left alone
pub fn add(state: &mut State, x: u8, nn: u8) {
    state.v[x as usize] = state.v[x as usize].wrapping_add(nn);
    next(state);
}

/// Vx = Vy
pub fn mv(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] = state.v[y as usize];
    next(state);
}

/// Vx |= Vy
pub fn or(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] |= state.v[y as usize];
    next(state);
}

/// Vx &= Vy
pub fn and(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] &= state.v[y as usize];
    next(state);
}

/// Vx ^= Vy
pub fn xor(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] ^= state.v[y as usize];
    next(state);
}

/// Vx += Vy; VF = carry
/// VF is written last, so with X = F the carry wins.
pub fn addr(state: &mut State, x: u8, y: u8) {
    let (res, carry) = state.v[x as usize].overflowing_add(state.v[y as usize]);
    state.v[x as usize] = res;
    state.set_flag(carry);
    next(state);
}

/// Vx -= Vy; VF = Vx > Vy
/// The flag is strict: equal operands clear it.
pub fn sub(state: &mut State, x: u8, y: u8) {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    state.set_flag(vx > vy);
    state.v[x as usize] = vx.wrapping_sub(vy);
    next(state);
}

/// Vx >>= 1; VF = shifted out bit
/// Vy is ignored.
pub fn shr(state: &mut State, x: u8) {
    let vx = state.v[x as usize];
    state.v[0xF] = vx & 0x1;
    state.v[x as usize] = vx >> 1;
    next(state);
}

/// Vx = Vy - Vx; VF = Vx < Vy
pub fn subn(state: &mut State, x: u8, y: u8) {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    state.set_flag(vx < vy);
    state.v[x as usize] = vy.wrapping_sub(vx);
    next(state);
}

/// Vx <<= 1; VF = shifted out bit
pub fn shl(state: &mut State, x: u8) {
    let vx = state.v[x as usize];
    state.v[0xF] = vx >> 7;
    state.v[x as usize] = vx << 1;
    next(state);
}

/// if Vx != Vy then pc += 2
pub fn skrne(state: &mut State, x: u8, y: u8) {
    let condition = state.v[x as usize] != state.v[y as usize];
    skip_if(state, condition);
}

/// I = addr
pub fn loadi(state: &mut State, addr: u16) {
    state.i = addr;
    next(state);
}

/// PC = V0 + addr
pub fn jumpi(state: &mut State, addr: u16) {
    state.pc = u16::from(state.v[0x0]) + addr;
}

/// Vx = rand_byte & nn
pub fn rand(state: &mut State, x: u8, nn: u8, rng: &mut impl Rng) {
    let rand_byte: u8 = rng.gen();
    state.v[x as usize] = rand_byte & nn;
    next(state);
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs a sprite from memory I..I+n at position Vx, Vy on the FrameBuffer.
/// Pixels that land outside the frame are clipped rather than wrapped and never collide.
/// Sets VF if any pixel is erased.
pub fn draw(state: &mut State, x: u8, y: u8, n: u8) -> Result<()> {
    let origin_x = state.v[x as usize] as usize;
    let origin_y = state.v[y as usize] as usize;
    let mut sprite = [0u8; 0xF];
    let sprite = &mut sprite[..n as usize];
    sprite.copy_from_slice(state.slice(state.i, n as usize)?);

    let collision = xor_sprite(&mut state.frame_buffer, sprite, origin_x, origin_y);
    state.set_flag(collision);
    state.draw_flag = true;
    next(state);
    Ok(())
}

fn xor_sprite(frame: &mut FrameBuffer, sprite: &[u8], origin_x: usize, origin_y: usize) -> bool {
    let mut collision = false;
    for (row, byte) in sprite.iter().enumerate() {
        let y = origin_y + row;
        if y >= DISPLAY_HEIGHT {
            break;
        }
        for bit in 0..8 {
            let x = origin_x + bit;
            if x >= DISPLAY_WIDTH {
                break;
            }
            let pixel = (byte >> (7 - bit)) & 0x1;
            collision |= (pixel & frame[y][x]) == 0x1;
            frame[y][x] ^= pixel;
        }
    }
    collision
}

/// if Vx.pressed then pc += 2
pub fn skpr(state: &mut State, x: u8, pressed_keys: &Keypad) {
    let condition = is_pressed(pressed_keys, state.v[x as usize]);
    skip_if(state, condition);
}

/// if !Vx.pressed then pc += 2
pub fn skup(state: &mut State, x: u8, pressed_keys: &Keypad) {
    let condition = !is_pressed(pressed_keys, state.v[x as usize]);
    skip_if(state, condition);
}

// Only the low nibble of Vx names a key.
fn is_pressed(pressed_keys: &Keypad, key: u8) -> bool {
    pressed_keys[(key & 0xF) as usize]
}

/// Vx = DT
pub fn moved(state: &mut State, x: u8) {
    state.v[x as usize] = state.delay_timer;
    next(state);
}

/// Vx = last pressed key, if any
/// Without a pressed key the pc stays put so the instruction runs again next cycle.
/// Returns whether a key was found.
pub fn keyd(state: &mut State, x: u8, pressed_keys: &Keypad) -> bool {
    match pressed_keys.iter().rposition(|&pressed| pressed) {
        Some(key) => {
            state.v[x as usize] = key as u8;
            next(state);
            true
        }
        None => false,
    }
}

/// DT = Vx
pub fn loads(state: &mut State, x: u8) {
    state.delay_timer = state.v[x as usize];
    next(state);
}

/// ST = Vx
pub fn ld(state: &mut State, x: u8) {
    state.sound_timer = state.v[x as usize];
    next(state);
}

/// I += Vx
/// VF is not touched.
pub fn addi(state: &mut State, x: u8) {
    state.i = state.i.wrapping_add(u16::from(state.v[x as usize]));
    next(state);
}

/// I = address of the font glyph for Vx
pub fn ldspr(state: &mut State, x: u8) {
    state.i = SPRITE_SHEET_START + u16::from(state.v[x as usize]) * SPRITE_SIZE;
    next(state);
}

/// mem[I..I+3] = bcd(Vx)
pub fn bcd(state: &mut State, x: u8) -> Result<()> {
    let vx = state.v[x as usize];
    let bcd = [vx / 100 % 10, vx / 10 % 10, vx % 10];
    state.slice_mut(state.i, 3)?.copy_from_slice(&bcd);
    next(state);
    Ok(())
}

/// mem[I..=I+x] = V0..=Vx
pub fn stor(state: &mut State, x: u8) -> Result<()> {
    let len = x as usize + 1;
    let v = state.v;
    state.slice_mut(state.i, len)?.copy_from_slice(&v[..len]);
    next(state);
    Ok(())
}

/// V0..=Vx = mem[I..=I+x]
pub fn read(state: &mut State, x: u8) -> Result<()> {
    let len = x as usize + 1;
    let mut v = state.v;
    v[..len].copy_from_slice(state.slice(state.i, len)?);
    state.v = v;
    next(state);
    Ok(())
}
