use log::{info, trace};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::decode::Opcode;
use crate::display::{FrameBuffer, HEIGHT, WIDTH};
use crate::error::VmError;
use crate::keyboard::KeyInput;
use crate::memory::{self, Addr, Memory, MEMORY_SIZE, PROGRAM_START};
use crate::registers::{Registers, Stack, FLAG};
use crate::sound::Audio;
use crate::timer::{Clock, SystemClock, Timers};

/// The whole machine: CPU state, memory, framebuffer and timers, advanced
/// one instruction at a time by [`Chip8::cycle`].
///
/// The keyboard and audio collaborators are supplied at construction; the
/// clock and random source default to the real ones and can be swapped for
/// deterministic stand-ins.
pub struct Chip8 {
    pc: Addr,
    index: Addr,
    regs: Registers,
    stack: Stack,
    mem: Memory,
    fb: FrameBuffer,
    timers: Timers,
    rng: Box<dyn RngCore>,
    clock: Box<dyn Clock>,
    input: Box<dyn KeyInput>,
    audio: Box<dyn Audio>,
}

impl Chip8 {
    /// A machine with empty memory apart from the font table.
    pub fn new(input: Box<dyn KeyInput>, audio: Box<dyn Audio>) -> Self {
        Self::assemble(Memory::new(), input, audio)
    }

    /// A machine whose memory is a caller-supplied image of the address
    /// space. The font still wins below address 80.
    pub fn from_image(
        image: &[u8],
        input: Box<dyn KeyInput>,
        audio: Box<dyn Audio>,
    ) -> Result<Self, VmError> {
        info!("building machine from image [size: {}]", image.len());
        Ok(Self::assemble(Memory::from_image(image)?, input, audio))
    }

    fn assemble(mem: Memory, input: Box<dyn KeyInput>, audio: Box<dyn Audio>) -> Self {
        Self {
            pc: PROGRAM_START,
            index: 0,
            regs: Registers::new(),
            stack: Stack::new(),
            mem,
            fb: FrameBuffer::new(),
            timers: Timers::new(),
            rng: Box::new(StdRng::from_entropy()),
            clock: Box::new(SystemClock),
            input,
            audio,
        }
    }

    /// Copies program bytes in at 0x200.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), VmError> {
        self.mem.load_program(rom)?;
        info!("loaded program [size: {}]", rom.len());
        Ok(())
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.rng = rng;
    }

    /// One machine cycle: fetch the word at PC, advance PC, give the
    /// timers a chance to tick against the wall clock, dispatch.
    pub fn cycle(&mut self) -> Result<(), VmError> {
        let word = self.mem.fetch_word(self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        let now = self.clock.now();
        self.timers.tick(now, self.audio.as_mut());
        self.execute(word)
    }

    /// Decodes and applies a single instruction word.
    pub fn execute(&mut self, word: u16) -> Result<(), VmError> {
        let op = Opcode::decode(word)?;
        trace!(
            "{word:04X} -> {op:?} [pc {:03X} i {:03X}]",
            self.pc,
            self.index
        );
        self.apply(op)
    }

    fn apply(&mut self, op: Opcode) -> Result<(), VmError> {
        match op {
            Opcode::ClearScreen => self.fb.clear(),
            Opcode::Return => self.pc = self.stack.pop()?,
            Opcode::Jump(addr) => self.pc = addr,
            Opcode::Call(addr) => {
                self.stack.push(self.pc)?;
                self.pc = addr;
            }
            Opcode::SkipEqImm { x, nn } => {
                if self.regs.get(x) == nn {
                    self.skip();
                }
            }
            Opcode::SkipNeImm { x, nn } => {
                if self.regs.get(x) != nn {
                    self.skip();
                }
            }
            Opcode::SkipEqReg { x, y } => {
                if self.regs.get(x) == self.regs.get(y) {
                    self.skip();
                }
            }
            Opcode::SkipNeReg { x, y } => {
                if self.regs.get(x) != self.regs.get(y) {
                    self.skip();
                }
            }
            Opcode::LoadImm { x, nn } => self.regs.set(x, nn),
            Opcode::AddImm { x, nn } => {
                self.regs.set(x, self.regs.get(x).wrapping_add(nn));
            }
            Opcode::Assign { x, y } => self.regs.set(x, self.regs.get(y)),
            Opcode::Or { x, y } => {
                self.regs.set(x, self.regs.get(x) | self.regs.get(y));
            }
            Opcode::And { x, y } => {
                self.regs.set(x, self.regs.get(x) & self.regs.get(y));
            }
            Opcode::Xor { x, y } => {
                self.regs.set(x, self.regs.get(x) ^ self.regs.get(y));
            }
            // The widened result is stored first and the flag after, so the
            // flag wins when x is VF.
            Opcode::Add { x, y } => {
                let sum = u16::from(self.regs.get(x)) + u16::from(self.regs.get(y));
                self.regs.set(x, sum as u8);
                self.regs.set(FLAG, u8::from(sum >> 8 != 0));
            }
            // VF flags the difference not fitting in one byte, which is the
            // inverse of the canonical no-borrow flag.
            Opcode::Sub { x, y } => {
                let diff = i16::from(self.regs.get(x)) - i16::from(self.regs.get(y));
                self.regs.set(x, diff as u8);
                self.regs.set(FLAG, u8::from(diff >> 8 != 0));
            }
            Opcode::SubReverse { x, y } => {
                let diff = i16::from(self.regs.get(y)) - i16::from(self.regs.get(x));
                self.regs.set(x, diff as u8);
                self.regs.set(FLAG, u8::from(diff >> 8 != 0));
            }
            // Shifts read Vy and write the flag before the result; both
            // effects are observable when x or y is VF.
            Opcode::ShiftRight { x, y } => {
                self.regs.set(FLAG, self.regs.get(y) & 0x1);
                self.regs.set(x, self.regs.get(y) >> 1);
            }
            Opcode::ShiftLeft { x, y } => {
                self.regs.set(FLAG, self.regs.get(y) >> 7);
                self.regs.set(x, self.regs.get(y) << 1);
            }
            Opcode::LoadIndex(addr) => self.index = addr,
            Opcode::JumpOffset(addr) => {
                self.pc = addr.wrapping_add(Addr::from(self.regs.get(0)));
            }
            Opcode::Random { x, nn } => {
                let byte: u8 = self.rng.gen();
                self.regs.set(x, byte & nn);
            }
            Opcode::Draw { x, y, rows } => {
                let mut sprite = Vec::with_capacity(rows as usize);
                for row in 0..rows {
                    sprite.push(self.mem.get(self.index.wrapping_add(Addr::from(row)))?);
                }
                let collided = self.fb.blit(self.regs.get(x), self.regs.get(y), &sprite);
                self.regs.set(FLAG, u8::from(collided));
            }
            Opcode::SkipKeyEq { x } => {
                if self.regs.get(x) == self.input.read() {
                    self.skip();
                }
            }
            Opcode::SkipKeyNe { x } => {
                if self.regs.get(x) != self.input.read() {
                    self.skip();
                }
            }
            Opcode::ReadDelay { x } => self.regs.set(x, self.timers.delay()),
            Opcode::SetDelay { x } => self.timers.set_delay(self.regs.get(x)),
            Opcode::SetSound { x } => self.timers.set_sound(self.regs.get(x)),
            // Cooperative busy-wait: with no key down, rewind PC so the
            // next cycle re-dispatches this instruction.
            Opcode::WaitKey { x } => {
                let key = self.input.read();
                if key == 0 {
                    self.pc = self.pc.wrapping_sub(2);
                } else {
                    self.regs.set(x, key);
                }
            }
            Opcode::AddIndex { x } => {
                self.index = self.index.wrapping_add(Addr::from(self.regs.get(x)));
            }
            Opcode::FontChar { x } => {
                self.index = memory::character_address(self.regs.get(x))?;
            }
            Opcode::StoreBcd { x } => {
                let value = self.regs.get(x);
                self.mem.set(self.index, value / 100)?;
                self.mem.set(self.index.wrapping_add(1), value % 100 / 10)?;
                self.mem.set(self.index.wrapping_add(2), value % 100 % 10)?;
            }
            Opcode::StoreRegs { x } => {
                for reg in 0..=x {
                    self.mem.set(self.index, self.regs.get(reg))?;
                    self.index = self.index.wrapping_add(1);
                }
            }
            Opcode::LoadRegs { x } => {
                for reg in 0..=x {
                    let value = self.mem.get(self.index)?;
                    self.regs.set(reg, value);
                    self.index = self.index.wrapping_add(1);
                }
            }
        }
        Ok(())
    }

    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    pub fn pc(&self) -> Addr {
        self.pc
    }

    pub fn index(&self) -> Addr {
        self.index
    }

    pub fn v(&self, reg: u8) -> u8 {
        self.regs.get(reg)
    }

    /// Read-only view of the 64x32 framebuffer, row-major, 0/1 bytes.
    pub fn framebuffer(&self) -> &[u8; WIDTH * HEIGHT] {
        self.fb.pixels()
    }

    /// Defensive copy of the whole address space.
    pub fn memory(&self) -> [u8; MEMORY_SIZE] {
        self.mem.snapshot()
    }
}
