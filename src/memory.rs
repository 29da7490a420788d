use std::{fs, io, path::Path};

use crate::{
    error::EmulatorError,
    registers::{IndexRegister, ProgramCounter},
};

pub type TypeAddr = u16; // in reality u12
type FontBytes = [u8; 5 * 16];

pub const MEMORY_SIZE: usize = 4096;
pub const ADDR_MASK: TypeAddr = 0x0FFF;
pub const PROGRAM_START: TypeAddr = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const FONT_START: TypeAddr = 0x000;
pub const GLYPH_SIZE: u8 = 5;
pub const STACK_DEPTH: usize = 16;

pub const DEFAULT_FONT: FontBytes = [
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

pub struct Memory {
    // 4k bytes
    // font data stored from 000 -> 04F, programs from 200
    bytes: [u8; MEMORY_SIZE],
    pub pc: ProgramCounter,
    pub index: IndexRegister,
    pub stack: Stack,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        let mut mem = Self {
            bytes: [0; MEMORY_SIZE],
            pc: ProgramCounter::default(),
            index: IndexRegister::default(),
            stack: Stack::new(),
        };
        mem.reset();
        mem
    }

    /// clear everything and bake the font back in
    pub fn reset(&mut self) {
        self.bytes = [0; MEMORY_SIZE];
        let start = FONT_START as usize;
        self.bytes[start..start + DEFAULT_FONT.len()].copy_from_slice(&DEFAULT_FONT);
        self.pc = ProgramCounter::default();
        self.index = IndexRegister::default();
        self.stack.clear();
    }

    // addresses wrap around the top of memory
    pub fn set(&mut self, addr: TypeAddr, val: u8) {
        self.bytes[(addr & ADDR_MASK) as usize] = val;
    }

    pub fn get(&self, addr: TypeAddr) -> u8 {
        self.bytes[(addr & ADDR_MASK) as usize]
    }

    /// big-endian instruction word at PC
    pub fn current_instruction(&self) -> u16 {
        let pc = self.pc.addr();
        let (l, r) = (self.get(pc), self.get(pc.wrapping_add(1)));
        ((l as u16) << 8) | r as u16
    }

    pub fn set_pc(&mut self, addr: TypeAddr) {
        self.pc.set_addr(addr);
    }

    pub fn set_index(&mut self, addr: TypeAddr) {
        self.index.set_addr(addr);
    }

    /// copy `len` bytes starting at I, wrapping past 0xFFF
    pub fn read_from_index(&self, len: usize) -> Vec<u8> {
        let start = self.index.addr();
        (0..len as u16)
            .map(|offset| self.get(start.wrapping_add(offset)))
            .collect()
    }

    pub fn write_at_index(&mut self, data: &[u8]) {
        let start = self.index.addr();
        for (offset, byte) in data.iter().enumerate() {
            self.set(start.wrapping_add(offset as u16), *byte);
        }
    }

    /// loads program instructions starting at address 0x200
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), EmulatorError> {
        if bytes.len() > MAX_PROGRAM_SIZE {
            return Err(EmulatorError::ProgramTooLarge {
                size: bytes.len(),
                max_size: MAX_PROGRAM_SIZE,
            });
        }
        let start_index = PROGRAM_START as usize;
        self.bytes[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        log::info!("loaded {} byte program at {:#05x}", bytes.len(), start_index);
        Ok(())
    }

    pub fn load_rom_from(&mut self, reader: &mut impl io::Read) -> Result<(), EmulatorError> {
        let mut program = Vec::new();
        reader.read_to_end(&mut program)?;
        self.load_rom(&program)
    }

    pub fn load_rom_by_file(&mut self, path: impl AsRef<Path>) -> Result<(), EmulatorError> {
        let program = fs::read(path)?;
        self.load_rom(&program)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Return addresses for subroutine calls, 16 deep
#[derive(Debug, Default)]
pub struct Stack {
    addresses: [TypeAddr; STACK_DEPTH],
    sp: usize,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.addresses = [0; STACK_DEPTH];
        self.sp = 0;
    }

    /// `None` when all 16 slots are taken
    pub fn push(&mut self, addr: TypeAddr) -> Option<()> {
        let slot = self.addresses.get_mut(self.sp)?;
        *slot = addr;
        self.sp += 1;
        Some(())
    }

    pub fn pop(&mut self) -> Option<TypeAddr> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.addresses[self.sp])
    }

    pub fn depth(&self) -> usize {
        self.sp
    }
}
