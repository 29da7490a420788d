use crate::memory::{TypeAddr, ADDR_MASK, PROGRAM_START};

pub const REGISTER_COUNT: usize = 16;
pub const FLAG_REGISTER: u8 = 0xF;

/// V0..VF. Register numbers come straight out of a nibble so they are
/// always in range.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    registers: [u8; REGISTER_COUNT],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.registers = [0; REGISTER_COUNT];
    }

    pub fn set_register(&mut self, reg_num: u8, value: u8) {
        self.registers[(reg_num & 0xF) as usize] = value;
    }

    pub fn add_to_register(&mut self, reg_num: u8, value: u8) {
        let total = self.get(reg_num).wrapping_add(value);
        self.set_register(reg_num, total);
    }

    pub fn set_flag(&mut self, value: u8) {
        self.set_register(FLAG_REGISTER, value);
    }

    pub fn get(&self, reg_num: u8) -> u8 {
        self.registers[(reg_num & 0xF) as usize]
    }

    pub fn flag(&self) -> u8 {
        self.get(FLAG_REGISTER)
    }

    /// V0..=VX as a slice
    pub fn up_to(&self, reg_num: u8) -> &[u8] {
        &self.registers[..=(reg_num & 0xF) as usize]
    }
}

// Special registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter(pub TypeAddr);

impl Default for ProgramCounter {
    fn default() -> Self {
        Self(PROGRAM_START)
    }
}

impl ProgramCounter {
    /// move on one instruction word
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(2) & ADDR_MASK;
    }

    pub fn skip(&mut self) {
        self.0 = self.0.wrapping_add(4) & ADDR_MASK;
    }

    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr & ADDR_MASK;
    }

    pub fn addr(&self) -> TypeAddr {
        self.0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexRegister(pub TypeAddr);

impl IndexRegister {
    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr & ADDR_MASK;
    }

    pub fn addr(&self) -> TypeAddr {
        self.0
    }
}
