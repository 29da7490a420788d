use std::{io, path::Path, sync::Arc};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    decode::OpCodes,
    display::{FrameBuffer, Screen},
    error::EmulatorError,
    keyboard::Keyboard,
    memory::{Memory, TypeAddr, GLYPH_SIZE},
    registers::Registers,
    timer::Timers,
};

/// What a successful step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Continue,
    /// FX0A found no key down; PC was left on the same instruction
    AwaitingKey,
}

pub struct Emulator<S: Screen> {
    fb: FrameBuffer,
    screen: S,
    pub regs: Registers,
    pub mem: Memory,
    pub keyboard: Keyboard,
    timers: Arc<Timers>,
    rng: StdRng,
}

impl<S: Screen> Emulator<S> {
    pub fn new(screen: S) -> Self {
        Self::with_rng(screen, StdRng::from_entropy())
    }

    /// deterministic random source, for tests and replays
    pub fn with_seed(screen: S, seed: u64) -> Self {
        Self::with_rng(screen, StdRng::seed_from_u64(seed))
    }

    fn with_rng(screen: S, rng: StdRng) -> Self {
        Self {
            fb: FrameBuffer::new(),
            screen,
            regs: Registers::new(),
            mem: Memory::new(),
            keyboard: Keyboard::new(),
            timers: Arc::new(Timers::new()),
            rng,
        }
    }

    /// Back to power-on state: memory wiped with the font at 0, registers,
    /// stack, keys, timers and screen cleared, PC at 0x200.
    pub fn init(&mut self) {
        self.mem.reset();
        self.regs.reset();
        self.keyboard.reset();
        self.timers.reset();
        self.fb.clear_buffer();
        self.screen.present(&self.fb);
    }

    pub fn load_program(&mut self, program: &[u8]) -> Result<(), EmulatorError> {
        self.mem.load_rom(program)
    }

    pub fn load_program_from(&mut self, reader: &mut impl io::Read) -> Result<(), EmulatorError> {
        self.mem.load_rom_from(reader)
    }

    pub fn load_program_file(&mut self, path: impl AsRef<Path>) -> Result<(), EmulatorError> {
        self.mem.load_rom_by_file(path)
    }

    pub fn set_key(&mut self, code: u8) {
        self.keyboard.press(code);
    }

    pub fn clear_key(&mut self, code: u8) {
        self.keyboard.release(code);
    }

    /// handle for the timer clock thread
    pub fn timers(&self) -> Arc<Timers> {
        Arc::clone(&self.timers)
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound()
    }

    pub fn sound_active(&self) -> bool {
        self.sound_timer() > 0
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.fb
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    pub fn pc(&self) -> TypeAddr {
        self.mem.pc.addr()
    }

    pub fn fetch_decode(&self) -> OpCodes {
        let ins = self.mem.current_instruction();
        log::trace!("{:#05x}: {:04x}", self.pc(), ins);
        OpCodes::decode_raw(ins)
    }

    /// Fetch, decode and execute one instruction.
    pub fn tick(&mut self) -> Result<Cycle, EmulatorError> {
        let operation = self.fetch_decode();
        self.execute_ins(operation)
    }

    pub fn execute_ins(&mut self, ins: OpCodes) -> Result<Cycle, EmulatorError> {
        let addr = self.pc();
        match ins {
            OpCodes::ClearScreen => {
                log::debug!("clear screen");
                self.fb.clear_buffer();
                self.screen.present(&self.fb);
            }
            OpCodes::Return => {
                let ret = self
                    .mem
                    .stack
                    .pop()
                    .ok_or(EmulatorError::StackUnderflow { addr })?;
                log::debug!("return to {ret:#05x}");
                // resume after the call instruction
                self.mem.set_pc(ret);
            }
            OpCodes::Jump(target) => {
                self.mem.set_pc(target);
                return Ok(Cycle::Continue);
            }
            OpCodes::Call(target) => {
                self.mem
                    .stack
                    .push(addr)
                    .ok_or(EmulatorError::StackOverflow { addr })?;
                log::debug!("call {target:#05x}, depth {}", self.mem.stack.depth());
                self.mem.set_pc(target);
                return Ok(Cycle::Continue);
            }
            OpCodes::SkipEqualConstant(vx, nn) => {
                return Ok(self.skip_if(self.regs.get(vx) == nn));
            }
            OpCodes::SkipNotEqualConstant(vx, nn) => {
                return Ok(self.skip_if(self.regs.get(vx) != nn));
            }
            OpCodes::SkipEqualRegister(vx, vy) => {
                return Ok(self.skip_if(self.regs.get(vx) == self.regs.get(vy)));
            }
            OpCodes::SkipNotEqualRegister(vx, vy) => {
                return Ok(self.skip_if(self.regs.get(vx) != self.regs.get(vy)));
            }
            OpCodes::SetRegister(vx, nn) => {
                self.regs.set_register(vx, nn);
            }
            OpCodes::AddToRegister(vx, nn) => {
                self.regs.add_to_register(vx, nn);
            }
            OpCodes::CopyRegister(vx, vy) => {
                self.regs.set_register(vx, self.regs.get(vy));
            }
            OpCodes::Or(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) | self.regs.get(vy));
            }
            OpCodes::And(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) & self.regs.get(vy));
            }
            OpCodes::XOr(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) ^ self.regs.get(vy));
            }
            // flag first, result second: with X = F the result wins
            OpCodes::Add(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                let (sum, carry) = x.overflowing_add(y);
                self.regs.set_flag(carry as u8);
                self.regs.set_register(vx, sum);
            }
            OpCodes::SubtractForward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                let (diff, borrow) = x.overflowing_sub(y);
                self.regs.set_flag((!borrow) as u8);
                self.regs.set_register(vx, diff);
            }
            OpCodes::SubtractBackward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                let (diff, borrow) = y.overflowing_sub(x);
                self.regs.set_flag((!borrow) as u8);
                self.regs.set_register(vx, diff);
            }
            OpCodes::RightShift(vx) => {
                let vx_value = self.regs.get(vx);
                self.regs.set_flag(vx_value & 1);
                self.regs.set_register(vx, vx_value >> 1);
            }
            OpCodes::LeftShift(vx) => {
                let vx_value = self.regs.get(vx);
                self.regs.set_flag((vx_value >> 7) & 1);
                self.regs.set_register(vx, vx_value << 1);
            }
            OpCodes::SetIndexRegister(target) => self.mem.set_index(target),
            OpCodes::JumpWithOffset(target) => {
                self.mem.set_pc(target + self.regs.get(0) as TypeAddr);
                return Ok(Cycle::Continue);
            }
            OpCodes::Random(vx, nn) => {
                let ransuu: u8 = self.rng.gen();
                self.regs.set_register(vx, nn & ransuu);
            }
            OpCodes::Display(reg_x, reg_y, height) => {
                let (x, y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                let sprite = self.mem.read_from_index(height as usize);
                let collision = self.fb.paint(x, y, &sprite);
                self.regs.set_flag(collision as u8);
                self.screen.present(&self.fb);
            }
            OpCodes::SkipIfPressed(vx) => {
                return Ok(self.skip_if(self.keyboard.is_pressed(self.regs.get(vx))));
            }
            OpCodes::SkipIfNotPressed(vx) => {
                return Ok(self.skip_if(!self.keyboard.is_pressed(self.regs.get(vx))));
            }
            OpCodes::CopyDelayToRegister(vx) => self.regs.set_register(vx, self.timers.delay()),
            OpCodes::GetKey(vx) => match self.keyboard.first_pressed() {
                Some(key) => self.regs.set_register(vx, key),
                None => return Ok(Cycle::AwaitingKey),
            },
            OpCodes::CopyRegisterToDelay(vx) => self.timers.set_delay(self.regs.get(vx)),
            OpCodes::CopyRegisterToSound(vx) => self.timers.set_sound(self.regs.get(vx)),
            OpCodes::AddToIndex(vx) => {
                self.mem
                    .set_index(self.mem.index.addr() + self.regs.get(vx) as TypeAddr);
            }
            OpCodes::PointChar(vx) => {
                let glyph = self.regs.get(vx) as TypeAddr * GLYPH_SIZE as TypeAddr;
                self.mem.set_index(glyph);
            }
            OpCodes::ToDecimal(vx) => {
                let value = self.regs.get(vx);
                self.mem
                    .write_at_index(&[value / 100, (value / 10) % 10, value % 10]);
            }
            OpCodes::StoreRegisterToMemory(vx) => {
                let values = self.regs.up_to(vx).to_vec();
                self.mem.write_at_index(&values);
            }
            OpCodes::LoadRegisterFromMemory(vx) => {
                let values = self.mem.read_from_index(vx as usize + 1);
                for (reg, value) in values.into_iter().enumerate() {
                    self.regs.set_register(reg as u8, value);
                }
            }
            OpCodes::Unknown(opcode) => {
                return Err(EmulatorError::UnknownInstruction { opcode, addr });
            }
        }
        self.mem.pc.increment();
        Ok(Cycle::Continue)
    }

    fn skip_if(&mut self, condition: bool) -> Cycle {
        if condition {
            self.mem.pc.skip();
        } else {
            self.mem.pc.increment();
        }
        Cycle::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DEFAULT_FONT;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<FrameBuffer>,
    }

    impl Screen for Recorder {
        fn present(&mut self, fb: &FrameBuffer) {
            self.frames.push(fb.clone());
        }
    }

    fn emulator_with(program: &[u8]) -> Emulator<Recorder> {
        let mut emu = Emulator::with_seed(Recorder::default(), 7);
        emu.init();
        emu.load_program(program).unwrap();
        emu
    }

    fn run(emu: &mut Emulator<Recorder>, steps: usize) {
        for _ in 0..steps {
            assert_eq!(emu.tick().unwrap(), Cycle::Continue);
        }
    }

    #[test]
    fn init_resets_state() {
        let mut emu = emulator_with(&[0x6A, 0x12]);
        emu.tick().unwrap();
        emu.timers().set_delay(9);
        emu.set_key(3);
        emu.init();

        assert_eq!(emu.pc(), 0x200);
        assert_eq!(emu.regs.get(0xA), 0);
        assert_eq!(emu.timers().delay(), 0);
        assert_eq!(emu.sound_timer(), 0);
        assert_eq!(emu.keyboard.first_pressed(), None);
        assert_eq!(&emu.mem.as_slice()[..80], &DEFAULT_FONT[..]);
        assert_eq!(emu.mem.get(0x200), 0);
        // one blank frame from each init
        assert_eq!(emu.screen().frames.len(), 2);
        assert_eq!(emu.screen().frames[1].lit_count(), 0);
    }

    #[test]
    fn load_immediate_for_every_value() {
        let mut emu = emulator_with(&[]);
        for nn in 0..=255u8 {
            emu.init();
            emu.load_program(&[0x63, nn]).unwrap();
            emu.tick().unwrap();
            assert_eq!(emu.regs.get(3), nn);
            assert_eq!(emu.pc(), 0x202);
        }
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let mut emu = emulator_with(&[0x61, 0xFF, 0x71, 0x02]);
        emu.regs.set_flag(0x55);
        run(&mut emu, 2);
        assert_eq!(emu.regs.get(1), 0x01);
        assert_eq!(emu.regs.flag(), 0x55);
    }

    #[test]
    fn add_register_carry() {
        let mut emu = emulator_with(&[0x60, 0xFF, 0x61, 0x01, 0x80, 0x14]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0x00);
        assert_eq!(emu.regs.flag(), 1);

        let mut emu = emulator_with(&[0x60, 0x10, 0x61, 0x05, 0x80, 0x14]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0x15);
        assert_eq!(emu.regs.flag(), 0);
    }

    #[test]
    fn subtract_register_borrow() {
        let mut emu = emulator_with(&[0x60, 0x05, 0x61, 0x0A, 0x80, 0x15]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0xFB);
        assert_eq!(emu.regs.flag(), 0);

        let mut emu = emulator_with(&[0x60, 0x0A, 0x61, 0x05, 0x80, 0x15]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0x05);
        assert_eq!(emu.regs.flag(), 1);
    }

    #[test]
    fn subtract_backward_borrow() {
        let mut emu = emulator_with(&[0x60, 0x0A, 0x61, 0x05, 0x80, 0x17]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0xFB);
        assert_eq!(emu.regs.flag(), 0);

        let mut emu = emulator_with(&[0x60, 0x05, 0x61, 0x05, 0x80, 0x17]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.get(0), 0x00);
        assert_eq!(emu.regs.flag(), 1);
    }

    #[test]
    fn shifts_capture_the_outgoing_bit() {
        let mut emu = emulator_with(&[0x60, 0x80, 0x80, 0x0E]);
        run(&mut emu, 2);
        assert_eq!(emu.regs.get(0), 0x00);
        assert_eq!(emu.regs.flag(), 1);

        let mut emu = emulator_with(&[0x60, 0x01, 0x80, 0x0E]);
        run(&mut emu, 2);
        assert_eq!(emu.regs.get(0), 0x02);
        assert_eq!(emu.regs.flag(), 0);

        let mut emu = emulator_with(&[0x60, 0x03, 0x80, 0x06]);
        run(&mut emu, 2);
        assert_eq!(emu.regs.get(0), 0x01);
        assert_eq!(emu.regs.flag(), 1);
    }

    #[test]
    fn result_overwrites_flag_when_target_is_vf() {
        let mut emu = emulator_with(&[0x6F, 0x10, 0x61, 0x05, 0x8F, 0x14]);
        run(&mut emu, 3);
        assert_eq!(emu.regs.flag(), 0x15);
    }

    #[test]
    fn logic_ops() {
        let mut emu = emulator_with(&[
            0x60, 0b1100, 0x61, 0b1010, 0x82, 0x00, 0x82, 0x11, // V2 = V0 | V1
            0x83, 0x00, 0x83, 0x12, // V3 = V0 & V1
            0x84, 0x00, 0x84, 0x13, // V4 = V0 ^ V1
        ]);
        run(&mut emu, 8);
        assert_eq!(emu.regs.get(2), 0b1110);
        assert_eq!(emu.regs.get(3), 0b1000);
        assert_eq!(emu.regs.get(4), 0b0110);
    }

    #[test]
    fn skips_advance_by_four() {
        let mut emu = emulator_with(&[0x60, 0x42, 0x30, 0x42]);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x206);

        let mut emu = emulator_with(&[0x60, 0x42, 0x40, 0x42]);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x204);

        let mut emu = emulator_with(&[0x60, 0x01, 0x61, 0x01, 0x50, 0x10, 0x00, 0x00, 0x90, 0x10]);
        run(&mut emu, 3);
        assert_eq!(emu.pc(), 0x208);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x20A);
    }

    #[test]
    fn jumps_and_subroutines() {
        // 200: call 206; 202: jump 202; 206: return
        let mut emu = emulator_with(&[0x22, 0x06, 0x12, 0x02, 0x00, 0x00, 0x00, 0xEE]);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x206);
        assert_eq!(emu.mem.stack.depth(), 1);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x202);
        assert_eq!(emu.mem.stack.depth(), 0);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn jump_with_offset() {
        let mut emu = emulator_with(&[0x60, 0x10, 0xB3, 0x00]);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x310);
    }

    #[test]
    fn return_with_empty_stack_is_fatal() {
        let mut emu = emulator_with(&[0x00, 0xEE]);
        let err = emu.tick().unwrap_err();
        assert!(matches!(err, EmulatorError::StackUnderflow { addr: 0x200 }));
    }

    #[test]
    fn seventeenth_nested_call_is_fatal() {
        // calls itself forever
        let mut emu = emulator_with(&[0x22, 0x00]);
        run(&mut emu, 16);
        let err = emu.tick().unwrap_err();
        assert!(matches!(err, EmulatorError::StackOverflow { addr: 0x200 }));
    }

    #[test]
    fn unknown_instruction_is_fatal() {
        let mut emu = emulator_with(&[0x60, 0x01, 0xFF, 0xFF]);
        run(&mut emu, 1);
        let err = emu.tick().unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::UnknownInstruction { opcode: 0xFFFF, addr: 0x202 }
        ));
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn random_is_masked_and_seeded() {
        let program = [0xC0, 0x0F, 0xC1, 0x00, 0xC2, 0xFF];
        let mut a = emulator_with(&program);
        let mut b = emulator_with(&program);
        run(&mut a, 3);
        run(&mut b, 3);
        assert!(a.regs.get(0) <= 0x0F);
        assert_eq!(a.regs.get(1), 0);
        assert_eq!(a.regs.get(0), b.regs.get(0));
        assert_eq!(a.regs.get(2), b.regs.get(2));
    }

    #[test]
    fn index_register_ops() {
        let mut emu = emulator_with(&[0xA1, 0x23, 0x60, 0x05, 0xF0, 0x1E, 0xF0, 0x29]);
        run(&mut emu, 3);
        assert_eq!(emu.mem.index.addr(), 0x128);
        run(&mut emu, 1);
        assert_eq!(emu.mem.index.addr(), 25);
    }

    #[test]
    fn binary_coded_decimal() {
        let mut emu = emulator_with(&[0x60, 123, 0xA3, 0x00, 0xF0, 0x33]);
        run(&mut emu, 3);
        assert_eq!(emu.mem.get(0x300), 1);
        assert_eq!(emu.mem.get(0x301), 2);
        assert_eq!(emu.mem.get(0x302), 3);
    }

    #[test]
    fn register_dump_and_load_are_inclusive() {
        let mut emu = emulator_with(&[0xA3, 0x00, 0xF0, 0x55]);
        emu.regs.set_register(0, 0xAA);
        emu.regs.set_register(1, 0xBB);
        run(&mut emu, 2);
        assert_eq!(emu.mem.get(0x300), 0xAA);
        assert_eq!(emu.mem.get(0x301), 0x00);

        let mut emu = emulator_with(&[0xA3, 0x00, 0xF2, 0x65]);
        emu.mem.set(0x300, 1);
        emu.mem.set(0x301, 2);
        emu.mem.set(0x302, 3);
        emu.mem.set(0x303, 4);
        run(&mut emu, 2);
        assert_eq!(emu.regs.up_to(3), &[1, 2, 3, 0]);
        assert_eq!(emu.mem.index.addr(), 0x300);
    }

    #[test]
    fn delay_and_sound_timers() {
        let mut emu = emulator_with(&[0x60, 0x05, 0xF0, 0x15, 0xF0, 0x18, 0xF1, 0x07]);
        run(&mut emu, 3);
        assert!(emu.sound_active());
        emu.timers().tick();
        run(&mut emu, 1);
        assert_eq!(emu.regs.get(1), 4);
        assert_eq!(emu.sound_timer(), 4);
    }

    #[test]
    fn draw_font_glyph_and_collide() {
        // V0 = 5; I = glyph 5; V1 = 0; draw V1,V1,5 twice
        let mut emu = emulator_with(&[0x60, 0x05, 0xF0, 0x29, 0x61, 0x00, 0xD1, 0x15, 0xD1, 0x15]);
        run(&mut emu, 4);
        assert_eq!(emu.regs.flag(), 0);
        let glyph = &DEFAULT_FONT[25..30];
        for (y, row) in glyph.iter().enumerate() {
            for x in 0..8 {
                let expected = (row >> (7 - x)) & 1 == 1;
                assert_eq!(emu.frame_buffer().get(x, y), expected, "({x}, {y})");
            }
        }
        let lit: u32 = glyph.iter().map(|r| r.count_ones()).sum();
        assert_eq!(emu.frame_buffer().lit_count(), lit as usize);

        run(&mut emu, 1);
        assert_eq!(emu.regs.flag(), 1);
        assert_eq!(emu.frame_buffer().lit_count(), 0);
        // init + two draws
        assert_eq!(emu.screen().frames.len(), 3);
    }

    #[test]
    fn draw_clips_at_the_corner() {
        // V0 = 60; V1 = 30; I = 0x300; draw 8 rows of 0xFF
        let mut emu = emulator_with(&[0x60, 60, 0x61, 30, 0xA3, 0x00, 0xD0, 0x18]);
        for addr in 0x300..0x308 {
            emu.mem.set(addr, 0xFF);
        }
        emu.regs.set_flag(1);
        run(&mut emu, 4);
        assert_eq!(emu.regs.flag(), 0);
        assert_eq!(emu.frame_buffer().lit_count(), 4 * 2);
        assert!(emu.frame_buffer().get(63, 31));
        assert!(!emu.frame_buffer().get(0, 0));
    }

    #[test]
    fn clear_screen_presents_blank_frame() {
        let mut emu = emulator_with(&[0xD0, 0x05, 0x00, 0xE0]);
        run(&mut emu, 1);
        assert!(emu.frame_buffer().lit_count() > 0);
        run(&mut emu, 1);
        assert_eq!(emu.frame_buffer().lit_count(), 0);
        assert_eq!(emu.screen().frames.last().map(|f| f.lit_count()), Some(0));
    }

    #[test]
    fn key_skips() {
        let mut emu = emulator_with(&[0x60, 0x0B, 0xE0, 0x9E, 0x00, 0x00, 0xE0, 0xA1]);
        emu.set_key(0xB);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x206);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x208);

        emu.clear_key(0xB);
        emu.mem.set_pc(0x202);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x204);
    }

    #[test]
    fn wait_key_holds_pc_until_pressed() {
        let mut emu = emulator_with(&[0xF5, 0x0A]);
        for _ in 0..3 {
            assert_eq!(emu.tick().unwrap(), Cycle::AwaitingKey);
            assert_eq!(emu.pc(), 0x200);
        }
        emu.set_key(0xE);
        emu.set_key(0x9);
        assert_eq!(emu.tick().unwrap(), Cycle::Continue);
        assert_eq!(emu.regs.get(5), 0x9);
        assert_eq!(emu.pc(), 0x202);
    }
}
