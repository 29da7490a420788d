// 16 8-bit data registers named V0 to VF
// I -> address register (12 bits)
//
// 16-deep stack of return addresses
//
// Delay timer & Sound timer: count down 60 times / s until 0, on their own
// thread. The host watches the sound timer to drive a beep.
//
// Display res: 64 width, 32 height
//
// 35 opcodes, each are 2 bytes (big-endian)
//      NNN: address
//      NN: 8-bit constant
//      N: 4-bit constant
//      X and Y: 4-bit register identifier

pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod timer;

pub use display::{FrameBuffer, Screen};
pub use emulator::{Cycle, Emulator};
pub use error::EmulatorError;
pub use timer::{TimerClock, Timers};
