use crate::memory::TypeAddr;

/// Everything that stops a run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("unknown instruction {opcode:#06x} at {addr:#05x}")]
    UnknownInstruction { opcode: u16, addr: TypeAddr },

    #[error("stack overflow: call at {addr:#05x} with 16 return addresses already stacked")]
    StackOverflow { addr: TypeAddr },

    #[error("stack underflow: return at {addr:#05x} with an empty call stack")]
    StackUnderflow { addr: TypeAddr },

    #[error("program is too large ({size} bytes), max size is {max_size} bytes")]
    ProgramTooLarge { size: usize, max_size: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
