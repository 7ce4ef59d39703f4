//! SPI NOR command framing
//!
//! Only the plain READ (0x03) command is used: one opcode byte followed by a
//! 3-byte big-endian address, after which the chip streams data for as long
//! as chip-select stays asserted.

mod address;
mod command;
pub mod opcodes;

pub use address::{encode_be24, ADDRESS_BYTES, ADDRESS_SPACE, MAX_ADDRESS};
pub use command::ReadCommand;
