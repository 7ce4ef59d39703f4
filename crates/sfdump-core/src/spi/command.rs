//! READ command structure

use super::address::{encode_be24, ADDRESS_BYTES, MAX_ADDRESS};
use super::opcodes;
use crate::error::{DumpError, Result};

/// A READ (0x03) command for a single sector
///
/// Built fresh for every sector and dropped once it has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCommand {
    address: u32,
}

impl ReadCommand {
    /// Encoded length: opcode plus address
    pub const LEN: usize = 1 + ADDRESS_BYTES;

    /// Create a READ command starting at `address`
    ///
    /// Fails with [`DumpError::AddressOverflow`] when the address does not
    /// fit in 24 bits.
    pub fn new(address: u32) -> Result<Self> {
        if address > MAX_ADDRESS {
            return Err(DumpError::AddressOverflow {
                addr: address as u64,
            });
        }
        Ok(Self { address })
    }

    /// Start address of the read
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Encode into the bytes clocked out on MOSI
    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut buf = [opcodes::READ, 0, 0, 0];
        encode_be24(self.address, &mut buf[1..]);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_read_command() {
        assert_eq!(ReadCommand::new(0).unwrap().encode(), [0x03, 0x00, 0x00, 0x00]);
        assert_eq!(
            ReadCommand::new(0x1000).unwrap().encode(),
            [0x03, 0x00, 0x10, 0x00]
        );
        assert_eq!(
            ReadCommand::new(0xFF_F000).unwrap().encode(),
            [0x03, 0xFF, 0xF0, 0x00]
        );
    }

    #[test]
    fn test_address_overflow() {
        assert!(ReadCommand::new(MAX_ADDRESS).is_ok());
        match ReadCommand::new(0x100_0000) {
            Err(DumpError::AddressOverflow { addr }) => assert_eq!(addr, 0x100_0000),
            other => panic!("expected AddressOverflow, got {:?}", other),
        }
    }
}
