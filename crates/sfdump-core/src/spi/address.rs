//! 24-bit flash addressing

/// Number of address bytes sent after the opcode
pub const ADDRESS_BYTES: usize = 3;

/// Highest byte offset that fits in the address field
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;

/// Size of the addressable space in bytes (16 MiB)
pub const ADDRESS_SPACE: u64 = 1 << 24;

/// Encode the low 24 bits of `address` big-endian into `buf[..3]`
///
/// This is the 32-bit big-endian encoding with its top byte dropped; callers
/// are responsible for rejecting addresses above [`MAX_ADDRESS`].
pub fn encode_be24(address: u32, buf: &mut [u8]) {
    buf[..ADDRESS_BYTES].copy_from_slice(&address.to_be_bytes()[1..]);
}
