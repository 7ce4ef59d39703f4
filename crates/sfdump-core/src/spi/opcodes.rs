//! Standard JEDEC SPI flash opcodes

// ============================================================================
// Read operations
// ============================================================================

/// Read Data (3-byte address, no dummy cycles)
pub const READ: u8 = 0x03;
