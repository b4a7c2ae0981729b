//! Port and command nibbles of the first frame byte.
//!
//! The high nibble selects one of 8 TNC ports; the low nibble is the KISS
//! command. Only [`DATA`] frames carry traffic, the rest configure the TNC.

use crate::error::{FrameError, Result};

/// Number of logical ports multiplexed over one TNC link.
pub const PORT_COUNT: u8 = 8;

/// Data frame.
pub const DATA: u8 = 0x0;
/// Transmitter keyup delay, in 10 ms units.
pub const TX_DELAY: u8 = 0x1;
/// Persistence parameter for p-persistent CSMA.
pub const PERSISTENCE: u8 = 0x2;
/// Slot interval, in 10 ms units.
pub const SLOT_TIME: u8 = 0x3;
/// Time to hold up the transmitter after the frame (obsolete).
pub const TX_TAIL: u8 = 0x4;
/// Full or half duplex.
pub const FULL_DUPLEX: u8 = 0x5;
/// TNC-specific configuration.
pub const SET_HARDWARE: u8 = 0x6;
/// Leave KISS mode. Sent as the whole byte 0xFF.
pub const RETURN: u8 = 0xF;

/// Returns a human-readable name for a command nibble.
pub fn command_name(command: u8) -> &'static str {
    match command & 0x0F {
        DATA => "DATA",
        TX_DELAY => "TXDELAY",
        PERSISTENCE => "P",
        SLOT_TIME => "SLOTTIME",
        TX_TAIL => "TXTAIL",
        FULL_DUPLEX => "FULLDUPLEX",
        SET_HARDWARE => "SETHARDWARE",
        RETURN => "RETURN",
        _ => "UNKNOWN",
    }
}

/// Returns true if `port` addresses one of the 8 TNC ports.
pub fn is_valid_port(port: u8) -> bool {
    port < PORT_COUNT
}

/// Build the port/command byte for `port` and `command`.
pub fn port_command(port: u8, command: u8) -> Result<u8> {
    if !is_valid_port(port) {
        return Err(FrameError::InvalidPort(port));
    }
    Ok((port << 4) | (command & 0x0F))
}

/// Split a port/command byte into `(port, command)`.
///
/// The port is the raw high nibble and may be 8-15 on a misbehaving link.
pub fn split_port_command(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_command_places_port_in_high_nibble() {
        assert_eq!(port_command(0, DATA).unwrap(), 0x00);
        assert_eq!(port_command(2, DATA).unwrap(), 0x20);
        assert_eq!(port_command(7, TX_DELAY).unwrap(), 0x71);
    }

    #[test]
    fn port_command_rejects_out_of_range_port() {
        assert!(matches!(port_command(8, DATA), Err(FrameError::InvalidPort(8))));
    }

    #[test]
    fn split_recovers_both_nibbles() {
        assert_eq!(split_port_command(0x20), (2, DATA));
        assert_eq!(split_port_command(0x75), (7, FULL_DUPLEX));
        assert_eq!(split_port_command(0xA0), (10, DATA));
    }

    #[test]
    fn names_cover_known_commands() {
        assert_eq!(command_name(DATA), "DATA");
        assert_eq!(command_name(SET_HARDWARE), "SETHARDWARE");
        assert_eq!(command_name(0x9), "UNKNOWN");
    }
}
