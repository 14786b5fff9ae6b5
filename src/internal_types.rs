use crate::types::{Channel, Sample};

// Layout of the configuration register.
//
// || /RDY | C1 C0 | /O/C | S1 S0 | G1 G0 ||
pub const READY_MASK: u8 = 0b1000_0000;
pub const READY_SHIFT: u8 = 7;
pub const CHANNEL_MASK: u8 = 0b0110_0000;
pub const CHANNEL_SHIFT: u8 = 5;
pub const CONVERSION_MODE_MASK: u8 = 0b0001_0000;
pub const CONVERSION_MODE_SHIFT: u8 = 4;
pub const RESOLUTION_MASK: u8 = 0b0000_1100;
pub const RESOLUTION_SHIFT: u8 = 2;
pub const GAIN_MASK: u8 = 0b0000_0011;
pub const GAIN_SHIFT: u8 = 0;

// Every read returns the two output bytes followed by the configuration byte.
pub const BURST_LEN: usize = 3;

pub fn field(byte: u8, mask: u8, shift: u8) -> u8 {
    (byte & mask) >> shift
}

// Replaces one field of a configuration byte and clears the ready bit, so that a rewritten
// register never triggers a one-shot conversion by accident.
pub fn with_field(byte: u8, mask: u8, bits: u8) -> u8 {
    (byte & !mask & !READY_MASK) | (bits & mask)
}

// The byte to write to move `config` onto `channel`, or `None` if it already selects it.
pub fn channel_correction(config: u8, channel: Channel) -> Option<u8> {
    let bits = u8::from(channel) << CHANNEL_SHIFT;
    if config & CHANNEL_MASK == bits {
        None
    } else {
        Some(with_field(config, CHANNEL_MASK, bits))
    }
}

pub fn decode_burst(bytes: &[u8; BURST_LEN]) -> Sample {
    Sample {
        code: i16::from_be_bytes([bytes[0], bytes[1]]),
        config: bytes[2],
    }
}

pub const ADDRESS_GENERAL_CALL: u8 = 0x00;
pub const COMMAND_GENERAL_CALL_RESET: u8 = 0b0000_0110;
pub const COMMAND_GENERAL_CALL_LATCH: u8 = 0b0000_0100;
pub const COMMAND_GENERAL_CALL_CONVERSION: u8 = 0b0000_1000;
