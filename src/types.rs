use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::internal_types::*;

// Error type.

/// Error type for the crate, which can represent either an error from this driver or an inner error
/// that comes from the I2C type.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<InnerError> {
    /// Writing the configuration register (or a general call command) was not acknowledged.
    ///
    /// Nothing about the driver's cached configuration changes when this is returned.
    BusWrite(InnerError),
    /// The 3-byte data burst could not be read from the device.
    BusRead(InnerError),
    /// The configuration byte read back from the device uses bits that are reserved on the MCP3426
    /// (channel select `10`/`11` or sample rate `11`), so it cannot be decoded.
    ///
    /// This usually means another device is answering on the address, e.g. an MCP3428.
    ReservedConfig(u8),
    /// The device still reported another channel after the driver rewrote the channel bits.
    ///
    /// Carries the configuration byte of the last read.
    ChannelMismatch(u8),
    /// A channel number other than 1 or 2 was passed to [`Channel::from_number`].
    InvalidChannel(u8),
    /// [`MCP3426::read_ready_sample`](crate::MCP3426::read_ready_sample) polled the device
    /// [`MAX_READY_POLLS`](crate::MAX_READY_POLLS) times without seeing a fresh result.
    ConversionTimeout,
}

/// A channel number other than 1 or 2.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidChannel(pub u8);

impl<InnerError> From<InvalidChannel> for Error<InnerError> {
    fn from(invalid: InvalidChannel) -> Self {
        Error::InvalidChannel(invalid.0)
    }
}

// Enums for configuration.

/// Input channel selection.
///
/// The discriminants are the values of the channel select bits, not the channel numbers printed
/// on the package.  Use [`Channel::from_number`] and [`Channel::number`] for the latter.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    /// Differential input CH1+ / CH1-.
    One = 0,
    /// Differential input CH2+ / CH2-.
    Two = 1,
}

impl Channel {
    /// Converts a channel number as printed on the package (1 or 2) into a [`Channel`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidChannel`] for any other number, which converts into
    /// [`Error::InvalidChannel`] with `?`.
    pub fn from_number(number: u8) -> Result<Channel, InvalidChannel> {
        match number {
            1 => Ok(Channel::One),
            2 => Ok(Channel::Two),
            other => Err(InvalidChannel(other)),
        }
    }

    /// The channel number as printed on the package.
    pub fn number(self) -> u8 {
        u8::from(self) + 1
    }
}

/// Configuration bit for whether the device converts continuously or once per request.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConversionMode {
    /// A single conversion is performed each time the ready bit is written as 1, after which the
    /// device enters a low-power standby state.
    ///
    /// See [`MCP3426::start_conversion`](crate::MCP3426::start_conversion).
    OneShot = 0,
    /// The device converts continuously at the selected sample rate.
    Continuous = 1,
}

/// Configuration bits for resolution and sample rate.
///
/// Higher resolution trades off directly against sample rate.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    /// 12 bits at 240 samples per second, 1 mV per code.
    TwelveBit = 0,
    /// 14 bits at 60 samples per second, 250 uV per code.
    FourteenBit = 1,
    /// 16 bits at 15 samples per second, 62.5 uV per code.
    SixteenBit = 2,
}

impl Resolution {
    /// Volts represented by one code at a gain of 1x.
    pub fn lsb_volts(self) -> f32 {
        match self {
            Resolution::TwelveBit => 0.001,
            Resolution::FourteenBit => 0.000_25,
            Resolution::SixteenBit => 0.000_062_5,
        }
    }

    /// Nominal number of conversions per second.
    pub fn samples_per_second(self) -> u32 {
        match self {
            Resolution::TwelveBit => 240,
            Resolution::FourteenBit => 60,
            Resolution::SixteenBit => 15,
        }
    }

    /// Time taken by one conversion, in microseconds.
    pub fn conversion_time_us(self) -> u32 {
        match self {
            Resolution::TwelveBit => 4_167,
            Resolution::FourteenBit => 16_667,
            Resolution::SixteenBit => 66_667,
        }
    }
}

/// Configuration bits for the programmable gain amplifier.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gain {
    /// Gain is set to unity (1x).
    TimesOne = 0,
    /// Gain is set to 2x.
    TimesTwo = 1,
    /// Gain is set to 4x.
    TimesFour = 2,
    /// Gain is set to 8x.
    TimesEight = 3,
}

impl Gain {
    /// The amplification factor.
    pub fn factor(self) -> u8 {
        1 << u8::from(self)
    }
}

// Enums for status from reads.

/// State of the ready bit (`/RDY`) of the configuration register.
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReadyState {
    /// The output register holds a result that has not been read yet.
    Ready = 0,
    /// The output register has not been updated since the last read.
    ///
    /// In one-shot mode this also means a conversion is still in progress.
    Busy = 1,
}

// Container structs.

/// Representation of the writable fields of the configuration register.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// The input channel that is converted.
    pub channel: Channel,
    /// Continuous or one-shot conversion.
    pub conversion_mode: ConversionMode,
    /// The resolution and sample rate.
    pub resolution: Resolution,
    /// The PGA gain.
    pub gain: Gain,
}

impl Config {
    /// Creates a Config with the state the driver initializes the device with: channel 1,
    /// continuous conversion, 16 bits and x1 gain.
    pub fn new() -> Config {
        Config {
            channel: Channel::One,
            conversion_mode: ConversionMode::Continuous,
            resolution: Resolution::SixteenBit,
            gain: Gain::TimesOne,
        }
    }

    /// Convenience builder method to set the channel.
    pub fn channel(mut self, new_val: Channel) -> Config {
        self.channel = new_val;
        self
    }

    /// Convenience builder method to set the conversion mode.
    pub fn conversion_mode(mut self, new_val: ConversionMode) -> Config {
        self.conversion_mode = new_val;
        self
    }

    /// Convenience builder method to set the resolution.
    pub fn resolution(mut self, new_val: Resolution) -> Config {
        self.resolution = new_val;
        self
    }

    /// Convenience builder method to set the gain.
    pub fn gain(mut self, new_val: Gain) -> Config {
        self.gain = new_val;
        self
    }

    /// Encodes the configuration as a register byte with the ready bit cleared.
    pub fn to_byte(&self) -> u8 {
        (u8::from(self.channel) << CHANNEL_SHIFT)
            | (u8::from(self.conversion_mode) << CONVERSION_MODE_SHIFT)
            | (u8::from(self.resolution) << RESOLUTION_SHIFT)
            | (u8::from(self.gain) << GAIN_SHIFT)
    }

    /// Decodes a register byte, ignoring the ready bit.
    ///
    /// Returns `None` if the byte uses a channel or resolution value that is reserved on the
    /// MCP3426.
    pub fn from_byte(byte: u8) -> Option<Config> {
        Some(Config {
            channel: Channel::try_from(field(byte, CHANNEL_MASK, CHANNEL_SHIFT)).ok()?,
            conversion_mode: ConversionMode::try_from(field(
                byte,
                CONVERSION_MODE_MASK,
                CONVERSION_MODE_SHIFT,
            ))
            .ok()?,
            resolution: Resolution::try_from(field(byte, RESOLUTION_MASK, RESOLUTION_SHIFT))
                .ok()?,
            gain: Gain::try_from(field(byte, GAIN_MASK, GAIN_SHIFT)).ok()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// One conversion result together with the configuration byte that was read in the same burst.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// The signed output code.
    ///
    /// At 12 and 14 bits the device sign-extends the result into the upper bits, so the code is
    /// always a plain two's-complement `i16`.
    pub code: i16,
    /// The raw configuration register, including the ready bit.
    pub config: u8,
}

impl Sample {
    /// State of the ready bit at the time of the read.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::try_from(field(self.config, READY_MASK, READY_SHIFT))
            .unwrap_or(ReadyState::Busy)
    }

    /// Whether this sample is a fresh conversion result.
    pub fn is_ready(&self) -> bool {
        self.ready_state() == ReadyState::Ready
    }

    /// Decodes the configuration that produced this sample.
    pub fn decoded_config(&self) -> Option<Config> {
        Config::from_byte(self.config)
    }

    /// Input voltage in volts, scaled by the resolution and gain reported alongside the sample.
    ///
    /// Returns `None` if the configuration byte cannot be decoded.
    pub fn voltage(&self) -> Option<f32> {
        let config = self.decoded_config()?;
        Some(f32::from(self.code) * config.resolution.lsb_volts() / f32::from(config.gain.factor()))
    }
}
