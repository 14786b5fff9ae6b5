//! # Rust driver for MCP3426 2-channel 16-bit I2C ADC
//!
//! This is a platform agnostic rust driver for the MCP3426 delta-sigma ADC using the [embedded-hal](https://github.com/rust-embedded/embedded-hal) traits.
//!
//! The device forgets its configuration when it loses power, so call
//! [`MCP3426::initialize`] once at start-up before reading.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(target_os = "linux")] {
//! use linux_embedded_hal::I2cdev;
//! use mcp3426::{Channel, MCP3426, DEFAULT_ADDRESS};
//!
//! let i2c = I2cdev::new("/dev/i2c-1").unwrap();
//! let mut adc = MCP3426::new(i2c, DEFAULT_ADDRESS);
//! adc.initialize(Channel::One).unwrap();
//! let volts = adc.read_voltage(Channel::One).unwrap();
//! # }
//! ```
#![cfg_attr(not(test), no_std)]

#[cfg(feature = "async")]
mod async_impl;
mod internal_types;
mod types;

pub use crate::types::*;

use crate::internal_types::*;

#[cfg(feature = "sync")]
use embedded_hal::{delay::DelayNs, i2c};

/// I2C address of the device on our boards.
///
/// The MCP3426 is factory-programmed with an address between `0x68` and `0x6F` depending on the
/// part number, so check the package marking if the device does not respond.
pub const DEFAULT_ADDRESS: u8 = 0x69;

/// Number of times [`MCP3426::read_ready_sample`] reads the device before giving up, with a
/// quarter of the conversion time between reads.
pub const MAX_READY_POLLS: u32 = 16;

/// MCP3426 2-channel 16-bit I2C ADC.
pub struct MCP3426<I2C> {
    i2c: I2C,
    address: u8,
    // Last configuration written to or read from the device, ready bit cleared.  `None` until
    // the first successful transaction and after a general call reset.
    config: Option<u8>,
}

impl<I2C> MCP3426<I2C> {
    /// Destroy this instance and return the inner I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// The I2C address this instance talks to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The configuration most recently written to or read back from the device.
    ///
    /// This does not touch the bus.  It is `None` before the first transaction, after a
    /// [general call reset](MCP3426::general_call_reset), or if the device reported a reserved
    /// configuration.
    pub fn cached_config(&self) -> Option<Config> {
        self.config.and_then(Config::from_byte)
    }

    // The byte to write to select `channel`, or `None` if it is already selected.  Other fields
    // are kept as they are; an unconfigured device gets the default configuration.
    fn channel_switch(&self, channel: Channel) -> Option<u8> {
        match self.config {
            Some(byte) => channel_correction(byte, channel),
            None => Some(Config::new().channel(channel).to_byte()),
        }
    }

    // The single write that selects `channel` and, in one-shot mode, also starts a conversion.
    fn conversion_trigger(&self, channel: Channel) -> Option<u8> {
        let switch = self.channel_switch(channel);
        match switch.or(self.config) {
            Some(byte) if byte & CONVERSION_MODE_MASK == 0 => Some(byte | READY_MASK),
            _ => switch,
        }
    }

    fn poll_interval_us(&self) -> u32 {
        let resolution = self
            .config
            .map(|byte| field(byte, RESOLUTION_MASK, RESOLUTION_SHIFT))
            .and_then(|bits| Resolution::try_from(bits).ok())
            .unwrap_or(Resolution::SixteenBit);
        resolution.conversion_time_us() / 4
    }

    fn record_config(&mut self, byte: u8) {
        self.config = Some(byte & !READY_MASK);
    }
}

/// Implementation of all commands given a blocking [`embedded_hal::i2c::I2c`] bus.
///
/// # Errors
///
/// Errors from the I2C bus are wrapped in [`Error::BusWrite`] or [`Error::BusRead`] depending on
/// the direction of the failed transaction.  No command is retried.
#[cfg(feature = "sync")]
impl<I2C, E> MCP3426<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates a new [`MCP3426`] from an I2C device that implements the
    /// [`embedded_hal::i2c::I2c`] trait.
    ///
    /// No bus traffic happens until the first command.
    pub fn new(i2c: I2C, address: u8) -> Self {
        MCP3426 {
            i2c,
            address,
            config: None,
        }
    }

    fn write_bytes(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error<E>> {
        self.i2c.write(address, bytes).map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCP3426: write to 0x{:02x} not acknowledged", address);
            Error::BusWrite(e)
        })
    }

    fn write_config_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("MCP3426 0x{:02x}: writing config 0x{:02x}", self.address, byte);
        self.write_bytes(self.address, &[byte])?;
        self.record_config(byte);
        Ok(())
    }

    fn read_burst(&mut self) -> Result<Sample, Error<E>> {
        let mut bytes = [0; BURST_LEN];
        let address = self.address;
        self.i2c.read(address, &mut bytes).map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCP3426 0x{:02x}: no data", address);
            Error::BusRead(e)
        })?;
        let sample = decode_burst(&bytes);
        self.record_config(sample.config);
        Ok(sample)
    }

    // Read-modify-write of a single register field.  Nothing is written if the read fails.
    fn update_field(&mut self, mask: u8, bits: u8) -> Result<(), Error<E>> {
        let current = self.read_burst()?.config;
        self.write_config_byte(with_field(current, mask, bits))
    }

    fn select_channel(&mut self, channel: Channel) -> Result<(), Error<E>> {
        match self.channel_switch(channel) {
            Some(byte) => self.write_config_byte(byte),
            None => Ok(()),
        }
    }

    /// Writes the default configuration for `channel`: 16 bits, continuous conversion and x1
    /// gain.
    pub fn initialize(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.write_config(&Config::new().channel(channel))
    }

    /// [`initialize`](MCP3426::initialize) for channel 1.
    pub fn initialize_default(&mut self) -> Result<(), Error<E>> {
        self.initialize(Channel::One)
    }

    /// Writes a complete configuration.
    pub fn write_config(&mut self, config: &Config) -> Result<(), Error<E>> {
        self.write_config_byte(config.to_byte())
    }

    /// Reads the raw configuration register, including the ready bit.
    pub fn read_config_byte(&mut self) -> Result<u8, Error<E>> {
        Ok(self.read_burst()?.config)
    }

    /// Reads and decodes the configuration register.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedConfig`] if the register holds a value the MCP3426 does not
    /// define.
    pub fn read_config(&mut self) -> Result<Config, Error<E>> {
        let byte = self.read_config_byte()?;
        Config::from_byte(byte).ok_or(Error::ReservedConfig(byte))
    }

    /// Reads the output register of `channel` together with the configuration byte.
    ///
    /// If `channel` is not the active channel, the configuration is first rewritten with only the
    /// channel bits changed.  If that write fails, no read is attempted.
    ///
    /// The channel bits of the burst are checked against `channel`.  If the device has lost its
    /// configuration (e.g. after a brown-out or a general call reset from another driver), the
    /// channel bits are rewritten and the burst is read once more.
    ///
    /// The result may be stale; check [`Sample::is_ready`] or use
    /// [`read_ready_sample`](MCP3426::read_ready_sample) to wait for a fresh conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelMismatch`] if the device still reports another channel after the
    /// rewrite.
    pub fn read_sample(&mut self, channel: Channel) -> Result<Sample, Error<E>> {
        self.select_channel(channel)?;
        let sample = self.read_burst()?;
        let Some(byte) = channel_correction(sample.config, channel) else {
            return Ok(sample);
        };
        #[cfg(feature = "defmt")]
        defmt::warn!("MCP3426 0x{:02x}: channel selection lost", self.address);
        self.write_config_byte(byte)?;
        let sample = self.read_burst()?;
        match channel_correction(sample.config, channel) {
            None => Ok(sample),
            Some(_) => Err(Error::ChannelMismatch(sample.config)),
        }
    }

    /// Reads the signed output code of `channel`.
    pub fn read_raw_sample(&mut self, channel: Channel) -> Result<i16, Error<E>> {
        Ok(self.read_sample(channel)?.code)
    }

    /// [`read_raw_sample`](MCP3426::read_raw_sample) for channel 1.
    pub fn read_raw_sample_default(&mut self) -> Result<i16, Error<E>> {
        self.read_raw_sample(Channel::One)
    }

    /// Reads `channel` and converts the output code to volts using the resolution and gain the
    /// device reports with the sample.  Negative inputs give negative voltages.
    pub fn read_voltage(&mut self, channel: Channel) -> Result<f32, Error<E>> {
        let sample = self.read_sample(channel)?;
        sample.voltage().ok_or(Error::ReservedConfig(sample.config))
    }

    /// [`read_voltage`](MCP3426::read_voltage) for channel 1.
    pub fn read_voltage_default(&mut self) -> Result<f32, Error<E>> {
        self.read_voltage(Channel::One)
    }

    /// Sets the PGA gain, leaving the other fields unchanged.
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.update_field(GAIN_MASK, u8::from(gain) << GAIN_SHIFT)
    }

    /// Sets the resolution and sample rate, leaving the other fields unchanged.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        self.update_field(RESOLUTION_MASK, u8::from(resolution) << RESOLUTION_SHIFT)
    }

    /// Sets continuous or one-shot conversion, leaving the other fields unchanged.
    pub fn set_conversion_mode(&mut self, mode: ConversionMode) -> Result<(), Error<E>> {
        self.update_field(CONVERSION_MODE_MASK, u8::from(mode) << CONVERSION_MODE_SHIFT)
    }

    /// Selects the channel that is converted, leaving the other fields unchanged.
    pub fn set_active_channel(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.update_field(CHANNEL_MASK, u8::from(channel) << CHANNEL_SHIFT)
    }

    /// Whether the output register holds a result that has not been read yet.
    pub fn is_data_ready(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_burst()?.is_ready())
    }

    /// Writes the ready bit, which starts a single conversion in one-shot mode.  In continuous
    /// mode this has no effect on the device.
    ///
    /// The cached configuration is used if there is one; otherwise the register is read first.
    pub fn start_conversion(&mut self) -> Result<(), Error<E>> {
        let current = match self.config {
            Some(byte) => byte,
            None => self.read_burst()?.config,
        };
        self.write_config_byte(current | READY_MASK)
    }

    /// Selects `channel` and waits for a fresh conversion result.
    ///
    /// In one-shot mode a conversion is started by the same write that switches channels.  The
    /// device is polled every quarter of a conversion time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionTimeout`] if no fresh result arrives within
    /// [`MAX_READY_POLLS`] reads, and [`Error::ChannelMismatch`] if the fresh result belongs to
    /// another channel.
    pub fn read_ready_sample<D: DelayNs>(
        &mut self,
        channel: Channel,
        delay: &mut D,
    ) -> Result<Sample, Error<E>> {
        if let Some(byte) = self.conversion_trigger(channel) {
            self.write_config_byte(byte)?;
        }
        let interval = self.poll_interval_us();
        for poll in 1..=MAX_READY_POLLS {
            let sample = self.read_burst()?;
            if sample.is_ready() {
                return match channel_correction(sample.config, channel) {
                    None => Ok(sample),
                    Some(_) => Err(Error::ChannelMismatch(sample.config)),
                };
            }
            if poll < MAX_READY_POLLS {
                delay.delay_us(interval);
            }
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("MCP3426 0x{:02x}: conversion timed out", self.address);
        Err(Error::ConversionTimeout)
    }

    /// Issues a general call command (address 0x00) to reset the device.  All MCP3426 devices on
    /// the bus return to their power-on configuration (channel 1, continuous, 12 bits, x1), so
    /// the cached configuration is cleared.
    pub fn general_call_reset(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_RESET])?;
        self.config = None;
        Ok(())
    }

    /// Issues a general call command (address 0x00) that makes all MCP3426 devices on the bus
    /// latch the logic level of their address pins.
    pub fn general_call_latch(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_LATCH])
    }

    /// Issues a general call command (address 0x00) that makes all MCP3426 devices on the bus
    /// start a conversion at the same time.
    pub fn general_call_conversion(&mut self) -> Result<(), Error<E>> {
        self.write_bytes(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_CONVERSION])
    }
}
