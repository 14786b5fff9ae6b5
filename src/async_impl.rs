use crate::internal_types::*;
use crate::types::*;
use crate::{MCP3426, MAX_READY_POLLS};

use embedded_hal_async::{delay::DelayNs, i2c};

/// Implementation of all commands given an [`embedded_hal_async::i2c::I2c`] bus.
///
/// Every method behaves like its blocking counterpart without the `_async` suffix.
///
/// # Errors
///
/// Errors from the I2C bus are wrapped in [`Error::BusWrite`] or [`Error::BusRead`] depending on
/// the direction of the failed transaction.  No command is retried.
impl<I, E> MCP3426<I>
where
    I: i2c::I2c<Error = E>,
{
    /// Creates a new [`MCP3426`] from an I2C device that implements the
    /// [`embedded_hal_async::i2c::I2c`] trait.
    pub const fn new_async(i2c: I, address: u8) -> Self {
        MCP3426 {
            i2c,
            address,
            config: None,
        }
    }

    async fn write_bytes_async(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error<E>> {
        self.i2c.write(address, bytes).await.map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCP3426: write to 0x{:02x} not acknowledged", address);
            Error::BusWrite(e)
        })
    }

    async fn write_config_byte_async(&mut self, byte: u8) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("MCP3426 0x{:02x}: writing config 0x{:02x}", self.address, byte);
        self.write_bytes_async(self.address, &[byte]).await?;
        self.record_config(byte);
        Ok(())
    }

    async fn read_burst_async(&mut self) -> Result<Sample, Error<E>> {
        let mut bytes = [0; BURST_LEN];
        let address = self.address;
        self.i2c.read(address, &mut bytes).await.map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCP3426 0x{:02x}: no data", address);
            Error::BusRead(e)
        })?;
        let sample = decode_burst(&bytes);
        self.record_config(sample.config);
        Ok(sample)
    }

    async fn update_field_async(&mut self, mask: u8, bits: u8) -> Result<(), Error<E>> {
        let current = self.read_burst_async().await?.config;
        self.write_config_byte_async(with_field(current, mask, bits)).await
    }

    async fn select_channel_async(&mut self, channel: Channel) -> Result<(), Error<E>> {
        match self.channel_switch(channel) {
            Some(byte) => self.write_config_byte_async(byte).await,
            None => Ok(()),
        }
    }

    /// Writes the default configuration for `channel`: 16 bits, continuous conversion and x1
    /// gain.
    pub async fn initialize_async(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.write_config_async(&Config::new().channel(channel)).await
    }

    /// [`initialize_async`](MCP3426::initialize_async) for channel 1.
    pub async fn initialize_default_async(&mut self) -> Result<(), Error<E>> {
        self.initialize_async(Channel::One).await
    }

    /// Writes a complete configuration.
    pub async fn write_config_async(&mut self, config: &Config) -> Result<(), Error<E>> {
        self.write_config_byte_async(config.to_byte()).await
    }

    /// Reads the raw configuration register, including the ready bit.
    pub async fn read_config_byte_async(&mut self) -> Result<u8, Error<E>> {
        Ok(self.read_burst_async().await?.config)
    }

    /// Reads and decodes the configuration register.
    pub async fn read_config_async(&mut self) -> Result<Config, Error<E>> {
        let byte = self.read_config_byte_async().await?;
        Config::from_byte(byte).ok_or(Error::ReservedConfig(byte))
    }

    /// Reads the output register of `channel` together with the configuration byte, switching
    /// channels first if needed and once more if the burst shows another channel.
    pub async fn read_sample_async(&mut self, channel: Channel) -> Result<Sample, Error<E>> {
        self.select_channel_async(channel).await?;
        let sample = self.read_burst_async().await?;
        let Some(byte) = channel_correction(sample.config, channel) else {
            return Ok(sample);
        };
        #[cfg(feature = "defmt")]
        defmt::warn!("MCP3426 0x{:02x}: channel selection lost", self.address);
        self.write_config_byte_async(byte).await?;
        let sample = self.read_burst_async().await?;
        match channel_correction(sample.config, channel) {
            None => Ok(sample),
            Some(_) => Err(Error::ChannelMismatch(sample.config)),
        }
    }

    /// Reads the signed output code of `channel`.
    pub async fn read_raw_sample_async(&mut self, channel: Channel) -> Result<i16, Error<E>> {
        Ok(self.read_sample_async(channel).await?.code)
    }

    /// [`read_raw_sample_async`](MCP3426::read_raw_sample_async) for channel 1.
    pub async fn read_raw_sample_default_async(&mut self) -> Result<i16, Error<E>> {
        self.read_raw_sample_async(Channel::One).await
    }

    /// Reads `channel` and converts the output code to volts.
    pub async fn read_voltage_async(&mut self, channel: Channel) -> Result<f32, Error<E>> {
        let sample = self.read_sample_async(channel).await?;
        sample.voltage().ok_or(Error::ReservedConfig(sample.config))
    }

    /// [`read_voltage_async`](MCP3426::read_voltage_async) for channel 1.
    pub async fn read_voltage_default_async(&mut self) -> Result<f32, Error<E>> {
        self.read_voltage_async(Channel::One).await
    }

    /// Sets the PGA gain, leaving the other fields unchanged.
    pub async fn set_gain_async(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.update_field_async(GAIN_MASK, u8::from(gain) << GAIN_SHIFT)
            .await
    }

    /// Sets the resolution and sample rate, leaving the other fields unchanged.
    pub async fn set_resolution_async(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        self.update_field_async(RESOLUTION_MASK, u8::from(resolution) << RESOLUTION_SHIFT)
            .await
    }

    /// Sets continuous or one-shot conversion, leaving the other fields unchanged.
    pub async fn set_conversion_mode_async(
        &mut self,
        mode: ConversionMode,
    ) -> Result<(), Error<E>> {
        self.update_field_async(CONVERSION_MODE_MASK, u8::from(mode) << CONVERSION_MODE_SHIFT)
            .await
    }

    /// Selects the channel that is converted, leaving the other fields unchanged.
    pub async fn set_active_channel_async(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.update_field_async(CHANNEL_MASK, u8::from(channel) << CHANNEL_SHIFT)
            .await
    }

    /// Whether the output register holds a result that has not been read yet.
    pub async fn is_data_ready_async(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_burst_async().await?.is_ready())
    }

    /// Writes the ready bit, which starts a single conversion in one-shot mode.
    pub async fn start_conversion_async(&mut self) -> Result<(), Error<E>> {
        let current = match self.config {
            Some(byte) => byte,
            None => self.read_burst_async().await?.config,
        };
        self.write_config_byte_async(current | READY_MASK).await
    }

    /// Selects `channel` and waits for a fresh conversion result, starting one with the same
    /// write in one-shot mode.
    pub async fn read_ready_sample_async<D: DelayNs>(
        &mut self,
        channel: Channel,
        delay: &mut D,
    ) -> Result<Sample, Error<E>> {
        if let Some(byte) = self.conversion_trigger(channel) {
            self.write_config_byte_async(byte).await?;
        }
        let interval = self.poll_interval_us();
        for poll in 1..=MAX_READY_POLLS {
            let sample = self.read_burst_async().await?;
            if sample.is_ready() {
                return match channel_correction(sample.config, channel) {
                    None => Ok(sample),
                    Some(_) => Err(Error::ChannelMismatch(sample.config)),
                };
            }
            if poll < MAX_READY_POLLS {
                delay.delay_us(interval).await;
            }
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("MCP3426 0x{:02x}: conversion timed out", self.address);
        Err(Error::ConversionTimeout)
    }

    /// Issues a general call command (address 0x00) to reset all MCP3426 devices on the bus.
    pub async fn general_call_reset_async(&mut self) -> Result<(), Error<E>> {
        self.write_bytes_async(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_RESET])
            .await?;
        self.config = None;
        Ok(())
    }

    /// Issues a general call command (address 0x00) to latch the address pins.
    pub async fn general_call_latch_async(&mut self) -> Result<(), Error<E>> {
        self.write_bytes_async(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_LATCH])
            .await
    }

    /// Issues a general call command (address 0x00) to start a conversion on all devices.
    pub async fn general_call_conversion_async(&mut self) -> Result<(), Error<E>> {
        self.write_bytes_async(ADDRESS_GENERAL_CALL, &[COMMAND_GENERAL_CALL_CONVERSION])
            .await
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_async::delay::DelayNs;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use crate::*;

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[tokio::test]
    async fn initialize_and_read_config() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00111000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b00111000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(mcp3426.initialize_async(Channel::Two).await, Ok(()));
        assert_eq!(
            mcp3426.read_config_async().await,
            Ok(Config::new().channel(Channel::Two))
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn set_gain_read_modify_write() {
        let expectations = [
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x12, 0x34, 0b10100101]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00100111]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(mcp3426.set_gain_async(Gain::TimesEight).await, Ok(()));
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn setter_read_error_skips_write() {
        let expectations =
            [I2cTransaction::read(DEFAULT_ADDRESS, vec![0, 0, 0]).with_error(ErrorKind::Other)];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(
            mcp3426
                .set_conversion_mode_async(ConversionMode::OneShot)
                .await,
            Err(Error::BusRead(ErrorKind::Other))
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_raw_sample_switches_channel() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00011000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x12, 0x34, 0b00011000]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00111000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0xff, 0x00, 0b00111000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(mcp3426.read_raw_sample_default_async().await, Ok(4660));
        assert_eq!(
            mcp3426.read_raw_sample_async(Channel::Two).await,
            Ok(-256)
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn channel_switch_write_error_skips_read() {
        let expectations = [I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00111000])
            .with_error(ErrorKind::Other)];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(
            mcp3426.read_voltage_async(Channel::Two).await,
            Err(Error::BusWrite(ErrorKind::Other))
        );
        assert_eq!(mcp3426.cached_config(), None);
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_voltage_negative() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00011000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0xc1, 0x80, 0b00011000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        let volts = mcp3426.read_voltage_default_async().await.unwrap();
        assert!((volts + 1.0).abs() < 1e-6);
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_ready_sample_one_shot() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00001000]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b10001000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b10001000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x2a, 0b00001000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        mcp3426
            .write_config_async(&Config::new().conversion_mode(ConversionMode::OneShot))
            .await
            .unwrap();
        assert_eq!(
            mcp3426
                .read_ready_sample_async(Channel::One, &mut NoDelay)
                .await,
            Ok(Sample {
                code: 42,
                config: 0b00001000
            })
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_ready_sample_switches_channel_in_one_write() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00001000]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b10101000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b10101000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x07, 0b00101000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        mcp3426
            .write_config_async(&Config::new().conversion_mode(ConversionMode::OneShot))
            .await
            .unwrap();
        assert_eq!(
            mcp3426
                .read_ready_sample_async(Channel::Two, &mut NoDelay)
                .await,
            Ok(Sample {
                code: 7,
                config: 0b00101000
            })
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_raw_sample_restores_lost_channel() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00111000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b00010000]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00110000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x01, 0x00, 0b00110000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(
            mcp3426.read_raw_sample_async(Channel::Two).await,
            Ok(256)
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn read_raw_sample_channel_mismatch() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00111000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b00010000]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0b00110000]),
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b00010000]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(
            mcp3426.read_raw_sample_async(Channel::Two).await,
            Err(Error::ChannelMismatch(0b00010000))
        );
        mcp3426.release().done();
    }

    #[tokio::test]
    async fn data_ready_and_general_calls() {
        let expectations = [
            I2cTransaction::read(DEFAULT_ADDRESS, vec![0x00, 0x00, 0b10010000]),
            I2cTransaction::write(0x00, vec![0b00001000]),
            I2cTransaction::write(0x00, vec![0b00000100]),
            I2cTransaction::write(0x00, vec![0b00000110]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut mcp3426 = MCP3426::new_async(i2c, DEFAULT_ADDRESS);
        assert_eq!(mcp3426.is_data_ready_async().await, Ok(false));
        assert_eq!(mcp3426.general_call_conversion_async().await, Ok(()));
        assert_eq!(mcp3426.general_call_latch_async().await, Ok(()));
        assert_eq!(mcp3426.general_call_reset_async().await, Ok(()));
        assert_eq!(mcp3426.cached_config(), None);
        mcp3426.release().done();
    }
}
