#![no_std]
#![no_main]

use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use fugit::RateExtU32;
use hal::pac;
use mcp3426::{Channel, Gain, DEFAULT_ADDRESS, MCP3426};
use panic_probe as _;
use rp2040_hal as hal;
use rp_pico::entry;
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

// Light the LED when channel 1 reads above this.
const LED_THRESHOLD_VOLTS: f32 = 1.0;

#[entry]
fn main() -> ! {
    // Device-specific setup for Raspberry Pi Pico.
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let mut delay = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut led_pin = pins.led.into_push_pull_output();

    let sda_pin = pins
        .gpio4
        .into_function::<hal::gpio::FunctionI2C>()
        .into_pull_type::<hal::gpio::PullUp>();
    let scl_pin = pins
        .gpio5
        .into_function::<hal::gpio::FunctionI2C>()
        .into_pull_type::<hal::gpio::PullUp>();

    let i2c = hal::I2C::i2c0(
        pac.I2C0,
        sda_pin,
        scl_pin,
        400.kHz(),
        &mut pac.RESETS,
        &clocks.peripheral_clock,
    );

    // MCP3426 example usage.  The device needs 300us to settle after power-up.
    delay.delay_us(300);
    let mut adc = MCP3426::new(i2c, DEFAULT_ADDRESS);
    adc.initialize(Channel::One).unwrap();
    adc.set_gain(Gain::TimesTwo).unwrap();

    loop {
        let ch1 = adc.read_ready_sample(Channel::One, &mut delay).unwrap();
        let ch2 = adc.read_ready_sample(Channel::Two, &mut delay).unwrap();
        let ch1_volts = ch1.voltage().unwrap_or(0.0);
        defmt::info!(
            "CH1 {=i16} ({=f32} V), CH2 {=i16} ({} V), config {=u8:08b}",
            ch1.code,
            ch1_volts,
            ch2.code,
            ch2.voltage(),
            ch2.config
        );

        if ch1_volts > LED_THRESHOLD_VOLTS {
            led_pin.set_high().unwrap();
        } else {
            led_pin.set_low().unwrap();
        }
        delay.delay_ms(1000);
    }
}
