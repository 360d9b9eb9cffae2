//! Sensor power-down and reset lines on the host GPIO header

use rppal::gpio::Gpio;
use std::thread;
use std::time::Duration;

use super::CameraError;
use crate::config::PinMap;

const RESET_PULSE: Duration = Duration::from_millis(10);
const RESET_SETTLE: Duration = Duration::from_millis(20);

/// Powers the sensor up and performs a hardware reset where the lines are
/// wired. Pins keep their levels after this returns.
pub fn prepare_sensor(pins: &PinMap) -> Result<(), CameraError> {
    if pins.pwdn.is_none() && pins.reset.is_none() {
        return Ok(());
    }

    let gpio = Gpio::new()?;

    // PWDN is active high
    if let Some(pwdn) = pins.pwdn {
        let mut pin = gpio.get(pwdn)?.into_output();
        pin.set_reset_on_drop(false);
        pin.set_low();
        log::debug!(target: "camera", "PWDN on GPIO {} driven low", pwdn);
    }

    // RESET is active low
    if let Some(reset) = pins.reset {
        let mut pin = gpio.get(reset)?.into_output();
        pin.set_reset_on_drop(false);
        pin.set_low();
        thread::sleep(RESET_PULSE);
        pin.set_high();
        thread::sleep(RESET_SETTLE);
        log::info!(target: "camera", "Sensor reset via GPIO {}", reset);
    }

    Ok(())
}
