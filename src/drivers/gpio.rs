//! Push-pull GPIO output exposed through `embedded-hal` 1.0.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: configures the pin with `gpio_config` and drives it with
//! `gpio_set_level`.
//! On host/test: tracks the level in-memory only.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::Error;

pub struct OutputGpio {
    pin: i32,
    high: bool,
}

impl OutputGpio {
    /// Configure `pin` as an output, latched at `initial_high` before the
    /// driver is enabled so the pin never glitches to the wrong level.
    pub fn new(pin: i32, initial_high: bool) -> Result<Self, Error> {
        if !(0..40).contains(&pin) {
            return Err(Error::Init("GPIO number out of range"));
        }

        #[cfg(target_os = "espidf")]
        {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pin,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            // SAFETY: pin range checked above; called from the main task only.
            unsafe {
                gpio_set_level(pin, u32::from(initial_high));
                if gpio_config(&cfg) != ESP_OK as esp_err_t {
                    return Err(Error::Init("gpio_config failed"));
                }
                gpio_set_level(pin, u32::from(initial_high));
            }
        }

        log::debug!("GPIO{pin}: output, initial {}", if initial_high { "HIGH" } else { "LOW" });
        Ok(Self {
            pin,
            high: initial_high,
        })
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    fn write(&mut self, high: bool) {
        #[cfg(target_os = "espidf")]
        // SAFETY: the pin was configured as an output in `new`.
        unsafe {
            gpio_set_level(self.pin, u32::from(high));
        }
        self.high = high;
    }
}

impl ErrorType for OutputGpio {
    type Error = Infallible;
}

impl OutputPin for OutputGpio {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

impl StatefulOutputPin for OutputGpio {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}
