#![no_std]

pub mod gpio_pulse;
pub mod pwm_actuator;
pub mod usb;
