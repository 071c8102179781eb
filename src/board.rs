//! Board services: battery, boot id and status LED

/// Hardware services the node needs besides the radio
pub trait Board {
    /// Battery voltage in millivolts
    fn battery_millivolts(&mut self) -> u16;

    /// Random id chosen once per boot
    fn boot_id(&self) -> u8;

    /// Flashes the status LED for `ms` milliseconds
    fn led_pulse(&mut self, ms: u16);
}

/// Folds a 32-bit entropy word into a one-byte boot id
pub fn fold_boot_id(mix: u32) -> u8 {
    let mix = mix ^ (mix >> 16);
    let mix = mix ^ (mix >> 8);
    (mix & 0xFF) as u8
}

/// Board stand-in with settable battery level and recorded LED pulses
#[derive(Debug, Clone)]
pub struct SimBoard {
    pub battery_mv: u16,
    pub boot_id: u8,
    pub led_pulses: Vec<u16>,
}

impl SimBoard {
    pub fn new(boot_id: u8, battery_mv: u16) -> Self {
        SimBoard {
            battery_mv,
            boot_id,
            led_pulses: Vec::new(),
        }
    }

    /// Creates a board with a random boot id and a full battery
    pub fn random() -> Self {
        Self::new(fold_boot_id(rand::random()), 4100)
    }
}

impl Board for SimBoard {
    fn battery_millivolts(&mut self) -> u16 {
        self.battery_mv
    }

    fn boot_id(&self) -> u8 {
        self.boot_id
    }

    fn led_pulse(&mut self, ms: u16) {
        self.led_pulses.push(ms);
    }
}
