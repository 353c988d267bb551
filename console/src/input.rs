//! Host-facing input: the two joystick ports and the console's panel
//! switches, decoupled from the bit layout the RIOT and VAC expose on their
//! own register files.

/// Bit layout the RIOT's `SWCHA` register uses: one nibble per joystick,
/// each bit active-low (0 = direction held).
const UP0: u8 = 0b0001_0000;
const DOWN0: u8 = 0b0010_0000;
const LEFT0: u8 = 0b0100_0000;
const RIGHT0: u8 = 0b1000_0000;
const UP1: u8 = 0b0000_0001;
const DOWN1: u8 = 0b0000_0010;
const LEFT1: u8 = 0b0000_0100;
const RIGHT1: u8 = 0b0000_1000;

/// Bit layout the RIOT's `SWCHB` register uses for the console's panel
/// switches, also active-low for the two difficulty switches.
const RESET: u8 = 0b0000_0001;
const SELECT: u8 = 0b0000_0010;
const COLOR: u8 = 0b0000_1000;
const DIFFICULTY1: u8 = 0b0100_0000;
const DIFFICULTY0: u8 = 0b1000_0000;

#[derive(Debug, Clone, Copy, Default)]
pub struct Joystick {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ConsoleSwitches {
    pub reset_pressed: bool,
    pub select_pressed: bool,
    pub color: bool,
    pub difficulty0_amateur: bool,
    pub difficulty1_amateur: bool,
}

impl Default for ConsoleSwitches {
    fn default() -> Self {
        ConsoleSwitches {
            reset_pressed: false,
            select_pressed: false,
            color: true,
            difficulty0_amateur: true,
            difficulty1_amateur: true,
        }
    }
}

/// A snapshot of everything the host can change about the machine's
/// controls between frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub port0: Joystick,
    pub port1: Joystick,
    pub switches: ConsoleSwitches,
}

impl InputState {
    /// Packs both joysticks' directions into the byte `SWCHA` expects.
    pub fn swcha_bits(&self) -> u8 {
        let mut bits = 0xFF;
        if self.port0.up {
            bits &= !UP0;
        }
        if self.port0.down {
            bits &= !DOWN0;
        }
        if self.port0.left {
            bits &= !LEFT0;
        }
        if self.port0.right {
            bits &= !RIGHT0;
        }
        if self.port1.up {
            bits &= !UP1;
        }
        if self.port1.down {
            bits &= !DOWN1;
        }
        if self.port1.left {
            bits &= !LEFT1;
        }
        if self.port1.right {
            bits &= !RIGHT1;
        }
        bits
    }

    /// Packs the console's panel switches into the byte `SWCHB` expects.
    pub fn swchb_bits(&self) -> u8 {
        let mut bits = 0xFF;
        if self.switches.reset_pressed {
            bits &= !RESET;
        }
        if self.switches.select_pressed {
            bits &= !SELECT;
        }
        if !self.switches.color {
            bits &= !COLOR;
        }
        if self.switches.difficulty0_amateur {
            bits &= !DIFFICULTY0;
        }
        if self.switches.difficulty1_amateur {
            bits &= !DIFFICULTY1;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_state_holds_every_line_high() {
        let state = InputState::default();
        assert_eq!(state.swcha_bits(), 0xFF);
    }

    #[test]
    fn port0_left_clears_its_bit_only() {
        let mut state = InputState::default();
        state.port0.left = true;
        assert_eq!(state.swcha_bits(), !LEFT0);
    }

    #[test]
    fn port1_fire_does_not_touch_swcha() {
        let mut state = InputState::default();
        state.port1.fire = true;
        assert_eq!(state.swcha_bits(), 0xFF);
    }

    #[test]
    fn reset_press_clears_its_switch_bit() {
        let mut state = InputState::default();
        state.switches.reset_pressed = true;
        assert_eq!(state.swchb_bits(), !RESET);
    }

    #[test]
    fn default_difficulty_is_amateur_on_both_ports() {
        let state = InputState::default();
        assert_eq!(state.swchb_bits() & DIFFICULTY0, 0);
        assert_eq!(state.swchb_bits() & DIFFICULTY1, 0);
    }
}
