//! The video/audio/input coprocessor: a beam-racing pixel generator with
//! five movable objects (two players, two missiles, one ball), a
//! bit-addressed playfield, collision detection, and six analog input
//! latches. Register writes recompute the relevant object's line mask
//! immediately rather than deferring the work to the point a pixel is drawn.

pub mod flags;
pub mod registers;

use crate::colors::{self, Rgba};
use cpu6507::memory::{Inspect, Read, ReadResult, Write, WriteResult};

/// Color clocks per scanline: 68 of horizontal blank/sync, 160 visible.
const CLOCKS_PER_LINE: u16 = 228;
const HBLANK_CLOCKS: u16 = 68;
const VISIBLE_WIDTH: usize = 160;

/// NUSIZx/CTRLPF copy-spacing table, shared by players and their paired
/// missiles. Each entry is the set of pixel offsets, relative to an object's
/// own position, at which a further copy is drawn.
fn copy_offsets(select: u8) -> &'static [i16] {
    match select & flags::NUSIZ_SELECT_MASK {
        0 => &[0],
        1 => &[0, 16],
        2 => &[0, 32],
        3 => &[0, 16, 32],
        4 => &[0, 64],
        5 => &[0],
        6 => &[0, 32, 64],
        7 => &[0],
        _ => unreachable!("masked to 3 bits"),
    }
}

/// Width multiplier implied by a player's own NUSIZx selector: normal size
/// for every selector except the two "stretched" single-copy variants.
fn player_width(select: u8) -> u8 {
    match select & flags::NUSIZ_SELECT_MASK {
        5 => 2,
        7 => 4,
        _ => 1,
    }
}

fn paint_copies(mask: &mut [bool; VISIBLE_WIDTH], position: u8, offsets: &[i16], width: u8, pattern: u8, reflect: bool) {
    for &offset in offsets {
        let base = position as i16 + offset;
        for bit in 0..8u8 {
            let set = if reflect {
                pattern & (1 << bit) != 0
            } else {
                pattern & (1 << (7 - bit)) != 0
            };
            if !set {
                continue;
            }
            for w in 0..width as i16 {
                let x = base + bit as i16 * width as i16 + w;
                let x = x.rem_euclid(VISIBLE_WIDTH as i16) as usize;
                mask[x] = true;
            }
        }
    }
}

#[derive(Debug)]
struct Player {
    new: u8,
    old: u8,
    reflect: bool,
    nusiz: u8,
    color: u8,
    position: u8,
    motion: i8,
    vdel: bool,
    mask: [bool; VISIBLE_WIDTH],
}

impl Default for Player {
    fn default() -> Self {
        Player {
            new: 0,
            old: 0,
            reflect: false,
            nusiz: 0,
            color: 0,
            position: 0,
            motion: 0,
            vdel: false,
            mask: [false; VISIBLE_WIDTH],
        }
    }
}

impl Player {
    fn graphics(&self) -> u8 {
        if self.vdel {
            self.old
        } else {
            self.new
        }
    }

    fn recompute_mask(&mut self) {
        let mut mask = [false; VISIBLE_WIDTH];
        let offsets = copy_offsets(self.nusiz);
        let width = player_width(self.nusiz);
        paint_copies(&mut mask, self.position, offsets, width, self.graphics(), self.reflect);
        self.mask = mask;
    }
}

#[derive(Debug)]
struct Missile {
    enabled: bool,
    nusiz: u8,
    color: u8,
    position: u8,
    motion: i8,
    mask: [bool; VISIBLE_WIDTH],
}

impl Default for Missile {
    fn default() -> Self {
        Missile {
            enabled: false,
            nusiz: 0,
            color: 0,
            position: 0,
            motion: 0,
            mask: [false; VISIBLE_WIDTH],
        }
    }
}

impl Missile {
    fn width(&self) -> u8 {
        1 << ((self.nusiz & flags::NUSIZ_MISSILE_SIZE_MASK) >> flags::NUSIZ_MISSILE_SIZE_SHIFT)
    }

    fn recompute_mask(&mut self) {
        let mut mask = [false; VISIBLE_WIDTH];
        if self.enabled {
            let offsets = copy_offsets(self.nusiz);
            let width = self.width();
            paint_copies(&mut mask, self.position, offsets, width, 0xFF, false);
        }
        self.mask = mask;
    }
}

#[derive(Debug)]
struct Ball {
    enabled: bool,
    shadow_enabled: bool,
    vdel: bool,
    width_select: u8,
    position: u8,
    motion: i8,
    mask: [bool; VISIBLE_WIDTH],
}

impl Default for Ball {
    fn default() -> Self {
        Ball {
            enabled: false,
            shadow_enabled: false,
            vdel: false,
            width_select: 0,
            position: 0,
            motion: 0,
            mask: [false; VISIBLE_WIDTH],
        }
    }
}

impl Ball {
    fn width(&self) -> u8 {
        1 << self.width_select
    }

    fn recompute_mask(&mut self) {
        let mut mask = [false; VISIBLE_WIDTH];
        if self.enabled {
            let width = self.width() as i16;
            for w in 0..width {
                let x = (self.position as i16 + w).rem_euclid(VISIBLE_WIDTH as i16) as usize;
                mask[x] = true;
            }
        }
        self.mask = mask;
    }
}

/// The fifteen sticky collision latches, packed two-per-byte into the eight
/// `CXM0P`..`CXPPMM` read registers. Cleared only by the `CXCLR` strobe.
#[derive(Debug, Default)]
struct Collisions {
    m0_p1: bool,
    m0_p0: bool,
    m1_p0: bool,
    m1_p1: bool,
    p0_pf: bool,
    p0_bl: bool,
    p1_pf: bool,
    p1_bl: bool,
    m0_pf: bool,
    m0_bl: bool,
    m1_pf: bool,
    m1_bl: bool,
    bl_pf: bool,
    p0_p1: bool,
    m0_m1: bool,
}

impl Collisions {
    fn clear(&mut self) {
        *self = Collisions::default();
    }

    fn read(&self, register: u16) -> u8 {
        let (bit7, bit6) = match register {
            registers::CXM0P => (self.m0_p1, self.m0_p0),
            registers::CXM1P => (self.m1_p0, self.m1_p1),
            registers::CXP0FB => (self.p0_pf, self.p0_bl),
            registers::CXP1FB => (self.p1_pf, self.p1_bl),
            registers::CXM0FB => (self.m0_pf, self.m0_bl),
            registers::CXM1FB => (self.m1_pf, self.m1_bl),
            registers::CXBLPF => (self.bl_pf, false),
            registers::CXPPMM => (self.p0_p1, self.m0_m1),
            _ => (false, false),
        };
        (if bit7 { flags::COLLISION_BIT7 } else { 0 }) | (if bit6 { flags::COLLISION_BIT6 } else { 0 })
    }
}

/// Button/paddle input latches. Only the two joystick fire buttons
/// (`INPT4`/`INPT5`) have a host-facing input path; the four paddle
/// potentiometer ports always read as released, since this system has no
/// paddle controller model.
#[derive(Debug, Default)]
struct Inputs {
    fire0_pressed: bool,
    fire1_pressed: bool,
    latched: bool,
}

impl Inputs {
    fn read(&self, register: u16) -> u8 {
        match register {
            registers::INPT4 => {
                if self.fire0_pressed {
                    0
                } else {
                    flags::INPT_HIGH
                }
            }
            registers::INPT5 => {
                if self.fire1_pressed {
                    0
                } else {
                    flags::INPT_HIGH
                }
            }
            _ => flags::INPT_HIGH,
        }
    }
}

#[derive(Debug)]
pub struct Vac {
    color_clock: u16,
    wsync_requested: bool,
    vsync: bool,
    line: [Rgba; VISIBLE_WIDTH],
    vblank: u8,
    ctrlpf: u8,
    colup0: u8,
    colup1: u8,
    colupf: u8,
    colubk: u8,
    pf0: u8,
    pf1: u8,
    pf2: u8,
    playfield: [bool; VISIBLE_WIDTH],
    player0: Player,
    player1: Player,
    missile0: Missile,
    missile1: Missile,
    ball: Ball,
    collisions: Collisions,
    inputs: Inputs,
}

impl Default for Vac {
    fn default() -> Self {
        Vac {
            color_clock: 0,
            wsync_requested: false,
            vsync: false,
            line: [Rgba::default(); VISIBLE_WIDTH],
            vblank: 0,
            ctrlpf: 0,
            colup0: 0,
            colup1: 0,
            colupf: 0,
            colubk: 0,
            pf0: 0,
            pf1: 0,
            pf2: 0,
            playfield: [false; VISIBLE_WIDTH],
            player0: Player::default(),
            player1: Player::default(),
            missile0: Missile::default(),
            missile1: Missile::default(),
            ball: Ball::default(),
            collisions: Collisions::default(),
            inputs: Inputs::default(),
        }
    }
}

impl Vac {
    pub fn new() -> Self {
        Vac::default()
    }

    /// Current position within the 228-color-clock scanline. Exposed so the
    /// system orchestrator can detect when `WSYNC` should release the CPU.
    pub fn color_clock(&self) -> u16 {
        self.color_clock
    }

    /// Whether `VSYNC` is currently asserted. The system orchestrator watches
    /// for the falling edge of this to delimit frames.
    pub fn vsync_active(&self) -> bool {
        self.vsync
    }

    pub fn set_fire_buttons(&mut self, port0_pressed: bool, port1_pressed: bool) {
        self.inputs.fire0_pressed = port0_pressed;
        self.inputs.fire1_pressed = port1_pressed;
    }

    /// Takes this scanline's accumulated pixel row and resets it to black.
    /// The system orchestrator calls this once per line, after deciding
    /// whether the line falls within the visible picture area.
    pub fn take_line(&mut self) -> [Rgba; VISIBLE_WIDTH] {
        std::mem::replace(&mut self.line, [Rgba::default(); VISIBLE_WIDTH])
    }

    /// Consumes a pending `WSYNC` strobe, if the CPU issued one since the
    /// last call. The system orchestrator uses this to decide whether to
    /// keep stalling the CPU.
    pub fn take_wsync_request(&mut self) -> bool {
        std::mem::take(&mut self.wsync_requested)
    }

    /// Advances one color clock, returning the pixel color if this clock
    /// falls within the 160 visible columns. The pixel, if any, is also
    /// latched into this scanline's line buffer for [`Vac::take_line`].
    pub fn tick(&mut self) -> Option<Rgba> {
        let pixel = if self.color_clock >= HBLANK_CLOCKS {
            let x = (self.color_clock - HBLANK_CLOCKS) as usize;
            let blanked = self.vblank & flags::VBLANK_BLANK != 0;
            let color = self.sample(x);
            if blanked {
                None
            } else {
                self.line[x] = color;
                Some(color)
            }
        } else {
            None
        };
        self.color_clock += 1;
        if self.color_clock >= CLOCKS_PER_LINE {
            self.color_clock = 0;
        }
        pixel
    }

    fn sample(&mut self, x: usize) -> Rgba {
        let p0 = self.player0.mask[x];
        let p1 = self.player1.mask[x];
        let m0 = self.missile0.mask[x];
        let m1 = self.missile1.mask[x];
        let bl = self.ball.mask[x];
        let pf = self.playfield[x];

        if m0 && p1 {
            self.collisions.m0_p1 = true;
        }
        if m0 && p0 {
            self.collisions.m0_p0 = true;
        }
        if m1 && p0 {
            self.collisions.m1_p0 = true;
        }
        if m1 && p1 {
            self.collisions.m1_p1 = true;
        }
        if p0 && pf {
            self.collisions.p0_pf = true;
        }
        if p0 && bl {
            self.collisions.p0_bl = true;
        }
        if p1 && pf {
            self.collisions.p1_pf = true;
        }
        if p1 && bl {
            self.collisions.p1_bl = true;
        }
        if m0 && pf {
            self.collisions.m0_pf = true;
        }
        if m0 && bl {
            self.collisions.m0_bl = true;
        }
        if m1 && pf {
            self.collisions.m1_pf = true;
        }
        if m1 && bl {
            self.collisions.m1_bl = true;
        }
        if bl && pf {
            self.collisions.bl_pf = true;
        }
        if p0 && p1 {
            self.collisions.p0_p1 = true;
        }
        if m0 && m1 {
            self.collisions.m0_m1 = true;
        }

        let playfield_color = if self.ctrlpf & flags::CTRLPF_SCORE_MODE != 0 {
            if x < 80 {
                self.colup0
            } else {
                self.colup1
            }
        } else {
            self.colupf
        };

        let player_group = if p0 || m0 {
            Some(self.colup0)
        } else if p1 || m1 {
            Some(self.colup1)
        } else {
            None
        };
        let field_group = if bl {
            Some(self.colupf)
        } else if pf {
            Some(playfield_color)
        } else {
            None
        };

        let color = if self.ctrlpf & flags::CTRLPF_PRIORITY != 0 {
            field_group.or(player_group).unwrap_or(self.colubk)
        } else {
            player_group.or(field_group).unwrap_or(self.colubk)
        };
        colors::lookup(color)
    }

    fn recompute_playfield(&mut self) {
        let pattern = (self.pf0 as u32 >> 4)
            | ((self.pf1.reverse_bits() as u32) << 4)
            | ((self.pf2 as u32) << 12);
        let reflect = self.ctrlpf & flags::CTRLPF_REFLECT != 0;
        let mut mask = [false; VISIBLE_WIDTH];
        for (x, slot) in mask.iter_mut().enumerate() {
            let cell = if x < 80 {
                x / 4
            } else if reflect {
                19 - (x - 80) / 4
            } else {
                (x - 80) / 4
            };
            *slot = (pattern >> cell) & 1 != 0;
        }
        self.playfield = mask;
    }

    /// `HMOVE` outside horizontal sync produces artifacts on real hardware;
    /// this implementation suppresses the effect entirely rather than
    /// replicating them.
    fn apply_motion(&mut self) {
        if self.color_clock >= HBLANK_CLOCKS {
            return;
        }
        fn moved(position: u8, motion: i8) -> u8 {
            (position as i16 - motion as i16).rem_euclid(VISIBLE_WIDTH as i16) as u8
        }
        self.player0.position = moved(self.player0.position, self.player0.motion);
        self.player1.position = moved(self.player1.position, self.player1.motion);
        self.missile0.position = moved(self.missile0.position, self.missile0.motion);
        self.missile1.position = moved(self.missile1.position, self.missile1.motion);
        self.ball.position = moved(self.ball.position, self.ball.motion);
        self.player0.recompute_mask();
        self.player1.recompute_mask();
        self.missile0.recompute_mask();
        self.missile1.recompute_mask();
        self.ball.recompute_mask();
    }

    /// `RESPx`/`RESMx`/`RESBL` share this rule: snap to the start of the
    /// visible region if struck during horizontal sync, otherwise to the
    /// current position minus a fixed decode delay (zero for players, two
    /// color clocks for missiles and the ball).
    fn reset_position(&self, extra_delay: i16) -> u8 {
        if self.color_clock < HBLANK_CLOCKS {
            0
        } else {
            (self.color_clock as i16 - HBLANK_CLOCKS as i16 - extra_delay)
                .rem_euclid(VISIBLE_WIDTH as i16) as u8
        }
    }
}

fn signed_nibble(value: u8) -> i8 {
    // HMxx registers hold a signed motion value in the upper nibble, in
    // two's complement, range -8..7.
    ((value & 0xF0) as i8) >> 4
}

impl Inspect for Vac {
    fn inspect(&self, address: u16) -> ReadResult {
        Ok(match address & 0x0F {
            registers::CXM0P => self.collisions.read(registers::CXM0P),
            registers::CXM1P => self.collisions.read(registers::CXM1P),
            registers::CXP0FB => self.collisions.read(registers::CXP0FB),
            registers::CXP1FB => self.collisions.read(registers::CXP1FB),
            registers::CXM0FB => self.collisions.read(registers::CXM0FB),
            registers::CXM1FB => self.collisions.read(registers::CXM1FB),
            registers::CXBLPF => self.collisions.read(registers::CXBLPF),
            registers::CXPPMM => self.collisions.read(registers::CXPPMM),
            registers::INPT0 => self.inputs.read(registers::INPT0),
            registers::INPT1 => self.inputs.read(registers::INPT1),
            registers::INPT2 => self.inputs.read(registers::INPT2),
            registers::INPT3 => self.inputs.read(registers::INPT3),
            registers::INPT4 => self.inputs.read(registers::INPT4),
            registers::INPT5 => self.inputs.read(registers::INPT5),
            _ => 0,
        })
    }
}

impl Read for Vac {
    fn read(&mut self, address: u16) -> ReadResult {
        self.inspect(address)
    }
}

impl Write for Vac {
    fn write(&mut self, address: u16, value: u8) -> WriteResult {
        match address & 0x3F {
            registers::VSYNC => {
                self.vsync = value & flags::VSYNC_ON != 0;
                if self.ball.vdel {
                    self.ball.enabled = self.ball.shadow_enabled;
                    self.ball.recompute_mask();
                }
            }
            registers::VBLANK => self.vblank = value,
            registers::WSYNC => self.wsync_requested = true,
            registers::RSYNC => self.color_clock = 0,
            registers::NUSIZ0 => {
                self.player0.nusiz = value;
                self.missile0.nusiz = value;
                self.player0.recompute_mask();
                self.missile0.recompute_mask();
            }
            registers::NUSIZ1 => {
                self.player1.nusiz = value;
                self.missile1.nusiz = value;
                self.player1.recompute_mask();
                self.missile1.recompute_mask();
            }
            registers::COLUP0 => self.colup0 = value,
            registers::COLUP1 => self.colup1 = value,
            registers::COLUPF => self.colupf = value,
            registers::COLUBK => self.colubk = value,
            registers::CTRLPF => {
                self.ctrlpf = value;
                self.ball.width_select = (value & flags::CTRLPF_BALL_SIZE_MASK) >> flags::CTRLPF_BALL_SIZE_SHIFT;
                self.recompute_playfield();
                self.ball.recompute_mask();
            }
            registers::REFP0 => {
                self.player0.reflect = value & flags::REFPX_REFLECT != 0;
                self.player0.recompute_mask();
            }
            registers::REFP1 => {
                self.player1.reflect = value & flags::REFPX_REFLECT != 0;
                self.player1.recompute_mask();
            }
            registers::PF0 => {
                self.pf0 = value;
                self.recompute_playfield();
            }
            registers::PF1 => {
                self.pf1 = value;
                self.recompute_playfield();
            }
            registers::PF2 => {
                self.pf2 = value;
                self.recompute_playfield();
            }
            registers::RESP0 => {
                self.player0.position = self.reset_position(0);
                self.player0.motion = 0;
                self.player0.recompute_mask();
            }
            registers::RESP1 => {
                self.player1.position = self.reset_position(0);
                self.player1.motion = 0;
                self.player1.recompute_mask();
            }
            registers::RESM0 => {
                self.missile0.position = self.reset_position(2);
                self.missile0.motion = 0;
                self.missile0.recompute_mask();
            }
            registers::RESM1 => {
                self.missile1.position = self.reset_position(2);
                self.missile1.motion = 0;
                self.missile1.recompute_mask();
            }
            registers::RESBL => {
                self.ball.position = self.reset_position(2);
                self.ball.motion = 0;
                self.ball.recompute_mask();
            }
            registers::AUDC0 | registers::AUDC1 | registers::AUDF0 | registers::AUDF1 | registers::AUDV0 | registers::AUDV1 => {
                // Audio generation is out of scope; these registers are
                // accepted as plain latches so programs that write them do
                // not observe a memory error.
            }
            registers::GRP0 => {
                self.player0.new = value;
                self.player1.old = self.player1.new;
                self.player0.recompute_mask();
                self.player1.recompute_mask();
            }
            registers::GRP1 => {
                self.player1.new = value;
                self.player0.old = self.player0.new;
                self.player0.recompute_mask();
                self.player1.recompute_mask();
            }
            registers::ENAM0 => {
                self.missile0.enabled = value & flags::ENABLE != 0;
                self.missile0.recompute_mask();
            }
            registers::ENAM1 => {
                self.missile1.enabled = value & flags::ENABLE != 0;
                self.missile1.recompute_mask();
            }
            registers::ENABL => {
                let enabled = value & flags::ENABLE != 0;
                self.ball.shadow_enabled = enabled;
                if !self.ball.vdel {
                    self.ball.enabled = enabled;
                }
                self.ball.recompute_mask();
            }
            registers::HMP0 => self.player0.motion = signed_nibble(value),
            registers::HMP1 => self.player1.motion = signed_nibble(value),
            registers::HMM0 => self.missile0.motion = signed_nibble(value),
            registers::HMM1 => self.missile1.motion = signed_nibble(value),
            registers::HMBL => self.ball.motion = signed_nibble(value),
            registers::VDELP0 => self.player0.vdel = value & flags::VDEL_ENABLE != 0,
            registers::VDELP1 => self.player1.vdel = value & flags::VDEL_ENABLE != 0,
            registers::VDELBL => self.ball.vdel = value & flags::VDEL_ENABLE != 0,
            registers::RESMP0 => {
                if value & flags::RESMP_LOCK != 0 {
                    self.missile0.position = self.player0.position;
                    self.missile0.recompute_mask();
                }
            }
            registers::RESMP1 => {
                if value & flags::RESMP_LOCK != 0 {
                    self.missile1.position = self.player1.position;
                    self.missile1.recompute_mask();
                }
            }
            registers::HMOVE => self.apply_motion(),
            registers::HMCLR => {
                self.player0.motion = 0;
                self.player1.motion = 0;
                self.missile0.motion = 0;
                self.missile1.motion = 0;
                self.ball.motion = 0;
            }
            registers::CXCLR => self.collisions.clear(),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enable_player0(vac: &mut Vac, pattern: u8, position_clock: u16) {
        vac.color_clock = position_clock;
        vac.write(registers::RESP0, 0).unwrap();
        vac.write(registers::GRP0, pattern).unwrap();
    }

    #[test]
    fn playfield_left_half_reads_pf0_high_nibble_first() {
        let mut vac = Vac::new();
        vac.write(registers::PF0, 0b1111_0000).unwrap();
        vac.write(registers::PF1, 0).unwrap();
        vac.write(registers::PF2, 0).unwrap();
        assert!(vac.playfield[0]);
        assert!(vac.playfield[15]);
        assert!(!vac.playfield[16]);
    }

    #[test]
    fn playfield_right_half_repeats_without_reflect() {
        let mut vac = Vac::new();
        vac.write(registers::PF0, 0b1111_0000).unwrap();
        vac.write(registers::CTRLPF, 0).unwrap();
        assert!(vac.playfield[80]);
        assert!(vac.playfield[95]);
    }

    #[test]
    fn playfield_right_half_mirrors_with_reflect() {
        let mut vac = Vac::new();
        vac.write(registers::PF2, 0b1000_0000).unwrap();
        vac.write(registers::CTRLPF, flags::CTRLPF_REFLECT).unwrap();
        // PF2's bit 7 is the last cell (index 19) of the left half, which
        // under reflection becomes the first cell of the right half.
        assert!(vac.playfield[80]);
        assert!(!vac.playfield[84]);
    }

    #[test]
    fn resp0_then_grp0_lights_up_the_expected_column() {
        let mut vac = Vac::new();
        enable_player0(&mut vac, 0b1000_0000, HBLANK_CLOCKS + 10);
        assert!(vac.player0.mask[10]);
        assert!(!vac.player0.mask[11]);
    }

    #[test]
    fn double_width_nusiz_widens_each_graphics_bit() {
        let mut vac = Vac::new();
        vac.write(registers::NUSIZ0, 5).unwrap();
        enable_player0(&mut vac, 0b1000_0000, HBLANK_CLOCKS + 10);
        assert!(vac.player0.mask[10]);
        assert!(vac.player0.mask[11]);
        assert!(!vac.player0.mask[12]);
    }

    #[test]
    fn vdelp_promotes_the_shadow_only_on_the_other_players_write() {
        let mut vac = Vac::new();
        vac.write(registers::VDELP1, flags::VDEL_ENABLE).unwrap();
        vac.write(registers::GRP1, 0b1010_1010).unwrap();
        // Player 1's VDEL is set, so this new pattern should not yet be
        // visible; it only becomes visible once GRP0 is written.
        assert_eq!(vac.player1.graphics(), 0);
        vac.write(registers::GRP0, 0x00).unwrap();
        assert_eq!(vac.player1.graphics(), 0b1010_1010);
    }

    #[test]
    fn vdelbl_holds_the_enable_until_the_next_vsync() {
        let mut vac = Vac::new();
        vac.write(registers::VDELBL, flags::VDEL_ENABLE).unwrap();
        vac.write(registers::ENABL, flags::ENABLE).unwrap();
        assert!(!vac.ball.enabled);
        vac.write(registers::VSYNC, 0).unwrap();
        assert!(vac.ball.enabled);
    }

    #[test]
    fn collisions_latch_and_clear() {
        let mut vac = Vac::new();
        enable_player0(&mut vac, 0b1000_0000, HBLANK_CLOCKS);
        vac.write(registers::NUSIZ1, 0).unwrap();
        vac.color_clock = HBLANK_CLOCKS;
        vac.write(registers::RESP1, 0).unwrap();
        vac.write(registers::GRP1, 0b1000_0000).unwrap();
        let _ = vac.sample(0);
        assert_eq!(vac.inspect(registers::CXPPMM).unwrap() & flags::COLLISION_BIT7, flags::COLLISION_BIT7);
        vac.write(registers::CXCLR, 0).unwrap();
        assert_eq!(vac.inspect(registers::CXPPMM).unwrap(), 0);
    }

    #[test]
    fn unpressed_fire_buttons_read_high() {
        let vac = Vac::new();
        assert_eq!(vac.inspect(registers::INPT4).unwrap(), flags::INPT_HIGH);
    }

    #[test]
    fn pressed_fire_button_reads_low() {
        let mut vac = Vac::new();
        vac.set_fire_buttons(true, false);
        assert_eq!(vac.inspect(registers::INPT4).unwrap(), 0);
        assert_eq!(vac.inspect(registers::INPT5).unwrap(), flags::INPT_HIGH);
    }

    #[test]
    fn tick_advances_and_wraps_the_color_clock() {
        let mut vac = Vac::new();
        for _ in 0..CLOCKS_PER_LINE {
            vac.tick();
        }
        assert_eq!(vac.color_clock(), 0);
    }

    #[test]
    fn vblank_suppresses_visible_pixels() {
        let mut vac = Vac::new();
        vac.write(registers::VBLANK, flags::VBLANK_BLANK).unwrap();
        vac.color_clock = HBLANK_CLOCKS;
        assert!(vac.tick().is_none());
    }
}
