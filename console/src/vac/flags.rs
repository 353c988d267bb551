//! Bitmask constants for the VAC's control registers.

/// VSYNC bit 1 marks the start/end of vertical sync.
pub const VSYNC_ON: u8 = 0b0000_0010;

/// VBLANK bit 1 suppresses visible output; bit 6 latches INPT4/INPT5.
pub const VBLANK_BLANK: u8 = 0b0000_0010;
pub const VBLANK_LATCH_INPUTS: u8 = 0b0100_0000;

/// CTRLPF bit 0 selects playfield reflection (1) vs repeat (0) for the
/// right half of the line.
pub const CTRLPF_REFLECT: u8 = 0b0000_0001;
/// CTRLPF bit 1 enables score-mode coloring of the playfield.
pub const CTRLPF_SCORE_MODE: u8 = 0b0000_0010;
/// CTRLPF bit 2 gives the playfield and ball priority over the players.
pub const CTRLPF_PRIORITY: u8 = 0b0000_0100;
/// CTRLPF bits 4-5 select the ball's width, 2^n color clocks.
pub const CTRLPF_BALL_SIZE_SHIFT: u8 = 4;
pub const CTRLPF_BALL_SIZE_MASK: u8 = 0b0011_0000;

/// REFPx bit 3 reflects a player's graphics pattern.
pub const REFPX_REFLECT: u8 = 0b0000_1000;

/// NUSIZx bits 0-2 select the replication/size pattern for a player and its
/// paired missile; bits 4-5 select the missile's width, 2^n color clocks.
pub const NUSIZ_SELECT_MASK: u8 = 0b0000_0111;
pub const NUSIZ_MISSILE_SIZE_SHIFT: u8 = 4;
pub const NUSIZ_MISSILE_SIZE_MASK: u8 = 0b0011_0000;

/// ENAMx/ENABL bit 1 enables the object.
pub const ENABLE: u8 = 0b0000_0010;

/// VDELPx/VDELBL bit 0 enables vertical delay.
pub const VDEL_ENABLE: u8 = 0b0000_0001;

/// RESMPx bit 1 locks a missile to the center of its paired player.
pub const RESMP_LOCK: u8 = 0b0000_0010;

/// Collision latch read registers report their state in bits 6-7.
pub const COLLISION_BIT7: u8 = 0b1000_0000;
pub const COLLISION_BIT6: u8 = 0b0100_0000;

/// INPTx bit 7 reports the paddle/button state; bit 7 set means released.
pub const INPT_HIGH: u8 = 0b1000_0000;
