//! The NTSC color palette: 128 luminance/hue combinations the VAC's color
//! generator can emit, indexed by the upper 7 bits of a color register.

/// A single RGBA pixel. The host owns whatever pixel format its display
/// surface actually needs; this is just the data this crate hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 0xFF }
    }
}

/// Looks up the display color for a raw VAC color/luminance byte. Only the
/// upper 7 bits are significant; the least-significant bit is ignored, as it
/// is on real hardware.
pub fn lookup(color_register: u8) -> Rgba {
    PALETTE[(color_register >> 1) as usize]
}

pub const PALETTE: [Rgba; 128] = [
    Rgba::new(0x00, 0x00, 0x00),
    Rgba::new(0x1A, 0x1A, 0x1A),
    Rgba::new(0x39, 0x39, 0x39),
    Rgba::new(0x58, 0x58, 0x58),
    Rgba::new(0x7E, 0x7E, 0x7E),
    Rgba::new(0xA2, 0xA2, 0xA2),
    Rgba::new(0xC7, 0xC7, 0xC7),
    Rgba::new(0xED, 0xED, 0xED),
    Rgba::new(0x19, 0x02, 0x00),
    Rgba::new(0x3A, 0x1F, 0x00),
    Rgba::new(0x5D, 0x41, 0x00),
    Rgba::new(0x82, 0x64, 0x00),
    Rgba::new(0xA7, 0x88, 0x00),
    Rgba::new(0xCC, 0xAD, 0x00),
    Rgba::new(0xF2, 0xD2, 0x19),
    Rgba::new(0xFE, 0xFA, 0x40),
    Rgba::new(0x37, 0x00, 0x00),
    Rgba::new(0x5E, 0x08, 0x00),
    Rgba::new(0x83, 0x27, 0x00),
    Rgba::new(0xA9, 0x49, 0x00),
    Rgba::new(0xCF, 0x6C, 0x00),
    Rgba::new(0xF5, 0x8F, 0x17),
    Rgba::new(0xFE, 0xB4, 0x38),
    Rgba::new(0xFE, 0xDF, 0x6F),
    Rgba::new(0x47, 0x00, 0x00),
    Rgba::new(0x73, 0x00, 0x00),
    Rgba::new(0x98, 0x13, 0x00),
    Rgba::new(0xBE, 0x32, 0x16),
    Rgba::new(0xE4, 0x53, 0x35),
    Rgba::new(0xFE, 0x76, 0x57),
    Rgba::new(0xFE, 0x9C, 0x81),
    Rgba::new(0xFE, 0xC6, 0xBB),
    Rgba::new(0x44, 0x00, 0x08),
    Rgba::new(0x6F, 0x00, 0x1F),
    Rgba::new(0x96, 0x06, 0x40),
    Rgba::new(0xBB, 0x24, 0x62),
    Rgba::new(0xE1, 0x45, 0x85),
    Rgba::new(0xFE, 0x67, 0xAA),
    Rgba::new(0xFE, 0x8C, 0xD6),
    Rgba::new(0xFE, 0xB7, 0xF6),
    Rgba::new(0x2D, 0x00, 0x4A),
    Rgba::new(0x57, 0x00, 0x67),
    Rgba::new(0x7D, 0x05, 0x8C),
    Rgba::new(0xA1, 0x22, 0xB1),
    Rgba::new(0xC7, 0x43, 0xD7),
    Rgba::new(0xED, 0x65, 0xFE),
    Rgba::new(0xFE, 0x8A, 0xF6),
    Rgba::new(0xFE, 0xB5, 0xF7),
    Rgba::new(0x0D, 0x00, 0x82),
    Rgba::new(0x33, 0x00, 0xA2),
    Rgba::new(0x55, 0x0F, 0xC9),
    Rgba::new(0x78, 0x2D, 0xF0),
    Rgba::new(0x9C, 0x4E, 0xFE),
    Rgba::new(0xC3, 0x72, 0xFE),
    Rgba::new(0xEB, 0x98, 0xFE),
    Rgba::new(0xFE, 0xC0, 0xF9),
    Rgba::new(0x00, 0x00, 0x91),
    Rgba::new(0x0A, 0x05, 0xBD),
    Rgba::new(0x28, 0x22, 0xE4),
    Rgba::new(0x48, 0x42, 0xFE),
    Rgba::new(0x6B, 0x64, 0xFE),
    Rgba::new(0x90, 0x8A, 0xFE),
    Rgba::new(0xB7, 0xB0, 0xFE),
    Rgba::new(0xDF, 0xD8, 0xFE),
    Rgba::new(0x00, 0x00, 0x72),
    Rgba::new(0x00, 0x1C, 0xAB),
    Rgba::new(0x03, 0x3C, 0xD6),
    Rgba::new(0x20, 0x5E, 0xFD),
    Rgba::new(0x40, 0x81, 0xFE),
    Rgba::new(0x64, 0xA6, 0xFE),
    Rgba::new(0x89, 0xCE, 0xFE),
    Rgba::new(0xB0, 0xF6, 0xFE),
    Rgba::new(0x00, 0x10, 0x3A),
    Rgba::new(0x00, 0x31, 0x6E),
    Rgba::new(0x00, 0x55, 0xA2),
    Rgba::new(0x05, 0x79, 0xC8),
    Rgba::new(0x23, 0x9D, 0xEE),
    Rgba::new(0x44, 0xC2, 0xFE),
    Rgba::new(0x68, 0xE9, 0xFE),
    Rgba::new(0x8F, 0xFE, 0xFE),
    Rgba::new(0x00, 0x1F, 0x02),
    Rgba::new(0x00, 0x43, 0x26),
    Rgba::new(0x00, 0x69, 0x57),
    Rgba::new(0x00, 0x8D, 0x7A),
    Rgba::new(0x1B, 0xB1, 0x9E),
    Rgba::new(0x3B, 0xD7, 0xC3),
    Rgba::new(0x5D, 0xFE, 0xE9),
    Rgba::new(0x86, 0xFE, 0xFE),
    Rgba::new(0x00, 0x24, 0x03),
    Rgba::new(0x00, 0x4A, 0x05),
    Rgba::new(0x00, 0x70, 0x0C),
    Rgba::new(0x09, 0x95, 0x2B),
    Rgba::new(0x28, 0xBA, 0x4C),
    Rgba::new(0x49, 0xE0, 0x6E),
    Rgba::new(0x6C, 0xFE, 0x92),
    Rgba::new(0x97, 0xFE, 0xB5),
    Rgba::new(0x00, 0x21, 0x02),
    Rgba::new(0x00, 0x46, 0x04),
    Rgba::new(0x08, 0x6B, 0x00),
    Rgba::new(0x28, 0x90, 0x00),
    Rgba::new(0x49, 0xB5, 0x09),
    Rgba::new(0x6B, 0xDB, 0x28),
    Rgba::new(0x8F, 0xFE, 0x49),
    Rgba::new(0xBB, 0xFE, 0x69),
    Rgba::new(0x00, 0x15, 0x01),
    Rgba::new(0x10, 0x36, 0x00),
    Rgba::new(0x30, 0x59, 0x00),
    Rgba::new(0x53, 0x7E, 0x00),
    Rgba::new(0x76, 0xA3, 0x00),
    Rgba::new(0x9A, 0xC8, 0x00),
    Rgba::new(0xBF, 0xEE, 0x1E),
    Rgba::new(0xE8, 0xFE, 0x3E),
    Rgba::new(0x1A, 0x02, 0x00),
    Rgba::new(0x3B, 0x1F, 0x00),
    Rgba::new(0x5E, 0x41, 0x00),
    Rgba::new(0x83, 0x64, 0x00),
    Rgba::new(0xA8, 0x88, 0x00),
    Rgba::new(0xCE, 0xAD, 0x00),
    Rgba::new(0xF4, 0xD2, 0x18),
    Rgba::new(0xFE, 0xFA, 0x40),
    Rgba::new(0x38, 0x00, 0x00),
    Rgba::new(0x5F, 0x08, 0x00),
    Rgba::new(0x84, 0x27, 0x00),
    Rgba::new(0xAA, 0x49, 0x00),
    Rgba::new(0xD0, 0x6B, 0x00),
    Rgba::new(0xF6, 0x8F, 0x18),
    Rgba::new(0xFE, 0xB4, 0x39),
    Rgba::new(0xFE, 0xDF, 0x70),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_128_entries() {
        assert_eq!(PALETTE.len(), 128);
    }

    #[test]
    fn lookup_ignores_the_low_bit() {
        assert_eq!(lookup(0x1C), lookup(0x1D));
        assert_eq!(lookup(0x1C), Rgba::new(0xF2, 0xD2, 0x19));
    }

    #[test]
    fn black_is_entry_zero() {
        assert_eq!(lookup(0x00), Rgba::new(0x00, 0x00, 0x00));
    }
}
