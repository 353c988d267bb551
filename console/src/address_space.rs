//! The memory-map dispatcher: bit-masks the 6507's 16-bit address bus down
//! to 13 significant bits and routes the access to the VAC register file,
//! RIOT RAM/peripherals, or the cartridge.

use crate::cartridge::Cartridge;
use crate::riot::Riot;
use crate::vac::Vac;
use cpu6507::memory::{Inspect, Memory, Read, ReadResult, Write, WriteResult};

const ADDRESS_MASK: u16 = 0x1FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryArea {
    Vac,
    RiotRam,
    RiotRegisters,
    Cartridge,
    Unmapped,
}

fn map_address(address: u16) -> MemoryArea {
    let address = address & ADDRESS_MASK;
    if address & 0x1000 != 0 {
        MemoryArea::Cartridge
    } else if address < 0x0080 {
        MemoryArea::Vac
    } else if (0x0080..=0x00FF).contains(&address) || (0x0180..=0x01FF).contains(&address) {
        MemoryArea::RiotRam
    } else if (0x0280..=0x0297).contains(&address) || (0x0380..=0x0397).contains(&address) {
        MemoryArea::RiotRegisters
    } else {
        MemoryArea::Unmapped
    }
}

/// Owns the whole addressable system: VAC, RIOT, and cartridge. The CPU
/// operates against this as its `Memory`.
#[derive(Debug)]
pub struct AddressSpace {
    pub vac: Vac,
    pub riot: Riot,
    pub cartridge: Cartridge,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            vac: Vac::new(),
            riot: Riot::new(),
            cartridge: Cartridge::new(),
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspect for AddressSpace {
    fn inspect(&self, address: u16) -> ReadResult {
        let masked = address & ADDRESS_MASK;
        match map_address(address) {
            MemoryArea::Vac => self.vac.inspect(masked),
            MemoryArea::RiotRam | MemoryArea::RiotRegisters => self.riot.inspect(masked),
            MemoryArea::Cartridge => Ok(self.cartridge.read(masked & 0x0FFF)),
            MemoryArea::Unmapped => Ok(0),
        }
    }
}

impl Read for AddressSpace {
    fn read(&mut self, address: u16) -> ReadResult {
        let masked = address & ADDRESS_MASK;
        Ok(match map_address(address) {
            MemoryArea::Vac => self.vac.read(masked)?,
            MemoryArea::RiotRam | MemoryArea::RiotRegisters => self.riot.read(masked)?,
            MemoryArea::Cartridge => self.cartridge.read(masked & 0x0FFF),
            MemoryArea::Unmapped => 0,
        })
    }
}

impl Write for AddressSpace {
    fn write(&mut self, address: u16, value: u8) -> WriteResult {
        let masked = address & ADDRESS_MASK;
        match map_address(address) {
            MemoryArea::Vac => self.vac.write(masked, value)?,
            MemoryArea::RiotRam | MemoryArea::RiotRegisters => self.riot.write(masked, value)?,
            // Writes to the cartridge range are silently ignored; it's
            // read-only.
            MemoryArea::Cartridge | MemoryArea::Unmapped => {}
        };
        Ok(())
    }
}

impl Memory for AddressSpace {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_vac_range() {
        assert_eq!(map_address(0x0000), MemoryArea::Vac);
        assert_eq!(map_address(0x007F), MemoryArea::Vac);
    }

    #[test]
    fn routes_riot_ram_and_its_mirror() {
        assert_eq!(map_address(0x0080), MemoryArea::RiotRam);
        assert_eq!(map_address(0x00FF), MemoryArea::RiotRam);
        assert_eq!(map_address(0x0180), MemoryArea::RiotRam);
        assert_eq!(map_address(0x01FF), MemoryArea::RiotRam);
    }

    #[test]
    fn routes_riot_registers_and_their_mirror() {
        assert_eq!(map_address(0x0280), MemoryArea::RiotRegisters);
        assert_eq!(map_address(0x0297), MemoryArea::RiotRegisters);
        assert_eq!(map_address(0x0380), MemoryArea::RiotRegisters);
        assert_eq!(map_address(0x0397), MemoryArea::RiotRegisters);
    }

    #[test]
    fn routes_cartridge_range() {
        assert_eq!(map_address(0x1000), MemoryArea::Cartridge);
        assert_eq!(map_address(0x1FFF), MemoryArea::Cartridge);
    }

    #[test]
    fn stack_push_to_0x01fd_routes_to_riot_ram_cell_0x7d() {
        let mut address_space = AddressSpace::new();
        address_space.write(0x01FD, 0x99).unwrap();
        // Cell 0x7D of RIOT RAM is addressable directly at 0x00FD.
        assert_eq!(address_space.riot.read(0x00FD).unwrap(), 0x99);
        // And through the address space's own 0x0080-0x00FF window.
        assert_eq!(address_space.read(0x00FD).unwrap(), 0x99);
    }

    #[test]
    fn writes_to_cartridge_are_ignored() {
        let mut address_space = AddressSpace::new();
        address_space.cartridge.load(&[0xAB; 4096]);
        address_space.write(0x1000, 0x00).unwrap();
        assert_eq!(address_space.read(0x1000).unwrap(), 0xAB);
    }

    #[test]
    fn unmapped_gap_reads_do_not_panic() {
        let mut address_space = AddressSpace::new();
        let _ = address_space.read(0x0120).unwrap();
    }
}
