//! The system orchestrator: ties the CPU, VAC, RIOT, and cartridge together
//! into a single machine clock, and assembles the VAC's pixel stream into
//! complete frames.

use crate::address_space::AddressSpace;
use crate::colors::Rgba;
use crate::input::InputState;
use cpu6507::cpu::Cpu;
use std::error::Error;

pub const FRAME_WIDTH: usize = 160;
pub const FRAME_HEIGHT: usize = 192;
const CLOCKS_PER_LINE: u16 = 228;
const VBLANK_LINES: u32 = 37;

/// A completed frame, one pixel per visible scanline column.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<Rgba>,
}

impl FrameBuffer {
    fn blank() -> Self {
        FrameBuffer {
            pixels: vec![Rgba::default(); FRAME_WIDTH * FRAME_HEIGHT],
        }
    }

    pub fn width(&self) -> usize {
        FRAME_WIDTH
    }

    pub fn height(&self) -> usize {
        FRAME_HEIGHT
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * FRAME_WIDTH + x]
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgba) {
        self.pixels[y * FRAME_WIDTH + x] = color;
    }
}

/// The whole machine: CPU, memory map, and the pending frame the system is
/// currently racing the beam across.
///
/// Frame boundaries are not a fixed line count; they are detected the way
/// the real hardware's display does it, by watching for `VSYNC` falling.
/// Game code is responsible for holding `VSYNC` for a few lines at the top
/// of every frame; a program that never touches `VSYNC` never completes one.
#[derive(Debug)]
pub struct Console {
    cpu: Cpu<AddressSpace>,
    wsync_latched: bool,
    vsync_was_set: bool,
    vblank_countdown: u32,
    line_counter: usize,
    pending_frame: FrameBuffer,
    completed_frame: Option<FrameBuffer>,
}

impl Console {
    pub fn new() -> Self {
        let mut cpu = Cpu::new(Box::new(AddressSpace::new()));
        cpu.reset();
        Console {
            cpu,
            wsync_latched: false,
            vsync_was_set: false,
            vblank_countdown: 0,
            line_counter: 0,
            pending_frame: FrameBuffer::blank(),
            completed_frame: None,
        }
    }

    pub fn load_cartridge(&mut self, bytes: &[u8]) {
        self.cpu.mut_memory().cartridge.load(bytes);
        self.cpu.reset();
    }

    /// Applies the host's current controls. Read by the RIOT and VAC on the
    /// next machine clocks; this does not itself advance the machine.
    pub fn push_input(&mut self, input: &InputState) {
        let memory = self.cpu.mut_memory();
        memory.riot.set_joystick_bits(input.swcha_bits());
        memory.riot.set_console_switches(input.swchb_bits());
        memory.vac.set_fire_buttons(input.port0.fire, input.port1.fire);
    }

    /// Takes the most recently completed frame, if one has finished since
    /// the last call.
    pub fn take_frame(&mut self) -> Option<FrameBuffer> {
        self.completed_frame.take()
    }

    /// Runs machine clocks until a complete frame has been assembled. Stops
    /// early and returns the error if the CPU hits an illegal opcode; since a
    /// halted CPU can no longer drive the VSYNC edge that ends a frame, the
    /// caller must not keep calling this after it returns an error.
    pub fn run_frame(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            match self.tick_color_clock() {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) => {
                    eprintln!("ERROR: {}. Machine halted.", err);
                    return Err(err);
                }
            }
        }
    }

    /// Advances exactly one color clock: the VAC always ticks; the CPU and
    /// RIOT tick once every third color clock, and only while `WSYNC` is not
    /// latched. Returns whether this clock completed a frame.
    fn tick_color_clock(&mut self) -> Result<bool, Box<dyn Error>> {
        let color_clock = self.cpu.mut_memory().vac.color_clock();
        self.cpu.mut_memory().vac.tick();

        if color_clock % 3 == 0 {
            if self.wsync_latched {
                if color_clock == 0 {
                    self.wsync_latched = false;
                }
            } else {
                self.cpu.mut_memory().riot.tick();
                self.cpu.step()?;
            }
            if self.cpu.mut_memory().vac.take_wsync_request() {
                self.wsync_latched = true;
            }
        }

        Ok(if color_clock == CLOCKS_PER_LINE - 1 {
            self.advance_line()
        } else {
            false
        })
    }

    /// Runs once per scanline. Detects the `VSYNC` falling edge that starts
    /// a new frame, and otherwise copies the VAC's just-finished line into
    /// the framebuffer whenever the beam is in the visible picture area.
    /// Returns whether this call completed a frame.
    fn advance_line(&mut self) -> bool {
        let vsync_set = self.cpu.mut_memory().vac.vsync_active();
        let mut frame_completed = false;

        if self.vsync_was_set && !vsync_set {
            let finished = std::mem::replace(&mut self.pending_frame, FrameBuffer::blank());
            self.completed_frame = Some(finished);
            self.line_counter = 0;
            self.vblank_countdown = VBLANK_LINES;
            frame_completed = true;
        }

        if !vsync_set {
            if self.vblank_countdown > 0 {
                self.vblank_countdown -= 1;
            } else if self.line_counter < FRAME_HEIGHT {
                let line = self.cpu.mut_memory().vac.take_line();
                for (x, color) in line.into_iter().enumerate() {
                    self.pending_frame.set_pixel(x, self.line_counter, color);
                }
                self.line_counter += 1;
            }
        }

        self.vsync_was_set = vsync_set;
        frame_completed
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console_with_program(program: &[u8]) -> Console {
        let mut console = Console::new();
        let mut image = vec![0u8; 4096];
        image[..program.len()].copy_from_slice(program);
        // Reset vector points at the start of the cartridge image, mapped
        // at 0x1000.
        image[0xFFC] = 0x00;
        image[0xFFD] = 0xF0;
        console.load_cartridge(&image);
        console
    }

    /// A minimal but realistic kernel: 3 lines of `VSYNC`, 37 lines of
    /// `VBLANK`, 192 lines of picture, 30 lines of overscan, then loops.
    /// Built by hand rather than assembled, in the style of a hand-rolled
    /// test ROM.
    fn vsync_kernel() -> Vec<u8> {
        vec![
            0xA9, 0x02, // LDA #$02
            0x85, 0x00, // STA VSYNC
            0x85, 0x02, // STA WSYNC
            0x85, 0x02, // STA WSYNC
            0x85, 0x02, // STA WSYNC
            0xA9, 0x00, // LDA #$00
            0x85, 0x00, // STA VSYNC
            0xA2, 0x25, // LDX #37
            0x85, 0x02, // loop_vblank: STA WSYNC
            0xCA, // DEX
            0xD0, 0xFB, // BNE loop_vblank
            0xA2, 0xC0, // LDX #192
            0x85, 0x02, // loop_picture: STA WSYNC
            0xCA, // DEX
            0xD0, 0xFB, // BNE loop_picture
            0xA2, 0x1E, // LDX #30
            0x85, 0x02, // loop_overscan: STA WSYNC
            0xCA, // DEX
            0xD0, 0xFB, // BNE loop_overscan
            0x4C, 0x00, 0xF0, // JMP $F000
        ]
    }

    #[test]
    fn run_frame_produces_a_full_size_frame() {
        let mut console = console_with_program(&vsync_kernel());
        console.run_frame().unwrap();
        let frame = console.take_frame().expect("a frame should have completed");
        assert_eq!(frame.width(), FRAME_WIDTH);
        assert_eq!(frame.height(), FRAME_HEIGHT);
    }

    #[test]
    fn run_frame_can_be_called_repeatedly() {
        let mut console = console_with_program(&vsync_kernel());
        console.run_frame().unwrap();
        assert!(console.take_frame().is_some());
        console.run_frame().unwrap();
        assert!(console.take_frame().is_some());
    }

    #[test]
    fn wsync_stalls_the_cpu_until_the_next_scanline() {
        let program = [0xA9, 0x00, 0x85, 0x02, 0x4C, 0x04, 0xF0]; // LDA #0; STA $02; JMP $F004
        let mut console = console_with_program(&program);

        // LDA immediate (2 cycles) then STA zero page (3 cycles) strobes
        // WSYNC after 5 machine clocks -- comfortably inside the first 30
        // color clocks.
        for _ in 0..30 {
            console.tick_color_clock().unwrap();
        }
        assert!(console.wsync_latched);
        let pc_while_stalled = console.cpu.reg_pc();

        for _ in 0..190 {
            console.tick_color_clock().unwrap();
        }
        assert_eq!(console.cpu.reg_pc(), pc_while_stalled);
        assert!(console.wsync_latched);
    }

    #[test]
    fn run_frame_returns_an_error_on_illegal_opcode() {
        // 0x02 is not a defined 6502 opcode.
        let program = [0x02];
        let mut console = console_with_program(&program);
        assert!(console.run_frame().is_err());
    }
}
