use clap::Parser;
use console::input::InputState;
use console::Console;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(about = "Headless runner for the console emulator")]
struct Args {
    /// Cartridge image to load.
    rom_file: PathBuf,

    /// Number of frames to run before dumping the last one.
    #[clap(long, default_value = "60")]
    frames: u32,

    /// Where to write the final frame, as a PPM image. Printed to stdout as
    /// a hex dump if omitted.
    #[clap(long)]
    out: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let rom_bytes = std::fs::read(&args.rom_file).expect("Unable to read the cartridge image");
    let mut machine = Console::new();
    machine.load_cartridge(&rom_bytes);

    let input = InputState::default();
    let mut frame = None;
    for _ in 0..args.frames {
        machine.push_input(&input);
        if machine.run_frame().is_err() {
            break;
        }
        frame = machine.take_frame();
    }

    let frame = frame.expect("at least one frame must have run");
    match args.out {
        Some(path) => write_ppm(&frame, &path).expect("Unable to write the frame"),
        None => dump_hex(&frame),
    }
}

fn write_ppm(frame: &console::FrameBuffer, path: &PathBuf) -> io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "P6\n{} {}\n255", frame.width(), frame.height())?;
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let pixel = frame.pixel(x, y);
            file.write_all(&[pixel.r, pixel.g, pixel.b])?;
        }
    }
    Ok(())
}

fn dump_hex(frame: &console::FrameBuffer) {
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let pixel = frame.pixel(x, y);
            print!("{:02X}{:02X}{:02X} ", pixel.r, pixel.g, pixel.b);
        }
        println!();
    }
}
