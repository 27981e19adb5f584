use std::{env, fs, process};

use log::{error, info};
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use chipvm::keyboard::key_to_nibble;
use chipvm::{Audio, Beeper, Chip8, NullAudio, SharedKey, HEIGHT, WIDTH};

// CPU runs a batch of cycles per 60 fps frame; timers gate themselves.
const CYCLES_PER_FRAME: u32 = 12;

const PIXEL_ON: u32 = from_u8_rgb(0, 127, 255);
const PIXEL_OFF: u32 = from_u8_rgb(0, 0, 0);

const fn from_u8_rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn main() {
    env_logger::init();

    let rom_path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: chipvm <rom>");
            process::exit(1);
        }
    };
    let rom = match fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("failed to read {rom_path}: {e}");
            process::exit(1);
        }
    };

    let mut window = match Window::new(
        "chipvm - ESC to exit",
        WIDTH,
        HEIGHT,
        WindowOptions {
            scale: Scale::X16,
            ..WindowOptions::default()
        },
    ) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("failed to open a window: {e}");
            process::exit(1);
        }
    };
    // Limit to max ~60 fps update rate
    window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));

    let keys = SharedKey::new();
    let audio: Box<dyn Audio> = match Beeper::new() {
        Some(beeper) => Box::new(beeper),
        None => {
            info!("running without audio");
            Box::new(NullAudio)
        }
    };

    let mut vm = Chip8::new(Box::new(keys.clone()), audio);
    if let Err(e) = vm.load_rom(&rom) {
        eprintln!("failed to load {rom_path}: {e}");
        process::exit(1);
    }

    let mut pixels = vec![PIXEL_OFF; WIDTH * HEIGHT];
    while window.is_open() && !window.is_key_pressed(Key::Escape, KeyRepeat::Yes) {
        keys.set(
            window
                .get_keys()
                .iter()
                .find_map(|&key| key_to_nibble(key))
                .unwrap_or(0),
        );

        for _ in 0..CYCLES_PER_FRAME {
            if let Err(e) = vm.cycle() {
                error!("machine halted at pc {:#05x}: {e}", vm.pc());
                process::exit(1);
            }
        }

        for (slot, &pixel) in pixels.iter_mut().zip(vm.framebuffer().iter()) {
            *slot = if pixel == 1 { PIXEL_ON } else { PIXEL_OFF };
        }
        if let Err(e) = window.update_with_buffer(&pixels, WIDTH, HEIGHT) {
            error!("display update failed: {e}");
            process::exit(1);
        }
    }
}
