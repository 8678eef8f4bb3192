// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! A viewer for the gameboy video library.
//!
//! There's no processor here, so the viewer writes a test pattern into video
//! memory and lets the lcd controller draw it, scrolling the background a pixel
//! per frame. If a rom path is given, the cartridge is loaded (and its save ram
//! restored from the current directory) before the pattern is drawn.

extern crate minifb;

use std::env;
use std::fmt;
use std::fs;
use std::thread::sleep;
use std::time::Duration;

use minifb::{Key, Window, WindowOptions};

use gameboy_video::bus::cartridge::*;
use gameboy_video::bus::{Memory, SystemBus};
use gameboy_video::config::{Config, HardwareModel};
use gameboy_video::interrupts::*;
use gameboy_video::GameboyError;

const WIDTH: usize = 160;
const HEIGHT: usize = 144;

/// Cycles per emulated step.
const STEP_CYCLES: usize = 4;

enum ViewerError {
	Std(std::io::Error),
	Gameboy(GameboyError),
	Display(minifb::Error),
}

impl From<std::io::Error> for ViewerError {
	fn from(e: std::io::Error) -> Self {
		ViewerError::Std(e)
	}
}

impl From<GameboyError> for ViewerError {
	fn from(e: GameboyError) -> Self {
		ViewerError::Gameboy(e)
	}
}

impl From<minifb::Error> for ViewerError {
	fn from(e: minifb::Error) -> Self {
		ViewerError::Display(e)
	}
}

impl fmt::Debug for ViewerError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ViewerError::Std(ref err) => err.fmt(f),
			ViewerError::Gameboy(ref err) => err.fmt(f),
			ViewerError::Display(ref err) => err.fmt(f),
		}
	}
}

/// Loads the rom given on the command line, or an empty one.
fn load_cartridge() -> Result<Cartridge, ViewerError> {
	let rom: Box<[u8]> = match env::args().nth(1) {
		Some(path) => fs::read(path)?.into(),
		None => vec![0_u8; 0x8000].into(),
	};

	Ok(Cartridge::new(rom)?)
}

/// Draws a checkerboard of four tiles, one per color, with a sprite on top.
fn draw_pattern(bus: &mut SystemBus) -> Result<(), GameboyError> {
	// Tile n is filled with color n.
	for tile in 0..4_u16 {
		let low = if tile & 1 != 0 { 0xFF } else { 0x00 };
		let high = if tile & 2 != 0 { 0xFF } else { 0x00 };

		for row in 0..8 {
			bus.write(0x8000 + tile * 16 + row * 2, low)?;
			bus.write(0x8000 + tile * 16 + row * 2 + 1, high)?;
		}
	}

	for entry in 0..0x400_u16 {
		let (row, column) = (entry / 32, entry % 32);
		bus.write(0x9800 + entry, ((row + column) % 4) as u8)?;
	}

	// A single sprite made of tile 3, in the middle of the screen.
	for (offset, value) in [80_u8, 88, 3, 0x00].iter().enumerate() {
		bus.write(0xFE00 + offset as u16, *value)?;
	}

	bus.write(0xFF47, 0xE4)?;
	bus.write(0xFF48, 0x1B)?;
	bus.write(0xFF40, 0x93)?;

	Ok(())
}

fn main() -> Result<(), ViewerError> {
	let mut buffer: Vec<u32> = vec![0; WIDTH * HEIGHT];
	let mut window = Window::new("Gameboy", WIDTH, HEIGHT, WindowOptions::default())?;

	let mut storage = DirectoryStorage::new(".");
	let mut cartridge = load_cartridge()?;
	cartridge.load_ram(&storage);

	let config = Config::new(HardwareModel::GBC);
	let mut bus = SystemBus::from_cartridge(&config, None, cartridge)?;
	draw_pattern(&mut bus)?;

	let mut frames = bus.frames();
	let mut scroll: u8 = 0;

	while window.is_open() && !window.is_key_down(Key::Escape) {
		bus.process(STEP_CYCLES)?;

		for interrupt in InterruptIter::new(bus.interrupts()) {
			if interrupt == Interrupt::VerticalBlank {
				scroll = scroll.wrapping_add(1);
				bus.write(0xFF43, scroll)?;
			}
		}
		bus.clear();

		if bus.frames() != frames {
			frames = bus.frames();

			bus.flush(&mut buffer);
			window.update_with_buffer(&buffer, WIDTH, HEIGHT)?;
			sleep(Duration::from_millis(16));
		}
	}

	bus.cartridge().save_ram(&mut storage)?;

	Ok(())
}
