// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Gameboy color's palette memory.
//!
//! The background and the sprites have 8 palettes of 4 colors each. The cpu
//! accesses a palette memory through a pair of registers: the index register
//! selects a byte within the memory, and the data register reads or writes it.
//!
//! Index register layout:
//!
//! * Bit 0 - Low (0) or high (1) byte of the color.
//! * Bits 1-2 - Color within the palette.
//! * Bits 3-5 - Palette number.
//! * Bit 7 - Increment the index after each data write.

use num::rational::Ratio;

/// The amount of palettes in each palette memory.
pub const PALETTES: usize = 8;
/// The amount of colors in each palette.
pub const PALETTE_COLORS: usize = 4;

/// A 15 bit color, 5 bits per channel.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
	/// Red channel (0-31).
	pub red: u8,
	/// Green channel (0-31).
	pub green: u8,
	/// Blue channel (0-31).
	pub blue: u8,
}

impl Color {
	/// The power-on color of every palette entry.
	pub const WHITE: Color = Color { red: 0x1F, green: 0x1F, blue: 0x1F };

	/// Scales the channels to the host's 8 bit range, rounding to the nearest value.
	pub fn to_rgb(&self) -> [u8; 3] {
		let scale = |channel: u8| {
			Ratio::new(u32::from(channel & 0x1F) * 0xFF, 0x1F).round().to_integer() as u8
		};

		[scale(self.red), scale(self.green), scale(self.blue)]
	}
}

/// A decoded index register.
#[derive(Clone, Copy, PartialEq, Debug)]
struct Selector {
	high: bool,
	color: usize,
	palette: usize,
}

impl Selector {
	fn new(index: u8) -> Self {
		Selector {
			high: index & 0x01 != 0,
			color: ((index >> 1) & 0x03) as usize,
			palette: ((index >> 3) & 0x07) as usize,
		}
	}
}

/// Returns the index register's value after a data write.
///
/// When auto-increment is on, the low 6 bits move to the next byte and wrap at 64.
pub fn next_index(index: u8) -> u8 {
	if index & 0x80 == 0 {
		return index;
	}

	(index & 0x80) | (index.wrapping_add(1) & 0x3F)
}

/// One of the two palette memories.
#[derive(Clone, PartialEq, Debug)]
pub struct PaletteMemory {
	palettes: [[Color; PALETTE_COLORS]; PALETTES],
}

impl PaletteMemory {
	/// Create a palette memory with every color set to white.
	pub fn new() -> Self {
		PaletteMemory {
			palettes: [[Color::WHITE; PALETTE_COLORS]; PALETTES],
		}
	}

	/// Returns a color from one of the palettes.
	pub fn color(&self, palette: u8, index: u8) -> Color {
		self.palettes[(palette & 0x07) as usize][(index & 0x03) as usize]
	}

	/// Returns the data register's read-back for the given index register.
	///
	/// The hardware packs the channels back into the same layout they were
	/// written with.
	pub fn read(&self, index: u8) -> u8 {
		let selector = Selector::new(index);
		let color = &self.palettes[selector.palette][selector.color];

		if selector.high {
			(((color.blue & 0x1F) << 2) | ((color.green >> 3) & 0x03)) & 0x7F
		} else {
			(color.red & 0x1F) | ((color.green & 0x07) << 5)
		}
	}

	/// Writes a data register byte to the color selected by the index register.
	pub fn write(&mut self, index: u8, value: u8) {
		let selector = Selector::new(index);
		let color = &mut self.palettes[selector.palette][selector.color];

		if selector.high {
			color.blue = (value >> 2) & 0x1F;
			color.green = (color.green & 0x07) | ((value & 0x03) << 3);
		} else {
			color.red = value & 0x1F;
			color.green = (color.green & 0x18) | ((value >> 5) & 0x07);
		}
	}
}

impl Default for PaletteMemory {
	fn default() -> Self {
		PaletteMemory::new()
	}
}
