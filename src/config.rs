// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Emulator hardware emulation configuration and preferences.

/// The hardware specification for the different models differ.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum HardwareModel {
	/// Original GameBoy
	GB,
	/// Gameboy Color
	GBC,
}

/// The default monochrome shades, lightest first.
pub const DEFAULT_SHADES: [u8; 4] = [0xEB, 0xC4, 0x60, 0x00];

/// Emulation settings and preferences goes here.
#[derive(Clone, Debug)]
pub struct Config {
	/// The model of the emulated machine
	pub model: HardwareModel,
	/// The grey levels the four monochrome colors are drawn with.
	///
	/// The first entry is the lightest one, it is also used for blanking the
	/// screen while the lcd is off.
	pub shades: [u8; 4],
	/// Limit the sprites drawn on each line to the first ten that cover it,
	/// with lower entries drawn on top, like the hardware does.
	///
	/// Off by default: every covering sprite is drawn, and later entries are
	/// drawn over earlier ones.
	pub sprite_limit: bool,
}

impl Config {
	/// Returns a configuration for the given model with the default shades.
	pub fn new(model: HardwareModel) -> Self {
		Config {
			model,
			shades: DEFAULT_SHADES,
			sprite_limit: false,
		}
	}

	/// Whether the model supports the extended color hardware.
	pub fn color_capable(&self) -> bool {
		self.model == HardwareModel::GBC
	}
}

impl Default for Config {
	fn default() -> Self {
		Config::new(HardwareModel::GB)
	}
}
