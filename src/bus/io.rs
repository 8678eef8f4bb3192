// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The memory-mapped registers table.
//!
//! Each peripheral registers the registers it owns once, when the bus is built.
//! The table maps an address within the I/O page to a register identifier, so
//! dispatching an access is a single lookup followed by a match.

use super::memory_range::*;
use super::ppu::DisplayRegister;

use crate::GameboyError;

#[allow(unused, missing_docs)]
pub mod consts {
	use super::*;

	/// Every mapped register lives within this page.
	pub const MMAP_IO_PAGE: MemoryRange = make_range!(0xFF00, 0xFFFF);
	/// The total size of the registers' memory mapping.
	pub const IO_SIZE: usize = 0x100;

	/// Video memory bank select (GBC).
	pub const IO_VBK: u16 = 0xFF4F;
	/// Writing any value unmaps the boot program.
	pub const IO_BOOT: u16 = 0xFF50;
	/// Work memory bank select (GBC).
	pub const IO_SVBK: u16 = 0xFF70;
}

/// Convert address constants to register array offset.
macro_rules! port_offset {
	($address:tt) => (($address - 0xFF00) as usize)
}

use consts::*;

/// Identifies the owner and meaning of a mapped address.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MappedRegister {
	/// A register owned by the lcd controller.
	Display(DisplayRegister),
	/// The video memory bank register.
	VramBank,
	/// The work memory bank register.
	WramBank,
	/// The boot program unmap register.
	BootDisable,
}

/// Handles the lookup of memory-mapped registers.
pub struct IoPorts {
	/// Registers that are mapped to the range 0xFF00-0xFFFF.
	registers: [Option<MappedRegister>; IO_SIZE],
}

impl IoPorts {
	/// Initialize an empty registers table.
	pub fn new() -> Self {
		IoPorts {
			registers: [None; IO_SIZE],
		}
	}

	/// Maps a register to the given address.
	///
	/// Each address has exactly one owner, registering it twice is an error.
	pub fn register(&mut self, address: u16, register: MappedRegister) -> Result<(), GameboyError> {
		match address {
			memory_range!(MMAP_IO_PAGE) => {
				let entry = &mut self.registers[port_offset!(address)];

				if entry.is_some() {
					return Err(GameboyError::RegisterTaken(address));
				}

				*entry = Some(register);
				Ok(())
			}
			_ => {
				Err(GameboyError::BadAddress(address))
			}
		}
	}

	/// Returns the register mapped to the given address, if there is one.
	pub fn get(&self, address: u16) -> Option<MappedRegister> {
		match address {
			memory_range!(MMAP_IO_PAGE) => self.registers[port_offset!(address)],
			_ => None,
		}
	}
}

impl Default for IoPorts {
	fn default() -> Self {
		IoPorts::new()
	}
}
