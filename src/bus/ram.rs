// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Emulate the gameboy's internal memories.
//!
//! Besides the raw regions, this module tracks the flags that decide how banked
//! memory is addressed: whether the boot program is still mapped, whether the
//! system runs in color mode, and the selected video/work memory banks.

use alloc::boxed::Box;
use alloc::vec;

use super::consts::*;
use super::memory_range::*;

use crate::GameboyError;

#[allow(missing_docs)]
pub mod consts {
	use super::*;

	pub const VRAM_BANKS: usize = 2;
	pub const WRAM_BANKS: usize = 8;
	pub const WRAM_BANK_SIZE: usize = 0x1000;

	/// The boot program of the color model spans 0x0000-0x08FF.
	pub const BOOT_MAX_SIZE: usize = 0x900;
	/// The cartridge header stays visible while the boot program is mapped.
	pub const BOOT_HEADER_GAP: MemoryRange = make_range!(0x0100, 0x01FF);
}

use consts::*;

/// Gameboy's internal memory.
pub struct InternalRam {
	vram: [[u8; range_size!(MMAP_VIDEO_RAM)]; VRAM_BANKS],
	wram: Box<[u8]>,
	hram: [u8; range_size!(MMAP_RAM_HIGH)],
	oam: [u8; range_size!(MMAP_SPRITE_OAM)],
	boot: Box<[u8]>,

	boot_enabled: bool,
	color_mode: bool,
	vram_bank: u8,
	wram_bank: u8,
}

impl InternalRam {
	/// Initialize the internal memories.
	///
	/// Without a boot image the memory starts in its post-boot state.
	pub fn new(boot: Option<Box<[u8]>>) -> Result<Self, GameboyError> {
		let boot = boot.unwrap_or_default();

		if boot.len() > BOOT_MAX_SIZE {
			return Err(GameboyError::BadBootImage(boot.len()));
		}

		Ok(InternalRam {
			vram: [[0xFF_u8; range_size!(MMAP_VIDEO_RAM)]; VRAM_BANKS],
			wram: vec![0xFF_u8; WRAM_BANKS * WRAM_BANK_SIZE].into_boxed_slice(),
			hram: [0xFF_u8; range_size!(MMAP_RAM_HIGH)],
			oam: [0xFF_u8; range_size!(MMAP_SPRITE_OAM)],
			boot_enabled: !boot.is_empty(),
			boot,
			color_mode: false,
			vram_bank: 0,
			wram_bank: 1,
		})
	}

	/// Whether the boot program is still mapped over the cartridge.
	pub fn boot_enabled(&self) -> bool {
		self.boot_enabled
	}

	/// Unmap the boot program. There's no way back.
	pub fn disable_boot(&mut self) {
		self.boot_enabled = false;
	}

	/// Whether the system runs with the extended color hardware.
	pub fn color_mode(&self) -> bool {
		self.color_mode
	}

	/// Set the extended color mode flag.
	pub fn set_color_mode(&mut self, enabled: bool) {
		self.color_mode = enabled;
	}

	/// Whether banked accesses should be pinned to their legacy bank.
	fn legacy(&self) -> bool {
		!self.boot_enabled && !self.color_mode
	}

	/// Returns the offset within the boot image if the address is served by it.
	fn boot_offset(&self, address: u16) -> Option<usize> {
		match address {
			_ if !self.boot_enabled => None,
			memory_range!(BOOT_HEADER_GAP) => None,
			_ if (address as usize) < self.boot.len() => Some(address as usize),
			_ => None,
		}
	}

	/// Reads the boot image, if the address is currently mapped to it.
	pub fn read_boot(&self, address: u16) -> Option<u8> {
		self.boot_offset(address).map(|offset| self.boot[offset])
	}

	/// Writes into the boot image, if the address is currently mapped to it.
	///
	/// Returns whether the write was consumed. The boot program may patch itself
	/// while it is mapped.
	pub fn write_boot(&mut self, address: u16, value: u8) -> bool {
		match self.boot_offset(address) {
			Some(offset) => {
				self.boot[offset] = value;
				true
			}
			None => false,
		}
	}

	/// The video memory bank selected by the cpu.
	pub fn vram_bank(&self) -> u8 {
		self.vram_bank
	}

	/// Select the video memory bank, only the lowest bit is used.
	pub fn set_vram_bank(&mut self, bank: u8) {
		self.vram_bank = bank & 0x01;
	}

	/// The work memory bank selected by the cpu.
	pub fn wram_bank(&self) -> u8 {
		self.wram_bank
	}

	/// Select the work memory bank, only the lowest 3 bits are used.
	pub fn set_wram_bank(&mut self, bank: u8) {
		self.wram_bank = bank & 0x07;
	}

	/// Resolves the bank that is actually accessed by a video memory request.
	fn vram_index(&self, bank: u8) -> usize {
		if self.legacy() { 0 } else { (bank & 0x01) as usize }
	}

	/// Reads a video memory address from the given bank.
	///
	/// Outside color mode the bank is forced to 0 once the boot program is gone.
	pub fn read_vram(&self, address: u16, bank: u8) -> u8 {
		self.vram[self.vram_index(bank)][(address & 0x1FFF) as usize]
	}

	/// Writes a video memory address in the given bank.
	pub fn write_vram(&mut self, address: u16, bank: u8, value: u8) {
		let bank = self.vram_index(bank);
		self.vram[bank][(address & 0x1FFF) as usize] = value;
	}

	/// Returns the offset within the work memory for the given address and bank.
	///
	/// The lower window is the fixed bank, the upper window selects one of
	/// banks 1-7. Bank 0 can't be selected for the upper window and aliases bank 1.
	fn wram_offset(&self, address: u16, bank: u8) -> usize {
		// The echo region wraps around to the same offsets.
		let offset = (address & 0x1FFF) as usize;

		if offset < WRAM_BANK_SIZE || self.legacy() {
			return offset;
		}

		let bank = core::cmp::max(bank & 0x07, 1) as usize;
		offset + (bank - 1) * WRAM_BANK_SIZE
	}

	/// Reads a work memory address from the given bank.
	pub fn read_wram(&self, address: u16, bank: u8) -> u8 {
		self.wram[self.wram_offset(address, bank)]
	}

	/// Writes a work memory address in the given bank.
	pub fn write_wram(&mut self, address: u16, bank: u8, value: u8) {
		let offset = self.wram_offset(address, bank);
		self.wram[offset] = value;
	}

	/// Reads from the high ram.
	pub fn read_hram(&self, address: u16) -> u8 {
		self.hram[range_offset!(MMAP_RAM_HIGH, address)]
	}

	/// Writes to the high ram.
	pub fn write_hram(&mut self, address: u16, value: u8) {
		self.hram[range_offset!(MMAP_RAM_HIGH, address)] = value;
	}

	/// Reads from the sprite attribute memory.
	pub fn read_oam(&self, address: u16) -> u8 {
		self.oam[range_offset!(MMAP_SPRITE_OAM, address)]
	}

	/// Writes to the sprite attribute memory.
	pub fn write_oam(&mut self, address: u16, value: u8) {
		self.oam[range_offset!(MMAP_SPRITE_OAM, address)] = value;
	}

	/// The sprite attribute memory, 40 entries of 4 bytes each.
	pub fn oam(&self) -> &[u8] {
		&self.oam
	}
}
