// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Emulate the gameboy's memory mapping and bus access.

#[macro_use]
pub mod memory_range;
pub mod cartridge;
pub mod io;
pub mod ppu;
pub mod ram;

use alloc::boxed::Box;

use io::*;
use io::consts::*;
use ppu::{DisplayRegister, Ppu, Transfer};
use ppu::consts::OAM_TRANSFER_SIZE;
use ram::*;
use cartridge::*;
use memory_range::*;

use crate::config::Config;
use crate::interrupts::*;
use crate::GameboyError;

/// Bus locations-related constants.
#[allow(missing_docs)]
pub mod consts {
	use super::*;

	pub const MMAP_ROM_BANK0: MemoryRange = make_range!(0x0000, 0x3FFF);
	/// Switchable ROM bank.
	pub const MMAP_ROM_BANK_SW: MemoryRange = make_range!(0x4000, 0x7FFF);
	pub const MMAP_VIDEO_RAM: MemoryRange = make_range!(0x8000, 0x9FFF);
	/// Switchable RAM bank.
	pub const MMAP_RAM_BANK_SW: MemoryRange = make_range!(0xA000, 0xBFFF);
	/// Fixed bank at 0xC000-0xCFFF, switchable bank at 0xD000-0xDFFF.
	pub const MMAP_RAM_INTERNAL: MemoryRange = make_range!(0xC000, 0xDFFF);
	/// Maps to the same physical memory as the internal ram.
	pub const MMAP_RAM_ECHO: MemoryRange = make_range!(0xE000, 0xFDFF);
	/// Sprite/Object attribute memory.
	pub const MMAP_SPRITE_OAM: MemoryRange = make_range!(0xFE00, 0xFE9F);
	/// High RAM.
	pub const MMAP_RAM_HIGH: MemoryRange = make_range!(0xFF80, 0xFFFE);
}

use consts::*;

/// A peripheral that can be written and read by the cpu.
pub trait Memory {
	/// Write a 8-bit value to the peripheral.
	///
	/// * `address` - The absolute memory address to write into.
	/// * `value` - The value to write.
	fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError>;

	/// Read a 8-bit value from this peripheral.
	///
	/// * `address` - The absolute memory address to read from.
	fn read(&self, address: u16) -> Result<u8, GameboyError>;
}

/// A virtual representation of Gameboy (Color) memory bus.
///
/// The bus owns every memory region and the lcd controller, and routes each
/// access by the following order: the boot program (while mapped), the
/// memory-mapped registers, the internal memories, and finally the cartridge.
pub struct SystemBus<C: Memory = Cartridge> {
	pub(crate) cartridge: C,
	pub(crate) io: IoPorts,
	pub(crate) ram: InternalRam,
	pub(crate) ppu: Ppu,
}

impl<C: Memory> SystemBus<C> {
	/// Initialize a new address space.
	///
	/// * `boot` - The boot program image, if the system should run it.
	/// * `cartridge` - Serves every address the bus doesn't own.
	pub fn new(config: &Config, boot: Option<Box<[u8]>>, cartridge: C) -> Result<Self, GameboyError> {
		let mut bus = SystemBus {
			cartridge,
			io: IoPorts::new(),
			ram: InternalRam::new(boot)?,
			ppu: Ppu::new(config),
		};

		bus.register_io(IO_VBK, MappedRegister::VramBank)?;
		bus.register_io(IO_BOOT, MappedRegister::BootDisable)?;
		bus.register_io(IO_SVBK, MappedRegister::WramBank)?;

		for register in DisplayRegister::ALL.iter() {
			bus.register_io(register.address(), MappedRegister::Display(*register))?;
		}

		Ok(bus)
	}

	/// Maps a register to an address of the I/O page.
	pub fn register_io(&mut self, address: u16, register: MappedRegister) -> Result<(), GameboyError> {
		self.io.register(address, register)
	}

	/// Whether the extended color hardware is in use.
	pub fn color_mode(&self) -> bool {
		self.ram.color_mode()
	}

	/// Enable or disable the extended color hardware.
	pub fn set_color_mode(&mut self, enabled: bool) {
		self.ram.set_color_mode(enabled);
	}

	/// Whether the boot program is still mapped.
	pub fn boot_enabled(&self) -> bool {
		self.ram.boot_enabled()
	}

	/// Reads video memory from a specific bank.
	pub fn read_vram(&self, address: u16, bank: u8) -> u8 {
		self.ram.read_vram(address, bank)
	}

	/// Writes video memory in a specific bank.
	pub fn write_vram(&mut self, address: u16, bank: u8, value: u8) {
		self.ram.write_vram(address, bank, value);
	}

	/// Reads work memory from a specific bank.
	pub fn read_wram(&self, address: u16, bank: u8) -> u8 {
		self.ram.read_wram(address, bank)
	}

	/// Writes work memory in a specific bank.
	pub fn write_wram(&mut self, address: u16, bank: u8, value: u8) {
		self.ram.write_wram(address, bank, value);
	}

	/// Copies 160 bytes from `source` into the sprite attribute memory.
	///
	/// The bytes are fetched like any other cpu read.
	pub fn perform_dma(&mut self, source: u16) -> Result<(), GameboyError> {
		log::debug!("Bus: oam dma from {:#06x}", source);

		for offset in 0..OAM_TRANSFER_SIZE {
			let value = self.read(source.wrapping_add(offset))?;
			self.ram.write_oam(range_start!(MMAP_SPRITE_OAM) as u16 + offset, value);
		}

		Ok(())
	}

	/// Copies a block into the currently selected video memory bank.
	fn perform_vram_dma(&mut self, source: u16, destination: u16, length: u16) -> Result<(), GameboyError> {
		log::debug!("Bus: vram dma of {} bytes from {:#06x} to {:#06x}", length, source, destination);

		let bank = self.ram.vram_bank();

		for offset in 0..length {
			let value = self.read(source.wrapping_add(offset))?;
			let address = 0x8000 | (destination.wrapping_add(offset) & 0x1FFF);
			self.ram.write_vram(address, bank, value);
		}

		Ok(())
	}

	fn transfer(&mut self, transfer: Transfer) -> Result<(), GameboyError> {
		match transfer {
			Transfer::Oam { source } => self.perform_dma(source),
			Transfer::Vram { source, destination, length } => self.perform_vram_dma(source, destination, length),
		}
	}

	/// Advances the lcd controller by the given amount of cycles.
	pub fn process(&mut self, cycles: usize) -> Result<(), GameboyError> {
		// While the boot program runs, only the color one touches the color palettes.
		let color = if self.ram.boot_enabled() {
			self.ppu.palettes_written()
		} else {
			self.ram.color_mode()
		};

		match self.ppu.process(cycles, &self.ram, color) {
			Some(transfer) => self.transfer(transfer),
			None => Ok(()),
		}
	}

	/// The lcd controller.
	pub fn ppu(&self) -> &Ppu {
		&self.ppu
	}

	/// The last presented frame, as 160x144 RGBA pixels.
	pub fn frame(&self) -> &[u8] {
		self.ppu.frame()
	}

	/// The amount of frames presented so far.
	pub fn frames(&self) -> usize {
		self.ppu.frames()
	}

	/// Converts the last presented frame into `0x00RRGGBB` pixels.
	pub fn flush(&self, buffer: &mut [u32]) {
		for (pixel, output) in self.frame().chunks_exact(4).zip(buffer.iter_mut()) {
			*output = u32::from_be_bytes([0, pixel[0], pixel[1], pixel[2]]);
		}
	}

	/// The cartridge controller.
	pub fn cartridge(&self) -> &C {
		&self.cartridge
	}

	/// The cartridge controller, mutably.
	pub fn cartridge_mut(&mut self) -> &mut C {
		&mut self.cartridge
	}

	fn read_register(&self, register: MappedRegister) -> u8 {
		match register {
			MappedRegister::Display(register) => self.ppu.read_register(register),
			MappedRegister::VramBank => self.ram.vram_bank() & 0x01,
			MappedRegister::WramBank => 0x40 | self.ram.wram_bank(),
			MappedRegister::BootDisable => 0,
		}
	}

	fn write_register(&mut self, register: MappedRegister, value: u8) -> Result<(), GameboyError> {
		match register {
			MappedRegister::Display(register) => {
				if let Some(transfer) = self.ppu.write_register(register, value) {
					self.transfer(transfer)?;
				}
			}
			MappedRegister::VramBank => {
				self.ram.set_vram_bank(value);
				log::debug!("Bus: video memory bank {}", self.ram.vram_bank());
			}
			MappedRegister::WramBank => {
				self.ram.set_wram_bank(value);
				log::debug!("Bus: work memory bank {}", self.ram.wram_bank());
			}
			MappedRegister::BootDisable => {
				if self.ram.boot_enabled() {
					self.ram.disable_boot();
					log::info!("Bus: boot program unmapped");
				}
			}
		}

		Ok(())
	}
}

impl SystemBus<Cartridge> {
	/// Initialize an address space around a plain cartridge.
	///
	/// The color hardware is used only if both the model and the game support it.
	pub fn from_cartridge(config: &Config, boot: Option<Box<[u8]>>, cartridge: Cartridge) -> Result<Self, GameboyError> {
		let color = config.color_capable() && cartridge.supports_color();
		let mut bus = SystemBus::new(config, boot, cartridge)?;
		bus.set_color_mode(color);

		log::info!("Bus: running in {} mode", if color { "color" } else { "monochrome" });

		Ok(bus)
	}
}

impl<C: Memory> Memory for SystemBus<C> {
	fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError> {
		// The boot program may patch itself.
		if self.ram.write_boot(address, value) {
			return Ok(());
		}

		if let Some(register) = self.io.get(address) {
			return self.write_register(register, value);
		}

		match address {
			memory_range!(MMAP_VIDEO_RAM) => {
				let bank = self.ram.vram_bank();
				self.ram.write_vram(address, bank, value);
			}
			memory_range!(MMAP_RAM_INTERNAL) |
			memory_range!(MMAP_RAM_ECHO) => {
				let bank = self.ram.wram_bank();
				self.ram.write_wram(address, bank, value);
			}
			memory_range!(MMAP_SPRITE_OAM) => {
				self.ram.write_oam(address, value);
			}
			memory_range!(MMAP_RAM_HIGH) => {
				self.ram.write_hram(address, value);
			}
			_ => {
				return self.cartridge.write(address, value);
			}
		}

		Ok(())
	}

	fn read(&self, address: u16) -> Result<u8, GameboyError> {
		if let Some(value) = self.ram.read_boot(address) {
			return Ok(value);
		}

		if let Some(register) = self.io.get(address) {
			return Ok(self.read_register(register));
		}

		match address {
			memory_range!(MMAP_VIDEO_RAM) => {
				Ok(self.ram.read_vram(address, self.ram.vram_bank()))
			}
			memory_range!(MMAP_RAM_INTERNAL) |
			memory_range!(MMAP_RAM_ECHO) => {
				Ok(self.ram.read_wram(address, self.ram.wram_bank()))
			}
			memory_range!(MMAP_SPRITE_OAM) => {
				Ok(self.ram.read_oam(address))
			}
			memory_range!(MMAP_RAM_HIGH) => {
				Ok(self.ram.read_hram(address))
			}
			_ => {
				self.cartridge.read(address)
			}
		}
	}
}

impl<C: Memory> InterruptSource for SystemBus<C> {
	fn interrupts(&self) -> InterruptMask {
		self.ppu.interrupts()
	}

	fn clear(&mut self) {
		self.ppu.clear();
	}
}

#[cfg(test)]
impl<C: Memory> SystemBus<C> {
	/// Writes the complete array's bytes to the relevant memory region.
	pub fn write_all(&mut self, address: u16, array: &[u8]) -> Result<(), GameboyError> {
		for (index, value) in array.iter().enumerate() {
			self.write(address + (index as u16), *value)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::cartridge::tests::empty_rom;
	use crate::config::HardwareModel;
	use std::vec::Vec;

	fn boot_image() -> Box<[u8]> {
		(0..0x900).map(|i| (i as u8) ^ 0xA5).collect::<Vec<u8>>().into_boxed_slice()
	}

	fn color_rom() -> Box<[u8]> {
		let mut rom = empty_rom();
		rom[cartridge::consts::ROM_GAMEBOY_COLOR] = 0x80;
		rom
	}

	fn setup(boot: Option<Box<[u8]>>) -> Result<SystemBus, GameboyError> {
		let mut rom = empty_rom();
		rom[0x0000] = 0x31;
		rom[0x0100] = 0xC3;

		SystemBus::from_cartridge(&Config::default(), boot, Cartridge::new(rom)?)
	}

	#[test]
	fn test_memory_range() {
		let oam_ptr: u16 = 0xFE9F;
		let ram_ptr: u16 = 0xA100;

		match oam_ptr {
			memory_range!(MMAP_SPRITE_OAM) => { }
			_ => { assert!(false); }
		}

		match ram_ptr {
			memory_range!(MMAP_RAM_BANK_SW) => { }
			_ => { assert!(false); }
		}
	}

	#[test]
	fn test_dispatch() -> Result<(), GameboyError> {
		let mut bus = setup(None)?;

		bus.write(0x8123, 0x01)?;
		bus.write(0xC010, 0x02)?;
		bus.write(0xFE20, 0x03)?;
		bus.write(0xFF90, 0x04)?;
		bus.write(0xA000, 0x05)?;

		assert_eq!(0x01, bus.read(0x8123)?);
		assert_eq!(0x02, bus.read(0xC010)?);
		assert_eq!(0x03, bus.read(0xFE20)?);
		assert_eq!(0x04, bus.read(0xFF90)?);
		assert_eq!(0x05, bus.read(0xA000)?);
		assert_eq!(0x31, bus.read(0x0000)?);

		// The echo region mirrors the work memory.
		assert_eq!(0x02, bus.read(0xE010)?);
		bus.write(0xF000, 0x06)?;
		assert_eq!(0x06, bus.read(0xD000)?);

		Ok(())
	}

	#[test]
	fn test_boot_overlay() -> Result<(), GameboyError> {
		let mut bus = setup(Some(boot_image()))?;

		assert_eq!(0xA5, bus.read(0x0000)?);
		// The cartridge header shows through.
		assert_eq!(0xC3, bus.read(0x0100)?);
		assert_eq!(0x01 ^ 0xA5, bus.read(0x0201)?);

		// The boot program may patch itself.
		bus.write(0x0010, 0x00)?;
		assert_eq!(0x00, bus.read(0x0010)?);

		bus.write(IO_BOOT, 0x01)?;
		assert!(!bus.boot_enabled());
		assert_eq!(0x31, bus.read(0x0000)?);
		assert_eq!(0x00, bus.read(IO_BOOT)?);

		Ok(())
	}

	#[test]
	fn test_bank_registers() -> Result<(), GameboyError> {
		let mut bus = SystemBus::from_cartridge(
			&Config::new(HardwareModel::GBC), None, Cartridge::new(color_rom())?)?;
		assert!(bus.color_mode());

		bus.write(IO_SVBK, 0xFB)?;
		assert_eq!(0x43, bus.read(IO_SVBK)?);

		bus.write(0xD000, 0x33)?;
		assert_eq!(0x33, bus.read_wram(0xD000, 3));
		assert_eq!(0xFF, bus.read_wram(0xD000, 2));

		bus.write(IO_VBK, 0xFF)?;
		assert_eq!(0x01, bus.read(IO_VBK)?);

		bus.write(0x9000, 0x44)?;
		assert_eq!(0x44, bus.read_vram(0x9000, 1));
		assert_eq!(0xFF, bus.read_vram(0x9000, 0));

		Ok(())
	}

	#[test]
	fn test_legacy_banks() -> Result<(), GameboyError> {
		// A monochrome game on the color model.
		let mut bus = SystemBus::from_cartridge(
			&Config::new(HardwareModel::GBC), None, Cartridge::new(empty_rom())?)?;
		assert!(!bus.color_mode());

		bus.write(IO_VBK, 0x01)?;
		bus.write(0x8000, 0x10)?;
		assert_eq!(0x10, bus.read_vram(0x8000, 0));
		assert_eq!(0x10, bus.read_vram(0x8000, 1));

		bus.write(IO_SVBK, 0x05)?;
		bus.write(0xD000, 0x20)?;
		assert_eq!(0x20, bus.read_wram(0xD000, 1));

		Ok(())
	}

	#[test]
	fn test_oam_dma() -> Result<(), GameboyError> {
		let mut bus = setup(None)?;
		let data: Vec<u8> = (0..0xA0).collect();

		bus.write_all(0xC100, &data)?;
		bus.write(0xFF46, 0xC1)?;

		for (offset, value) in data.iter().enumerate() {
			assert_eq!(*value, bus.read(0xFE00 + offset as u16)?);
		}

		Ok(())
	}

	#[test]
	fn test_oam_dma_from_boot() -> Result<(), GameboyError> {
		let mut bus = setup(Some(boot_image()))?;

		bus.perform_dma(0x0000)?;

		assert_eq!(0xA5, bus.read(0xFE00)?);
		assert_eq!(0x9F ^ 0xA5, bus.read(0xFE9F)?);

		Ok(())
	}

	#[test]
	fn test_general_vram_dma() -> Result<(), GameboyError> {
		let mut bus = SystemBus::from_cartridge(
			&Config::new(HardwareModel::GBC), None, Cartridge::new(color_rom())?)?;
		let data: Vec<u8> = (0x10..0x30).collect();

		bus.write_all(0xC200, &data)?;
		bus.write(IO_VBK, 0x01)?;
		bus.write_all(0xFF51, &[0xC2, 0x00, 0x01, 0x00])?;
		bus.write(0xFF55, 0x01)?;

		for (offset, value) in data.iter().enumerate() {
			assert_eq!(*value, bus.read_vram(0x8100 + offset as u16, 1));
		}
		assert_eq!(0xFF, bus.read(0xFF55)?);

		Ok(())
	}

	#[test]
	fn test_hblank_vram_dma() -> Result<(), GameboyError> {
		let mut bus = SystemBus::from_cartridge(
			&Config::new(HardwareModel::GBC), None, Cartridge::new(color_rom())?)?;

		bus.write_all(0xC000, &[0x77; 0x20])?;
		bus.write_all(0xFF51, &[0xC0, 0x00, 0x00, 0x00])?;
		bus.write(0xFF55, 0x81)?;

		// Nothing is copied before the first h-blank.
		assert_eq!(0xFF, bus.read_vram(0x8000, 0));

		bus.process(80 + 172)?;
		assert_eq!(0x77, bus.read_vram(0x800F, 0));
		assert_eq!(0xFF, bus.read_vram(0x8010, 0));

		bus.process(456)?;
		assert_eq!(0x77, bus.read_vram(0x801F, 0));
		assert_eq!(0xFF, bus.read(0xFF55)?);

		Ok(())
	}

	#[test]
	fn test_register_ownership() -> Result<(), GameboyError> {
		let mut bus = setup(None)?;

		assert_eq!(Err(GameboyError::RegisterTaken(0xFF40)), bus.register_io(0xFF40, MappedRegister::VramBank));
		assert_eq!(0x91, bus.read(0xFF40)?);

		Ok(())
	}

	#[test]
	fn test_frame_presentation() -> Result<(), GameboyError> {
		let mut bus = setup(None)?;
		// Every color index maps to the lightest shade.
		bus.write(0xFF47, 0x00)?;

		for _ in 0..(70224 / 4) {
			bus.process(4)?;
		}

		assert_eq!(1, bus.frames());
		assert_eq!(0, bus.read(0xFF44)?);
		assert!(bus.interrupts() & Interrupt::VerticalBlank.value() != 0);

		bus.clear();
		assert_eq!(0, bus.interrupts());

		let mut pixels = vec![0_u32; 160 * 144];
		bus.flush(&mut pixels);
		assert!(pixels.iter().all(|&pixel| pixel == 0x00EBEBEB));

		Ok(())
	}
}
