// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! The cartridge pass-through - owns the game's rom and external ram, parses the
//! header and persists battery-backed ram.
//!
//! Bank controllers are not emulated here: the rom's first 32KB and a single
//! external ram bank are mapped directly. Controllers can be plugged into the bus
//! instead of this type, as long as they implement [`Memory`].

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::GameboyError;
use super::Memory;
use super::consts::*;
use super::memory_range::*;

/// cartridge addresses-related constants.
#[allow(missing_docs)]
pub mod consts {
	use super::*;

	/// Game title.
	pub const ROM_GAME_TITLE: MemoryRange = make_range!(0x0134, 0x0142);

	/// Gameboy color indicator.
	/// 0x80 for GBC, otherwise not.
	pub const ROM_GAMEBOY_COLOR: usize = 0x0143;
	/// Cartridge type.
	///
	/// 0 - ROM Only, 1 - ROM+MBC1, 2 - ROM+MBC1+RAM, 3 - ROM+MBC1+RAM+Battery,
	/// 5 - ROM+MBC2, 6 - ROM+MBC2+Battery, 8 - ROM+RAM, 9 - ROM+RAM+Battery,
	/// 12 - ROM+MBC3+RAM, 13 - ROM+MBC3+RAM+Battery, 19 - ROM+MBC5,
	/// 1A - ROM+MBC5+RAM, 1B - ROM+MBC5+RAM+Battery, 1C - ROM+MBC5+Rumble,
	/// 1D - ROM+MBC5+Rumble+SRAM, 1E - ROM+MBC5+Rumble+SRAM+Battery
	pub const ROM_CARTRIDGE_TYPE: usize = 0x0147;
	/// External ram size code.
	pub const ROM_RAM_SIZE: usize = 0x0149;
	/// Checksum of the header bytes 0x0134-0x014C.
	pub const ROM_HEADER_CHECKSUM: usize = 0x014D;
	/// Big-endian checksum of the complete rom.
	pub const ROM_GLOBAL_CHECKSUM: usize = 0x014E;

	/// The smallest image that contains a complete rom bank.
	pub const ROM_BANK_SIZE: usize = 0x4000;
}

use consts::*;

/// The memory bank controller declared by the header.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum CartridgeType {
	/// A 32KB ROM, occupies 0000-7FFF.
	RomOnly,
	/// Memory bank controller 1.
	MBC1,
	/// Memory bank controller 2.
	MBC2,
	/// Memory bank controller 3, which also contains a real-time clock.
	MBC3,
	/// Memory bank controller 5.
	MBC5,
	/// A controller this library doesn't know about.
	Unknown(u8),
}

impl CartridgeType {
	fn from_header(code: u8) -> Self {
		match code {
			0x00 | 0x08 | 0x09 => CartridgeType::RomOnly,
			0x01 | 0x02 | 0x03 => CartridgeType::MBC1,
			0x05 | 0x06 => CartridgeType::MBC2,
			0x0F..=0x13 => CartridgeType::MBC3,
			0x19..=0x1E => CartridgeType::MBC5,
			_ => CartridgeType::Unknown(code),
		}
	}
}

/// A persistent store for battery-backed cartridge ram.
pub trait SaveStorage {
	/// Returns the bytes stored for the given key, if any.
	fn load(&self, key: &str) -> Option<Vec<u8>>;

	/// Stores the bytes under the given key, replacing older contents.
	fn store(&mut self, key: &str, data: &[u8]) -> Result<(), GameboyError>;
}

/// Keeps saves in memory for the lifetime of the value.
#[derive(Default, Debug)]
pub struct MemoryStorage {
	saves: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
	/// Create an empty storage.
	pub fn new() -> Self {
		Self::default()
	}
}

impl SaveStorage for MemoryStorage {
	fn load(&self, key: &str) -> Option<Vec<u8>> {
		self.saves.get(key).cloned()
	}

	fn store(&mut self, key: &str, data: &[u8]) -> Result<(), GameboyError> {
		self.saves.insert(key.into(), data.to_vec());
		Ok(())
	}
}

/// Keeps every save in a `<key>.sav` file within a directory.
#[cfg(feature = "std")]
pub struct DirectoryStorage {
	root: std::path::PathBuf,
}

#[cfg(feature = "std")]
impl DirectoryStorage {
	/// Create a storage rooted at the given directory.
	pub fn new<P: Into<std::path::PathBuf>>(root: P) -> Self {
		DirectoryStorage { root: root.into() }
	}

	fn path(&self, key: &str) -> std::path::PathBuf {
		self.root.join(format!("{}.sav", key))
	}
}

#[cfg(feature = "std")]
impl SaveStorage for DirectoryStorage {
	fn load(&self, key: &str) -> Option<Vec<u8>> {
		match std::fs::read(self.path(key)) {
			Ok(data) => Some(data),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
			Err(err) => {
				log::warn!("Failed to read the save of {}: {}", key, err);
				None
			}
		}
	}

	fn store(&mut self, key: &str, data: &[u8]) -> Result<(), GameboyError> {
		let path = self.path(key);
		let tmp = path.with_extension("sav.tmp");

		std::fs::write(&tmp, data).map_err(|_| GameboyError::Storage("failed to write save file"))?;
		std::fs::rename(&tmp, &path).map_err(|_| GameboyError::Storage("failed to replace save file"))
	}
}

/// The game's cartridge
pub struct Cartridge {
	rom: Box<[u8]>,
	ram: Box<[u8]>,
	kind: CartridgeType,
}

impl Cartridge {
	/// Initialize a new cartridge given its raw data.
	///
	/// The external ram is sized according to the header.
	pub fn new(rom: Box<[u8]>) -> Result<Self, GameboyError> {
		// Make sure that the rom contains at least a single bank
		if rom.len() < ROM_BANK_SIZE {
			return Err(GameboyError::BadRom(rom.len()));
		}

		let kind = CartridgeType::from_header(rom[ROM_CARTRIDGE_TYPE]);
		let ram = vec![0xFF_u8; Self::ram_size(&rom)].into_boxed_slice();

		log::info!("Loaded a {:?} cartridge with {} bytes of ram", kind, ram.len());

		Ok(Cartridge {
			rom,
			ram,
			kind,
		})
	}

	/// Returns the external ram size declared by the header.
	pub fn ram_size(rom: &[u8]) -> usize {
		match rom[ROM_RAM_SIZE] {
			0x01 => 0x800,
			0x02 => 0x2000,
			0x03 => 0x8000,
			0x04 => 0x20000,
			0x05 => 0x10000,
			_ => 0,
		}
	}

	/// The memory bank controller declared by the header.
	pub fn kind(&self) -> CartridgeType {
		self.kind
	}

	/// Get the title of the game.
	pub fn title(&self) -> &[u8] {
		let title = &self.rom[range_start!(ROM_GAME_TITLE)..=range_end!(ROM_GAME_TITLE)];
		let end = title.iter().position(|&c| c == 0).unwrap_or(title.len());

		&title[..end]
	}

	/// Whether the game makes use of the gameboy color's hardware.
	pub fn supports_color(&self) -> bool {
		self.rom[ROM_GAMEBOY_COLOR] & 0x80 != 0
	}

	/// The header checksum byte.
	pub fn header_checksum(&self) -> u8 {
		self.rom[ROM_HEADER_CHECKSUM]
	}

	/// The rom's global checksum.
	pub fn global_checksum(&self) -> u16 {
		u16::from_be_bytes([self.rom[ROM_GLOBAL_CHECKSUM], self.rom[ROM_GLOBAL_CHECKSUM + 1]])
	}

	/// The key the cartridge's ram is persisted under.
	///
	/// Consists of the trimmed title followed by the header and global checksums
	/// in decimal, without any whitespace.
	pub fn save_identifier(&self) -> String {
		let title: String = self.title().iter().map(|&c| c as char).collect();
		let identifier = format!("{}{}{}", title.trim(), self.header_checksum(), self.global_checksum());

		identifier.chars().filter(|c| !c.is_whitespace()).collect()
	}

	/// The external ram contents.
	pub fn ram(&self) -> &[u8] {
		&self.ram
	}

	/// Restore the external ram from the storage.
	///
	/// Returns whether a save was found.
	pub fn load_ram<S: SaveStorage + ?Sized>(&mut self, storage: &S) -> bool {
		let key = self.save_identifier();

		match storage.load(&key) {
			Some(data) => {
				let size = core::cmp::min(data.len(), self.ram.len());
				self.ram[..size].copy_from_slice(&data[..size]);

				log::info!("Loaded {} bytes of cartridge ram from {}", size, key);
				true
			}
			None => false,
		}
	}

	/// Persist the external ram into the storage.
	pub fn save_ram<S: SaveStorage + ?Sized>(&self, storage: &mut S) -> Result<(), GameboyError> {
		if self.ram.is_empty() {
			return Ok(());
		}

		let key = self.save_identifier();
		storage.store(&key, &self.ram)?;

		log::info!("Stored {} bytes of cartridge ram to {}", self.ram.len(), key);
		Ok(())
	}
}

impl Memory for Cartridge {
	fn write(&mut self, address: u16, value: u8) -> Result<(), GameboyError> {
		match address {
			memory_range!(MMAP_RAM_BANK_SW) => {
				if let Some(cell) = self.ram.get_mut(range_offset!(MMAP_RAM_BANK_SW, address)) {
					*cell = value;
				}
			}
			_ => {
				log::trace!("Cartridge: ignored write of {:#04x} to {:#06x}", value, address);
			}
		}

		Ok(())
	}

	fn read(&self, address: u16) -> Result<u8, GameboyError> {
		let value = match address {
			memory_range!(MMAP_ROM_BANK0) |
			memory_range!(MMAP_ROM_BANK_SW) => {
				self.rom.get(address as usize).copied()
			}
			memory_range!(MMAP_RAM_BANK_SW) => {
				self.ram.get(range_offset!(MMAP_RAM_BANK_SW, address)).copied()
			}
			_ => None,
		};

		// Open bus reads as all ones.
		Ok(value.unwrap_or(0xFF))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	const TEST_GAME_TITLE: &[u8] = b"TEST TITLE\0\0\0\0\0";

	/// Creates an empty rom for testing.
	pub fn empty_rom() -> Box<[u8]> {
		let mut rom = vec![0_u8; 0x8000];
		// ROM-only cartridge with a single ram bank.
		rom[ROM_CARTRIDGE_TYPE] = 0x09;
		rom[ROM_RAM_SIZE] = 0x02;
		// Write the game's title
		rom[range_start!(ROM_GAME_TITLE)..=range_end!(ROM_GAME_TITLE)].clone_from_slice(TEST_GAME_TITLE);
		rom[ROM_HEADER_CHECKSUM] = 0x42;
		rom[ROM_GLOBAL_CHECKSUM] = 0x01;
		rom[ROM_GLOBAL_CHECKSUM + 1] = 0x02;

		rom.into_boxed_slice()
	}

	#[test]
	fn test_cartridge_loading() -> Result<(), GameboyError> {
		let cart = Cartridge::new(empty_rom())?;

		assert_eq!(CartridgeType::RomOnly, cart.kind());
		assert_eq!(b"TEST TITLE", cart.title());
		assert_eq!(0x2000, cart.ram().len());
		assert!(!cart.supports_color());

		Ok(())
	}

	#[test]
	fn test_short_rom() {
		let rom = vec![0_u8; 0x100].into_boxed_slice();

		assert_eq!(Some(GameboyError::BadRom(0x100)), Cartridge::new(rom).err());
	}

	#[test]
	fn test_save_identifier() -> Result<(), GameboyError> {
		let cart = Cartridge::new(empty_rom())?;

		// 0x42 = 66, 0x0102 = 258
		assert_eq!("TESTTITLE66258", cart.save_identifier());

		Ok(())
	}

	#[test]
	fn test_ram_persistence() -> Result<(), GameboyError> {
		let mut storage = MemoryStorage::new();
		let mut cart = Cartridge::new(empty_rom())?;

		cart.write(0xA010, 0x5A)?;
		cart.save_ram(&mut storage)?;

		let mut restored = Cartridge::new(empty_rom())?;
		assert_eq!(0xFF, restored.read(0xA010)?);
		assert!(restored.load_ram(&storage));
		assert_eq!(0x5A, restored.read(0xA010)?);

		Ok(())
	}

	#[test]
	fn test_rom_is_read_only() -> Result<(), GameboyError> {
		let mut cart = Cartridge::new(empty_rom())?;

		cart.write(0x0134, 0x00)?;
		assert_eq!(b'T', cart.read(0x0134)?);
		assert_eq!(0xFF, cart.read(0xFF0F)?);

		Ok(())
	}

	#[test]
	#[cfg(feature = "std")]
	fn test_directory_storage() -> Result<(), GameboyError> {
		let root = std::env::temp_dir().join(format!("gameboy-video-{}", std::process::id()));
		std::fs::create_dir_all(&root).map_err(|_| GameboyError::Storage("failed to create directory"))?;
		let mut storage = DirectoryStorage::new(root.clone());

		assert_eq!(None, storage.load("missing"));

		storage.store("game", &[1, 2, 3])?;
		assert_eq!(Some(vec![1, 2, 3]), storage.load("game"));

		// An unreadable save is treated as a missing one.
		std::fs::create_dir_all(root.join("folder.sav")).map_err(|_| GameboyError::Storage("failed to create directory"))?;
		assert_eq!(None, storage.load("folder"));

		let _ = std::fs::remove_dir_all(&root);

		Ok(())
	}
}
