// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Gameboy's lcd controller / picture processing unit.
//!
//! The controller is a state machine driven by the cycles the cpu reports. Each
//! visible scanline goes through the [`PpuMode::SearchOam`], [`PpuMode::RenderLine`]
//! and [`PpuMode::Hblank`] modes, and the 144 visible lines are followed by a
//! single [`PpuMode::Vblank`] period. The scanline is drawn into an RGBA buffer
//! once per line, and the buffer is presented when entering V-Blank.

pub mod palette;
mod render;

use alloc::boxed::Box;
use alloc::vec;

use palette::{next_index, PaletteMemory};
use render::LineInfo;

use super::ram::InternalRam;

use crate::config::Config;
use crate::interrupts::*;

#[allow(unused, missing_docs)]
pub mod consts {
	pub const WIDTH: usize = 160;
	pub const HEIGHT: usize = 144;
	/// Bytes per framebuffer pixel.
	pub const PIXEL_SIZE: usize = 4;
	pub const FRAME_SIZE: usize = WIDTH * HEIGHT * PIXEL_SIZE;

	// Mode durations, in cycles.
	pub const SEARCH_OAM_CYCLES: usize = 80;
	/// The line is drawn once this many cycles of the transfer mode have passed.
	pub const RENDER_CYCLES: usize = 160;
	pub const TRANSFER_CYCLES: usize = 172;
	pub const HBLANK_CYCLES: usize = 204;
	pub const LINE_CYCLES: usize = 456;
	pub const VBLANK_CYCLES: usize = 4560;

	/// The size of an oam dma transfer.
	pub const OAM_TRANSFER_SIZE: u16 = 0xA0;
	/// The size of a single h-blank dma block.
	pub const HDMA_BLOCK_SIZE: u16 = 0x10;
}

use consts::*;

/// The lcd controller's registers.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum DisplayRegister {
	Lcdc,
	Stat,
	Scy,
	Scx,
	Ly,
	Lyc,
	Dma,
	Bgp,
	Obp0,
	Obp1,
	Wy,
	Wx,
	// Color palettes (GBC)
	Bcps,
	Bcpd,
	Ocps,
	Ocpd,
	// Video memory dma (GBC)
	Hdma1,
	Hdma2,
	Hdma3,
	Hdma4,
	Hdma5,
}

impl DisplayRegister {
	/// The amount of registers in the register bank.
	pub const COUNT: usize = 21;

	/// Every register, in register bank order.
	pub const ALL: [DisplayRegister; DisplayRegister::COUNT] = [
		DisplayRegister::Lcdc,
		DisplayRegister::Stat,
		DisplayRegister::Scy,
		DisplayRegister::Scx,
		DisplayRegister::Ly,
		DisplayRegister::Lyc,
		DisplayRegister::Dma,
		DisplayRegister::Bgp,
		DisplayRegister::Obp0,
		DisplayRegister::Obp1,
		DisplayRegister::Wy,
		DisplayRegister::Wx,
		DisplayRegister::Bcps,
		DisplayRegister::Bcpd,
		DisplayRegister::Ocps,
		DisplayRegister::Ocpd,
		DisplayRegister::Hdma1,
		DisplayRegister::Hdma2,
		DisplayRegister::Hdma3,
		DisplayRegister::Hdma4,
		DisplayRegister::Hdma5,
	];

	/// The address the register is mapped to.
	pub fn address(&self) -> u16 {
		match self {
			DisplayRegister::Lcdc => 0xFF40,
			DisplayRegister::Stat => 0xFF41,
			DisplayRegister::Scy => 0xFF42,
			DisplayRegister::Scx => 0xFF43,
			DisplayRegister::Ly => 0xFF44,
			DisplayRegister::Lyc => 0xFF45,
			DisplayRegister::Dma => 0xFF46,
			DisplayRegister::Bgp => 0xFF47,
			DisplayRegister::Obp0 => 0xFF48,
			DisplayRegister::Obp1 => 0xFF49,
			DisplayRegister::Wy => 0xFF4A,
			DisplayRegister::Wx => 0xFF4B,
			DisplayRegister::Bcps => 0xFF68,
			DisplayRegister::Bcpd => 0xFF69,
			DisplayRegister::Ocps => 0xFF6A,
			DisplayRegister::Ocpd => 0xFF6B,
			DisplayRegister::Hdma1 => 0xFF51,
			DisplayRegister::Hdma2 => 0xFF52,
			DisplayRegister::Hdma3 => 0xFF53,
			DisplayRegister::Hdma4 => 0xFF54,
			DisplayRegister::Hdma5 => 0xFF55,
		}
	}
}

/// The lcd controller peripheral has four states, the first three repeat for
/// each visible line and the last one covers the 10 invisible lines.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PpuMode {
	/// Horizontal blank (mode 0).
	Hblank,
	/// Vertical blank (mode 1).
	Vblank,
	/// Reading the sprite attribute memory (mode 2).
	SearchOam,
	/// Reading the sprite attribute and video memories (mode 3).
	RenderLine,
}

impl PpuMode {
	fn from_bits(bits: u8) -> Self {
		match bits & 0x03 {
			0 => PpuMode::Hblank,
			1 => PpuMode::Vblank,
			2 => PpuMode::SearchOam,
			_ => PpuMode::RenderLine,
		}
	}

	fn bits(&self) -> u8 {
		match self {
			PpuMode::Hblank => 0,
			PpuMode::Vblank => 1,
			PpuMode::SearchOam => 2,
			PpuMode::RenderLine => 3,
		}
	}
}

/// A memory transfer the bus performs on behalf of the lcd controller.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Transfer {
	/// Copy 160 bytes starting at `source` into the sprite attribute memory.
	Oam {
		/// The first address to copy.
		source: u16,
	},
	/// Copy `length` bytes starting at `source` into the selected video memory bank.
	Vram {
		/// The first address to copy.
		source: u16,
		/// The first video memory address to write.
		destination: u16,
		/// The amount of bytes to copy.
		length: u16,
	},
}

/// A view over the lcd control register.
#[derive(Clone, Copy)]
pub struct Lcdc(pub u8);

#[allow(missing_docs)]
impl Lcdc {
	pub fn power(&self) -> bool {
		self.0 & 0x80 != 0
	}

	/// 0 - 0x9800-0x9BFF, 1 - 0x9C00-0x9FFF
	pub fn window_tilemap(&self) -> bool {
		self.0 & 0x40 != 0
	}

	pub fn window_enable(&self) -> bool {
		self.0 & 0x20 != 0
	}

	/// 0 - 0x8800-0x97FF (signed indices), 1 - 0x8000-0x8FFF
	pub fn tileset(&self) -> bool {
		self.0 & 0x10 != 0
	}

	/// 0 - 0x9800-0x9BFF, 1 - 0x9C00-0x9FFF
	pub fn bg_tilemap(&self) -> bool {
		self.0 & 0x8 != 0
	}

	/// 0 - 8x8, 1 - 8x16
	pub fn sprite_size(&self) -> bool {
		self.0 & 0x4 != 0
	}

	pub fn sprites_enable(&self) -> bool {
		self.0 & 0x2 != 0
	}

	/// In color mode, this is the background's master priority instead.
	pub fn bg_enable(&self) -> bool {
		self.0 & 0x1 != 0
	}
}

/// A view over the lcd status register.
#[derive(Clone, Copy)]
pub struct Stat(pub u8);

#[allow(missing_docs)]
impl Stat {
	pub fn lyc_check_enable(&self) -> bool {
		self.0 & 0x40 != 0
	}

	pub fn oam_check_enable(&self) -> bool {
		self.0 & 0x20 != 0
	}

	pub fn vblank_check_enable(&self) -> bool {
		self.0 & 0x10 != 0
	}

	pub fn hblank_check_enable(&self) -> bool {
		self.0 & 0x8 != 0
	}

	pub fn coincidence(&self) -> bool {
		self.0 & 0x4 != 0
	}

	pub fn mode(&self) -> PpuMode {
		PpuMode::from_bits(self.0)
	}
}

/// The gameboy's lcd controller.
pub struct Ppu {
	registers: [u8; DisplayRegister::COUNT],
	/// The frame being drawn.
	buffer: Box<[u8]>,
	/// The last presented frame.
	screen: Box<[u8]>,
	line: LineInfo,
	bg_palettes: PaletteMemory,
	obj_palettes: PaletteMemory,
	palettes_written: bool,
	shades: [u8; 4],
	sprite_limit: bool,

	cycles: usize,
	vblank_cycles: usize,
	vblank_lines: usize,
	transferred: bool,
	hblank_dma: bool,
	frames: usize,
	interrupt_flag: InterruptMask,
}

impl Ppu {
	/// Initialize a new ppu instance.
	pub fn new(config: &Config) -> Self {
		let mut ppu = Ppu {
			registers: [0; DisplayRegister::COUNT],
			buffer: vec![0; FRAME_SIZE].into_boxed_slice(),
			screen: vec![0; FRAME_SIZE].into_boxed_slice(),
			line: LineInfo::default(),
			bg_palettes: PaletteMemory::new(),
			obj_palettes: PaletteMemory::new(),
			palettes_written: false,
			shades: config.shades,
			sprite_limit: config.sprite_limit,
			cycles: 0,
			vblank_cycles: 0,
			vblank_lines: 0,
			transferred: false,
			hblank_dma: false,
			frames: 0,
			interrupt_flag: 0,
		};

		ppu.reset();

		ppu
	}

	/// Reset this peripheral to boot state.
	pub fn reset(&mut self) {
		self.registers = [0; DisplayRegister::COUNT];
		self.set(DisplayRegister::Lcdc, 0x91);
		self.set(DisplayRegister::Bgp, 0xFC);
		self.set(DisplayRegister::Obp0, 0xFF);
		self.set(DisplayRegister::Obp1, 0xFF);
		self.set(DisplayRegister::Hdma5, 0xFF);
		self.set_mode(PpuMode::SearchOam);
		self.update_coincidence();

		self.bg_palettes = PaletteMemory::new();
		self.obj_palettes = PaletteMemory::new();
		self.palettes_written = false;
		self.cycles = 0;
		self.vblank_cycles = 0;
		self.vblank_lines = 0;
		self.transferred = false;
		self.hblank_dma = false;
		self.interrupt_flag = 0;

		self.blank();
		self.screen.copy_from_slice(&self.buffer);
	}

	fn get(&self, register: DisplayRegister) -> u8 {
		self.registers[register as usize]
	}

	fn set(&mut self, register: DisplayRegister, value: u8) {
		self.registers[register as usize] = value;
	}

	fn lcdc(&self) -> Lcdc {
		Lcdc(self.get(DisplayRegister::Lcdc))
	}

	fn stat(&self) -> Stat {
		Stat(self.get(DisplayRegister::Stat))
	}

	/// The controller's current mode, as exposed by the status register.
	pub fn mode(&self) -> PpuMode {
		self.stat().mode()
	}

	fn set_mode(&mut self, mode: PpuMode) {
		let stat = self.get(DisplayRegister::Stat);
		self.set(DisplayRegister::Stat, (stat & !0x03) | mode.bits());
	}

	/// The scanline currently being processed.
	pub fn ly(&self) -> u8 {
		self.get(DisplayRegister::Ly)
	}

	/// The amount of full lines spent in the current (or last) V-Blank period.
	///
	/// This counter isn't visible to the emulated software, it's meant for pacing
	/// the host.
	pub fn vblank_lines(&self) -> usize {
		self.vblank_lines
	}

	/// The amount of frames presented so far.
	pub fn frames(&self) -> usize {
		self.frames
	}

	/// The last presented frame, as RGBA bytes.
	pub fn frame(&self) -> &[u8] {
		&self.screen
	}

	/// Whether a color palette was written since the last reset.
	///
	/// While the boot program runs, this is what tells the color boot program
	/// apart from the monochrome one.
	pub fn palettes_written(&self) -> bool {
		self.palettes_written
	}

	/// Raises the given interrupt.
	fn raise(&mut self, interrupt: Interrupt) {
		self.interrupt_flag |= interrupt.value();
	}

	/// Re-evaluates the coincidence flag.
	///
	/// Returns whether the flag was just set.
	fn update_coincidence(&mut self) -> bool {
		let stat = self.get(DisplayRegister::Stat);
		let matches = self.get(DisplayRegister::Ly) == self.get(DisplayRegister::Lyc);

		if matches {
			self.set(DisplayRegister::Stat, stat | 0x04);
		} else {
			self.set(DisplayRegister::Stat, stat & !0x04);
		}

		matches && (stat & 0x04 == 0)
	}

	/// Moves to the next line, raising the coincidence interrupt if enabled.
	fn set_line(&mut self, line: u8) {
		self.set(DisplayRegister::Ly, line);

		if self.update_coincidence() && self.stat().lyc_check_enable() {
			self.raise(Interrupt::LcdStat);
		}
	}

	/// Fills the frame being drawn with the lightest shade.
	fn blank(&mut self) {
		let shade = self.shades[0];

		for pixel in self.buffer.chunks_exact_mut(PIXEL_SIZE) {
			pixel.copy_from_slice(&[shade, shade, shade, 0xFF]);
		}
	}

	/// Publishes the frame being drawn.
	fn present(&mut self) {
		self.screen.copy_from_slice(&self.buffer);
		self.frames += 1;

		log::trace!("Ppu: presented frame {}", self.frames);
	}

	/// Update the ppu's state according to the elapsed time.
	///
	/// `color` tells whether the line should be drawn with the color hardware.
	/// Returns a transfer the bus should perform, if an h-blank dma block is due.
	pub fn process(&mut self, cycles: usize, ram: &InternalRam, color: bool) -> Option<Transfer> {
		if !self.lcdc().power() {
			// LCD is powered off.
			self.set(DisplayRegister::Ly, 0);
			self.set_mode(PpuMode::Hblank);
			self.cycles = 0;
			return None;
		}

		self.cycles += cycles;

		if self.mode() == PpuMode::Vblank {
			self.vblank_cycles += cycles;
		}

		let mut transfer = None;

		// Keep moving between modes while there are enough cycles.
		while self.step(ram, color, &mut transfer) {}

		transfer
	}

	/// Performs a single mode transition, if it's due.
	fn step(&mut self, ram: &InternalRam, color: bool, transfer: &mut Option<Transfer>) -> bool {
		match self.mode() {
			PpuMode::SearchOam => {
				if self.cycles < SEARCH_OAM_CYCLES {
					return false;
				}

				self.cycles -= SEARCH_OAM_CYCLES;
				self.transferred = false;
				self.set_mode(PpuMode::RenderLine);
			}

			PpuMode::RenderLine => {
				if self.cycles >= RENDER_CYCLES && !self.transferred {
					self.render_line(ram, color);
					self.transferred = true;
				}

				if self.cycles < TRANSFER_CYCLES {
					return false;
				}

				self.cycles -= TRANSFER_CYCLES;
				self.set_mode(PpuMode::Hblank);

				if self.stat().hblank_check_enable() {
					self.raise(Interrupt::LcdStat);
				}

				if transfer.is_none() {
					*transfer = self.hblank_transfer();
				}
			}

			PpuMode::Hblank => {
				if self.cycles < HBLANK_CYCLES {
					return false;
				}

				self.cycles -= HBLANK_CYCLES;
				self.set_line(self.ly().wrapping_add(1));

				if self.ly() as usize == HEIGHT {
					// Start V-Blank.
					self.present();
					self.vblank_cycles = self.cycles;
					self.vblank_lines = 0;
					self.set_mode(PpuMode::Vblank);
					self.raise(Interrupt::VerticalBlank);

					if self.stat().vblank_check_enable() {
						self.raise(Interrupt::LcdStat);
					}
				} else {
					self.set_mode(PpuMode::SearchOam);

					if self.stat().oam_check_enable() {
						self.raise(Interrupt::LcdStat);
					}
				}
			}

			PpuMode::Vblank => {
				while self.vblank_cycles > LINE_CYCLES {
					self.vblank_cycles -= LINE_CYCLES;
					self.vblank_lines += 1;
				}

				if self.cycles < VBLANK_CYCLES {
					return false;
				}

				self.cycles -= VBLANK_CYCLES;
				self.set_line(0);
				self.set_mode(PpuMode::SearchOam);
			}
		}

		true
	}

	/// Reads one of the lcd controller's registers.
	pub fn read_register(&self, register: DisplayRegister) -> u8 {
		match register {
			// Bit 7 is unused and always set.
			DisplayRegister::Stat => self.get(register) | 0x80,
			_ => self.get(register),
		}
	}

	/// Writes one of the lcd controller's registers.
	///
	/// Returns a transfer the bus should perform as a result of the write.
	pub fn write_register(&mut self, register: DisplayRegister, value: u8) -> Option<Transfer> {
		match register {
			DisplayRegister::Lcdc => {
				self.write_lcdc(value);
			}
			DisplayRegister::Stat => {
				// The mode and the coincidence flag are read-only.
				let stat = self.get(register);
				self.set(register, (value & 0x78) | (stat & 0x07));
			}
			DisplayRegister::Ly => {
				log::debug!("Ppu: ignored write of {:#04x} to LY", value);
			}
			DisplayRegister::Lyc => {
				self.set(register, value);
				self.update_coincidence();
			}
			DisplayRegister::Dma => {
				self.set(register, value);
				return Some(Transfer::Oam { source: (value as u16) << 8 });
			}
			DisplayRegister::Bcps => {
				self.write_palette_index(true, value);
			}
			DisplayRegister::Bcpd => {
				self.write_palette_data(true, value);
			}
			DisplayRegister::Ocps => {
				self.write_palette_index(false, value);
			}
			DisplayRegister::Ocpd => {
				self.write_palette_data(false, value);
			}
			DisplayRegister::Hdma5 => {
				return self.write_hdma_control(value);
			}
			_ => {
				self.set(register, value);
			}
		}

		None
	}

	fn write_lcdc(&mut self, value: u8) {
		let was_on = self.lcdc().power();
		self.set(DisplayRegister::Lcdc, value);

		if !Lcdc(value).power() {
			// The screen turns to its lightest shade right away.
			self.blank();
			self.present();
			self.set(DisplayRegister::Ly, 0);
			self.set_mode(PpuMode::Hblank);
			self.cycles = 0;

			if was_on {
				log::info!("Ppu: lcd turned off");
			}
		} else if !was_on {
			// Restart from the top of the screen, without raising anything.
			self.set(DisplayRegister::Ly, 0);
			self.update_coincidence();
			self.set_mode(PpuMode::SearchOam);
			self.cycles = 0;
			self.vblank_cycles = 0;
			self.transferred = false;

			log::info!("Ppu: lcd turned on");
		}
	}

	/// The index and data registers of a palette memory.
	fn palette_registers(background: bool) -> (DisplayRegister, DisplayRegister) {
		if background {
			(DisplayRegister::Bcps, DisplayRegister::Bcpd)
		} else {
			(DisplayRegister::Ocps, DisplayRegister::Ocpd)
		}
	}

	fn palette_memory(&mut self, background: bool) -> &mut PaletteMemory {
		if background { &mut self.bg_palettes } else { &mut self.obj_palettes }
	}

	/// Selects a palette memory byte, and latches its value into the data register.
	fn write_palette_index(&mut self, background: bool, value: u8) {
		let (index, data) = Self::palette_registers(background);
		let read_back = self.palette_memory(background).read(value);

		self.set(index, value);
		self.set(data, read_back);
		self.palettes_written = true;
	}

	/// Writes the selected palette memory byte, and moves the index forward if needed.
	fn write_palette_data(&mut self, background: bool, value: u8) {
		let (index, _) = Self::palette_registers(background);
		let selected = self.get(index);

		self.palette_memory(background).write(selected, value);

		// Also refreshes the data register.
		self.write_palette_index(background, next_index(selected));
	}

	fn hdma_source(&self) -> u16 {
		u16::from_be_bytes([self.get(DisplayRegister::Hdma1), self.get(DisplayRegister::Hdma2)]) & 0xFFF0
	}

	fn hdma_destination(&self) -> u16 {
		0x8000 | (u16::from_be_bytes([self.get(DisplayRegister::Hdma3), self.get(DisplayRegister::Hdma4)]) & 0x1FF0)
	}

	/// Builds a video memory transfer, and moves the dma addresses past it.
	fn hdma_transfer(&mut self, length: u16) -> Transfer {
		let source = self.hdma_source();
		let destination = self.hdma_destination();

		let [source_high, source_low] = source.wrapping_add(length).to_be_bytes();
		let [destination_high, destination_low] = destination.wrapping_add(length).to_be_bytes();
		self.set(DisplayRegister::Hdma1, source_high);
		self.set(DisplayRegister::Hdma2, source_low);
		self.set(DisplayRegister::Hdma3, destination_high & 0x1F);
		self.set(DisplayRegister::Hdma4, destination_low);

		Transfer::Vram { source, destination, length }
	}

	fn write_hdma_control(&mut self, value: u8) -> Option<Transfer> {
		let blocks = value & 0x7F;

		if value & 0x80 != 0 {
			// H-Blank dma, a block is copied whenever H-Blank starts.
			self.hblank_dma = true;
			self.set(DisplayRegister::Hdma5, blocks);
			log::debug!("Ppu: h-blank dma of {} blocks", blocks as u16 + 1);
			return None;
		}

		if self.hblank_dma {
			// Cancels the running h-blank dma.
			self.hblank_dma = false;
			let remaining = self.get(DisplayRegister::Hdma5) & 0x7F;
			self.set(DisplayRegister::Hdma5, 0x80 | remaining);
			return None;
		}

		// General purpose dma, everything is copied at once.
		let transfer = self.hdma_transfer((blocks as u16 + 1) * HDMA_BLOCK_SIZE);
		self.set(DisplayRegister::Hdma5, 0xFF);

		Some(transfer)
	}

	/// Returns the next h-blank dma block, if a transfer is running.
	fn hblank_transfer(&mut self) -> Option<Transfer> {
		if !self.hblank_dma {
			return None;
		}

		let transfer = self.hdma_transfer(HDMA_BLOCK_SIZE);
		let remaining = self.get(DisplayRegister::Hdma5) & 0x7F;

		if remaining == 0 {
			self.hblank_dma = false;
			self.set(DisplayRegister::Hdma5, 0xFF);
		} else {
			self.set(DisplayRegister::Hdma5, remaining - 1);
		}

		Some(transfer)
	}
}

impl InterruptSource for Ppu {
	fn interrupts(&self) -> InterruptMask {
		self.interrupt_flag
	}

	fn clear(&mut self) {
		self.interrupt_flag = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::GameboyError;

	fn setup() -> Result<(Ppu, InternalRam), GameboyError> {
		Ok((Ppu::new(&Config::default()), InternalRam::new(None)?))
	}

	/// Runs the ppu with small steps, counting mode entries.
	fn run(ppu: &mut Ppu, ram: &InternalRam, cycles: usize, step: usize) -> [usize; 4] {
		let mut entries = [0; 4];
		let mut elapsed = 0;

		while elapsed < cycles {
			let before = ppu.mode();
			ppu.process(step, ram, false);
			elapsed += step;

			if before != ppu.mode() {
				entries[ppu.mode().bits() as usize] += 1;
			}
		}

		entries
	}

	#[test]
	fn test_initial_state() -> Result<(), GameboyError> {
		let (ppu, _) = setup()?;

		assert_eq!(PpuMode::SearchOam, ppu.mode());
		assert_eq!(0x02, ppu.read_register(DisplayRegister::Stat) & 0x03);
		assert_eq!(0, ppu.ly());

		Ok(())
	}

	#[test]
	fn test_frame_timing() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		// 144 lines and the V-Blank period.
		let frame = HEIGHT * LINE_CYCLES + VBLANK_CYCLES;
		assert_eq!(70224, frame);

		let entries = run(&mut ppu, &ram, HEIGHT * LINE_CYCLES, 4);
		assert_eq!(PpuMode::Vblank, ppu.mode());
		assert_eq!(HEIGHT, entries[PpuMode::Hblank.bits() as usize]);
		assert_eq!(1, entries[PpuMode::Vblank.bits() as usize]);
		assert_eq!(HEIGHT as u8, ppu.ly());
		assert_eq!(1, ppu.frames());

		run(&mut ppu, &ram, VBLANK_CYCLES - 4, 4);
		assert_eq!(PpuMode::Vblank, ppu.mode());

		run(&mut ppu, &ram, 4, 4);
		assert_eq!(PpuMode::SearchOam, ppu.mode());
		assert_eq!(0, ppu.ly());
		assert_eq!(9, ppu.vblank_lines());

		Ok(())
	}

	#[test]
	fn test_large_deltas() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		// A whole frame at once goes through every mode.
		ppu.process(HEIGHT * LINE_CYCLES + VBLANK_CYCLES, &ram, false);

		assert_eq!(PpuMode::SearchOam, ppu.mode());
		assert_eq!(0, ppu.ly());
		assert_eq!(1, ppu.frames());

		Ok(())
	}

	#[test]
	fn test_coincidence_flag() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		ppu.write_register(DisplayRegister::Lyc, 3);
		assert_eq!(0, ppu.read_register(DisplayRegister::Stat) & 0x04);

		for line in 1..10_u8 {
			run(&mut ppu, &ram, LINE_CYCLES, 4);

			assert_eq!(line, ppu.ly());
			assert_eq!(line == 3, ppu.read_register(DisplayRegister::Stat) & 0x04 != 0);
		}

		Ok(())
	}

	#[test]
	fn test_coincidence_interrupt() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		ppu.write_register(DisplayRegister::Stat, 0x40);
		ppu.write_register(DisplayRegister::Lyc, 2);

		run(&mut ppu, &ram, LINE_CYCLES, 4);
		assert_eq!(0, ppu.interrupts());

		run(&mut ppu, &ram, LINE_CYCLES, 4);
		assert_eq!(Interrupt::LcdStat.value(), ppu.interrupts());

		Ok(())
	}

	#[test]
	fn test_mode_interrupts() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		// H-Blank only.
		ppu.write_register(DisplayRegister::Stat, 0x08);
		run(&mut ppu, &ram, SEARCH_OAM_CYCLES + TRANSFER_CYCLES, 4);
		assert_eq!(Interrupt::LcdStat.value(), ppu.interrupts());
		ppu.clear();

		// Nothing is raised when reaching the next line's oam search.
		run(&mut ppu, &ram, HBLANK_CYCLES, 4);
		assert_eq!(0, ppu.interrupts());

		// V-Blank raises its own interrupt, and the status one when enabled.
		ppu.write_register(DisplayRegister::Stat, 0x10);
		run(&mut ppu, &ram, (HEIGHT - 1) * LINE_CYCLES, 4);
		assert_eq!(Interrupt::VerticalBlank.value() | Interrupt::LcdStat.value(), ppu.interrupts());

		Ok(())
	}

	#[test]
	fn test_oam_search_interrupt() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		ppu.write_register(DisplayRegister::Stat, 0x20);
		run(&mut ppu, &ram, LINE_CYCLES, 4);

		assert_eq!(PpuMode::SearchOam, ppu.mode());
		assert_eq!(1, ppu.ly());
		assert_eq!(Interrupt::LcdStat.value(), ppu.interrupts());

		// Entering V-Blank isn't an oam search.
		run(&mut ppu, &ram, (HEIGHT - 2) * LINE_CYCLES, 4);
		assert_eq!((HEIGHT - 1) as u8, ppu.ly());
		ppu.clear();

		run(&mut ppu, &ram, LINE_CYCLES, 4);
		assert_eq!(PpuMode::Vblank, ppu.mode());
		assert_eq!(Interrupt::VerticalBlank.value(), ppu.interrupts());

		Ok(())
	}

	#[test]
	fn test_lcd_power_cycle() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		run(&mut ppu, &ram, 10 * LINE_CYCLES + 100, 4);
		assert_eq!(10, ppu.ly());

		ppu.write_register(DisplayRegister::Stat, 0x78);
		ppu.write_register(DisplayRegister::Lcdc, 0x11);
		assert_eq!(0, ppu.ly());
		assert_eq!(PpuMode::Hblank, ppu.mode());

		// Time doesn't pass while the lcd is off.
		run(&mut ppu, &ram, 2 * LINE_CYCLES, 4);
		assert_eq!(0, ppu.ly());
		assert_eq!(PpuMode::Hblank, ppu.mode());

		ppu.write_register(DisplayRegister::Lcdc, 0x91);
		assert_eq!(0, ppu.ly());
		assert_eq!(PpuMode::SearchOam, ppu.mode());
		assert_eq!(0, ppu.interrupts());

		Ok(())
	}

	#[test]
	fn test_lcd_off_blanks_screen() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;
		let frames = ppu.frames();

		ppu.buffer.iter_mut().for_each(|byte| *byte = 0);
		ppu.write_register(DisplayRegister::Lcdc, 0x00);

		assert_eq!(frames + 1, ppu.frames());
		assert!(ppu.frame().chunks_exact(4).all(|pixel| pixel == [0xEB, 0xEB, 0xEB, 0xFF]));

		Ok(())
	}

	#[test]
	fn test_read_only_bits() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;

		ppu.write_register(DisplayRegister::Ly, 0x42);
		ppu.write_register(DisplayRegister::Stat, 0xFF);

		assert_eq!(0, ppu.ly());
		// Mode 2 and the coincidence flag are kept.
		assert_eq!(0xFE, ppu.read_register(DisplayRegister::Stat));

		Ok(())
	}

	#[test]
	fn test_oam_dma_request() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;

		assert_eq!(Some(Transfer::Oam { source: 0xC100 }), ppu.write_register(DisplayRegister::Dma, 0xC1));
		assert_eq!(0xC1, ppu.read_register(DisplayRegister::Dma));

		Ok(())
	}

	#[test]
	fn test_palette_round_trip() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;
		let written: [u8; 8] = [0xFF, 0x7F, 0x1F, 0x00, 0xE0, 0x03, 0x4A, 0x29];

		// Auto-increment from palette 1, color 0.
		ppu.write_register(DisplayRegister::Bcps, 0x88);
		for value in written.iter() {
			ppu.write_register(DisplayRegister::Bcpd, *value);
		}
		assert_eq!(0x90, ppu.read_register(DisplayRegister::Bcps));

		for (offset, value) in written.iter().enumerate() {
			ppu.write_register(DisplayRegister::Bcps, 0x08 + offset as u8);

			let expected = if offset % 2 == 0 { *value } else { *value & 0x7F };
			assert_eq!(expected, ppu.read_register(DisplayRegister::Bcpd));
		}

		// The sprite palettes are a separate memory.
		ppu.write_register(DisplayRegister::Ocps, 0x08);
		assert_eq!(0xFF, ppu.read_register(DisplayRegister::Ocpd));
		ppu.write_register(DisplayRegister::Ocps, 0x09);
		assert_eq!(0x7F, ppu.read_register(DisplayRegister::Ocpd));
		assert!(ppu.palettes_written());

		Ok(())
	}

	#[test]
	fn test_palette_packing() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;

		// The high byte's bit 7 isn't stored.
		ppu.write_register(DisplayRegister::Ocps, 0x01);
		ppu.write_register(DisplayRegister::Ocpd, 0xFF);
		assert_eq!(0x7F, ppu.read_register(DisplayRegister::Ocpd));

		// The green bits of the low byte are shared with the high byte.
		ppu.write_register(DisplayRegister::Ocps, 0x00);
		ppu.write_register(DisplayRegister::Ocpd, 0x00);
		assert_eq!(0x00, ppu.read_register(DisplayRegister::Ocpd));
		ppu.write_register(DisplayRegister::Ocps, 0x01);
		assert_eq!(0x7F, ppu.read_register(DisplayRegister::Ocpd));

		Ok(())
	}

	#[test]
	fn test_general_hdma() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;

		ppu.write_register(DisplayRegister::Hdma1, 0xC1);
		ppu.write_register(DisplayRegister::Hdma2, 0x2F);
		ppu.write_register(DisplayRegister::Hdma3, 0xF0);
		ppu.write_register(DisplayRegister::Hdma4, 0x05);

		let transfer = ppu.write_register(DisplayRegister::Hdma5, 0x01);
		assert_eq!(Some(Transfer::Vram { source: 0xC120, destination: 0x9000, length: 0x20 }), transfer);
		assert_eq!(0xFF, ppu.read_register(DisplayRegister::Hdma5));

		Ok(())
	}

	#[test]
	fn test_hblank_hdma() -> Result<(), GameboyError> {
		let (mut ppu, ram) = setup()?;

		ppu.write_register(DisplayRegister::Hdma1, 0xD0);
		ppu.write_register(DisplayRegister::Hdma2, 0x00);
		ppu.write_register(DisplayRegister::Hdma3, 0x00);
		ppu.write_register(DisplayRegister::Hdma4, 0x40);
		assert_eq!(None, ppu.write_register(DisplayRegister::Hdma5, 0x81));
		assert_eq!(0x01, ppu.read_register(DisplayRegister::Hdma5));

		let first = ppu.process(SEARCH_OAM_CYCLES + TRANSFER_CYCLES, &ram, true);
		assert_eq!(Some(Transfer::Vram { source: 0xD000, destination: 0x8040, length: 0x10 }), first);
		assert_eq!(0x00, ppu.read_register(DisplayRegister::Hdma5));

		let second = ppu.process(LINE_CYCLES, &ram, true);
		assert_eq!(Some(Transfer::Vram { source: 0xD010, destination: 0x8050, length: 0x10 }), second);
		assert_eq!(0xFF, ppu.read_register(DisplayRegister::Hdma5));

		assert_eq!(None, ppu.process(LINE_CYCLES, &ram, true));

		Ok(())
	}

	#[test]
	fn test_hblank_hdma_cancel() -> Result<(), GameboyError> {
		let (mut ppu, _) = setup()?;

		ppu.write_register(DisplayRegister::Hdma5, 0x83);
		assert_eq!(None, ppu.write_register(DisplayRegister::Hdma5, 0x00));
		assert_eq!(0x83, ppu.read_register(DisplayRegister::Hdma5));

		Ok(())
	}
}
