// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Scanline rendering.
//!
//! Each visible line is drawn in three passes: the background, the window on top
//! of it, and finally the sprites. The background and window passes record the
//! color index and the priority flag of every pixel, which decide whether a
//! sprite pixel may be drawn over them.

use num::Integer;

use super::consts::*;
use super::{DisplayRegister, Ppu};

use crate::bus::ram::InternalRam;

/// The first background/window tile map.
const TILEMAP_LOW: u16 = 0x9800;
/// The second background/window tile map.
const TILEMAP_HIGH: u16 = 0x9C00;
/// Tiles indexed by an unsigned number.
const TILESET_UNSIGNED: u16 = 0x8000;
/// Tiles indexed by a signed number.
const TILESET_SIGNED: u16 = 0x9000;

const TILE_SIZE: u16 = 0x10;
const TILEMAP_WIDTH: u16 = 32;

const OAM_ENTRIES: usize = 40;
const SPRITES_PER_LINE: usize = 10;

/// What the background and window passes left at each pixel of the line.
pub struct LineInfo {
	color: [u8; WIDTH],
	priority: [bool; WIDTH],
}

impl LineInfo {
	fn reset(&mut self) {
		self.color = [0; WIDTH];
		self.priority = [false; WIDTH];
	}
}

impl Default for LineInfo {
	fn default() -> Self {
		LineInfo {
			color: [0; WIDTH],
			priority: [false; WIDTH],
		}
	}
}

/// Returns the address of a tile's data.
///
/// The signed tileset treats the index as -128..127, relative to 0x9000.
pub fn tile_address(unsigned: bool, index: u8) -> u16 {
	if unsigned {
		TILESET_UNSIGNED + index as u16 * TILE_SIZE
	} else {
		(TILESET_SIGNED as i32 + (index as i8 as i32) * TILE_SIZE as i32) as u16
	}
}

/// Combines the two bit-planes of a tile row into the color index of a pixel.
fn pixel_index(low: u8, high: u8, bit: u8) -> u8 {
	(((high >> bit) & 1) << 1) | ((low >> bit) & 1)
}

/// Background map attributes (color mode only).
#[derive(Clone, Copy, Default)]
struct TileAttributes {
	palette: u8,
	bank: u8,
	flip_x: bool,
	flip_y: bool,
	priority: bool,
}

impl TileAttributes {
	fn new(value: u8) -> Self {
		TileAttributes {
			palette: value & 0x07,
			bank: (value >> 3) & 0x01,
			flip_x: value & 0x20 != 0,
			flip_y: value & 0x40 != 0,
			priority: value & 0x80 != 0,
		}
	}
}

/// A decoded sprite attribute memory entry.
#[derive(Clone, Copy)]
struct Sprite {
	y: i16,
	x: i16,
	tile: u8,
	flags: u8,
}

impl Sprite {
	fn new(entry: &[u8]) -> Self {
		Sprite {
			y: entry[0] as i16 - 16,
			x: entry[1] as i16 - 8,
			tile: entry[2],
			flags: entry[3],
		}
	}

	fn above_background(&self) -> bool {
		self.flags & 0x80 == 0
	}

	fn flip_y(&self) -> bool {
		self.flags & 0x40 != 0
	}

	fn flip_x(&self) -> bool {
		self.flags & 0x20 != 0
	}

	/// Selects OBP1 over OBP0 (monochrome only).
	fn palette_select(&self) -> bool {
		self.flags & 0x10 != 0
	}

	fn bank(&self) -> u8 {
		(self.flags >> 3) & 0x01
	}

	fn color_palette(&self) -> u8 {
		self.flags & 0x07
	}
}

/// Describes a background or window pass.
struct TileLayer {
	map: u16,
	/// The line within the layer.
	source_y: u8,
	/// The first screen pixel the layer covers.
	start: usize,
	/// Added to the screen x to get the x within the layer.
	offset: u8,
}

impl Ppu {
	/// Draws the current line into the frame.
	pub(super) fn render_line(&mut self, ram: &InternalRam, color: bool) {
		self.render_background(ram, color);
		self.render_window(ram, color);
		self.render_sprites(ram, color);
	}

	/// Writes a pixel into the frame being drawn.
	fn put_pixel(&mut self, x: usize, rgb: [u8; 3]) {
		let offset = (self.ly() as usize * WIDTH + x) * PIXEL_SIZE;
		self.buffer[offset..offset + PIXEL_SIZE].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
	}

	/// Maps a color index through one of the monochrome palette registers.
	fn shade(&self, palette: u8, index: u8) -> [u8; 3] {
		let shade = self.shades[((palette >> (index * 2)) & 0x03) as usize];
		[shade, shade, shade]
	}

	fn render_background(&mut self, ram: &InternalRam, color: bool) {
		let lcdc = self.lcdc();

		// In color mode, this bit has another meaning.
		if !lcdc.bg_enable() && !color {
			self.line.reset();
			for x in 0..WIDTH {
				let shade = self.shades[0];
				self.put_pixel(x, [shade, shade, shade]);
			}
			return;
		}

		let layer = TileLayer {
			map: if lcdc.bg_tilemap() { TILEMAP_HIGH } else { TILEMAP_LOW },
			source_y: self.ly().wrapping_add(self.get(DisplayRegister::Scy)),
			start: 0,
			offset: self.get(DisplayRegister::Scx),
		};

		self.render_tiles(ram, color, &layer);
	}

	fn render_window(&mut self, ram: &InternalRam, color: bool) {
		let lcdc = self.lcdc();
		let wx = self.get(DisplayRegister::Wx) as i16 - 7;
		let wy = self.get(DisplayRegister::Wy);

		if !lcdc.window_enable() || wx >= WIDTH as i16 {
			return;
		}

		if wy as usize >= HEIGHT || wy > self.ly() {
			return;
		}

		let layer = TileLayer {
			map: if lcdc.window_tilemap() { TILEMAP_HIGH } else { TILEMAP_LOW },
			source_y: self.ly() - wy,
			start: core::cmp::max(wx, 0) as usize,
			offset: 7_u8.wrapping_sub(self.get(DisplayRegister::Wx)),
		};

		self.render_tiles(ram, color, &layer);
	}

	/// Draws a background-like layer from `layer.start` to the end of the line.
	fn render_tiles(&mut self, ram: &InternalRam, color: bool, layer: &TileLayer) {
		let unsigned = self.lcdc().tileset();
		let (tile_y, row) = layer.source_y.div_rem(&8);

		// The current tile's row, fetched once per tile.
		let mut fetched: Option<u8> = None;
		let mut attributes = TileAttributes::default();
		let mut low = 0;
		let mut high = 0;

		for x in layer.start..WIDTH {
			let source_x = (x as u8).wrapping_add(layer.offset);
			let (tile_x, column) = source_x.div_rem(&8);

			if fetched != Some(tile_x) {
				let map_address = layer.map + tile_y as u16 * TILEMAP_WIDTH + tile_x as u16;
				let index = ram.read_vram(map_address, 0);

				attributes = if color {
					TileAttributes::new(ram.read_vram(map_address, 1))
				} else {
					TileAttributes::default()
				};

				let row = if attributes.flip_y { 7 - row } else { row };
				let address = tile_address(unsigned, index) + row as u16 * 2;

				low = ram.read_vram(address, attributes.bank);
				high = ram.read_vram(address + 1, attributes.bank);
				fetched = Some(tile_x);
			}

			let bit = if attributes.flip_x { column } else { 7 - column };
			let index = pixel_index(low, high, bit);

			let rgb = if color {
				self.bg_palettes.color(attributes.palette, index).to_rgb()
			} else {
				self.shade(self.get(DisplayRegister::Bgp), index)
			};

			self.line.color[x] = index;
			self.line.priority[x] = attributes.priority;
			self.put_pixel(x, rgb);
		}
	}

	fn render_sprites(&mut self, ram: &InternalRam, color: bool) {
		let lcdc = self.lcdc();

		if !lcdc.sprites_enable() {
			return;
		}

		let height: i16 = if lcdc.sprite_size() { 16 } else { 8 };
		let line = self.ly() as i16;
		let limit = if self.sprite_limit { SPRITES_PER_LINE } else { OAM_ENTRIES };

		let mut selected = [None; OAM_ENTRIES];
		let visible = ram.oam()
			.chunks_exact(4)
			.take(OAM_ENTRIES)
			.map(Sprite::new)
			.filter(|sprite| line >= sprite.y && line < sprite.y + height)
			.take(limit);

		for (slot, sprite) in selected.iter_mut().zip(visible) {
			*slot = Some(sprite);
		}

		// Background always loses to sprites when its master priority is off.
		let master_override = color && !lcdc.bg_enable();

		if self.sprite_limit {
			// Lower entries end up on top.
			for sprite in selected.iter().rev().flatten() {
				self.draw_sprite(ram, color, sprite, height, master_override);
			}
		} else {
			for sprite in selected.iter().flatten() {
				self.draw_sprite(ram, color, sprite, height, master_override);
			}
		}
	}

	/// Draws the sprite's row that covers the current line.
	fn draw_sprite(&mut self, ram: &InternalRam, color: bool, sprite: &Sprite, height: i16, master_override: bool) {
		let tile = if height == 16 { sprite.tile & 0xFE } else { sprite.tile };
		let row = self.ly() as i16 - sprite.y;
		let row = if sprite.flip_y() { height - 1 - row } else { row };
		let bank = if color { sprite.bank() } else { 0 };

		let address = tile_address(true, tile) + row as u16 * 2;
		let low = ram.read_vram(address, bank);
		let high = ram.read_vram(address + 1, bank);

		for column in 0..8_u8 {
			let x = sprite.x + column as i16;

			if x < 0 || x >= WIDTH as i16 {
				continue;
			}

			let x = x as usize;
			let bit = if sprite.flip_x() { column } else { 7 - column };
			let index = pixel_index(low, high, bit);

			// Transparent.
			if index == 0 {
				continue;
			}

			let hidden = !master_override
				&& self.line.color[x] != 0
				&& (!sprite.above_background() || (color && self.line.priority[x]));

			if hidden {
				continue;
			}

			let rgb = if color {
				self.obj_palettes.color(sprite.color_palette(), index).to_rgb()
			} else if sprite.palette_select() {
				self.shade(self.get(DisplayRegister::Obp1), index)
			} else {
				self.shade(self.get(DisplayRegister::Obp0), index)
			};

			self.put_pixel(x, rgb);
		}
	}
}
