// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Macros for describing memory ranges.
//!
//! A range is packed into a single `u32` so it can be passed as a const generic
//! argument, which lets the same constant drive match patterns, offsets and the
//! size of the arrays backing each region.

/// Memory range is represented by start and end addresses, 16 bits each.
pub type MemoryRange = u32;

/// Memory boundries - wrapper for passing constants into a range pattern.
pub trait MemoryBounds<const S: u32> {
	/// The start address of the memory boundry.
	const START: u16 = ((S >> 16) & 0xFFFF) as u16;
	/// The end address of the memory boundry.
	const END: u16 = (S & 0xFFFF) as u16;
}

impl<const S: u32> MemoryBounds<S> for () { }

/// Make a memory range constant.
///
/// * `start` - Start address (inclusive).
/// * `end` - End address (inclusive).
#[macro_export]
macro_rules! make_range {
	($start:tt, $end:tt) => (($start << 16) + $end)
}

/// Returns the first address in the given memory range.
#[macro_export]
macro_rules! range_start {
	($range:tt) => { (<() as MemoryBounds<$range>>::START as usize) }
}

/// Returns the last address (inclusive) in the given memory range.
#[macro_export]
macro_rules! range_end {
	($range:tt) => { (<() as MemoryBounds<$range>>::END as usize) }
}

/// Returns the amount of addresses covered by the given memory range.
#[macro_export]
macro_rules! range_size {
	($range:tt) => { (range_end!($range) - range_start!($range) + 1) }
}

/// Create a range pattern from the given memory range.
///
/// # Examples
/// ```
/// # #[macro_use] extern crate gameboy_video;
/// # use gameboy_video::bus::memory_range::*;
/// # fn main() {
///
/// const MMAP_SPRITE_OAM: MemoryRange = make_range!(0xFE00, 0xFE9F);
/// let address: u16 = 0xFE10;
///
/// match address {
///		memory_range!(MMAP_SPRITE_OAM) => {}
///		_ => { assert!(false); }
/// }
///
/// # }
/// ```
#[macro_export]
macro_rules! memory_range {
	($range:tt) => {
		<() as MemoryBounds<$range>>::START..=<() as MemoryBounds<$range>>::END
	}
}

/// Returns the offset of an address relative to the start of the given range.
#[macro_export]
macro_rules! range_offset {
	($range:tt, $address:expr) => { ($address as usize - range_start!($range)) }
}
