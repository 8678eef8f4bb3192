// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Abstraction for the cpu's interrupts.
//!
//! Peripherals don't call into the processor. Instead, each one accumulates the
//! interrupts it raised in a mask that the processor polls and clears once the
//! requests were moved into its own IF register.

use core::iter::Iterator;

/// Marks which interrupts are currently active.
pub type InterruptMask = u8;

/// Represents a peripheral that may raise interrupts.
pub trait InterruptSource {
	/// Returns the active interrupts mask.
	fn interrupts(&self) -> InterruptMask;

	/// Clears the peripheral's interrupt mask.
	fn clear(&mut self);
}

/// Interrupts that can be thrown by peripherals.
///
/// Only `VerticalBlank` and `LcdStat` are raised by the video hardware. The
/// other kinds are never raised here; they keep the enum and its bit layout
/// complete for the processor that owns the shared interrupt flag register.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Interrupt {
	/// Triggered when the LCD controller enters V-Blank at scanline 144.
	VerticalBlank,
	/// Triggered by configured LCD events (such as scanline coincidence).
	LcdStat,
	/// Triggered when TIMA overflows, with a delay of a single cycle.
	Timer,
	/// Triggered when a serial transfer of 1 byte is complete.
	Serial,
	/// Triggered when one of the P1 input lines is changed from 1 to 0.
	Joypad,
}

impl Interrupt {
	/// Get the identifier of the given interrupt.
	pub fn ordinal(&self) -> u8 {
		match self {
			Interrupt::VerticalBlank => 0,
			Interrupt::LcdStat => 1,
			Interrupt::Timer => 2,
			Interrupt::Serial => 3,
			Interrupt::Joypad => 4,
		}
	}

	/// Get the relevant bit of the given interrupt.
	pub fn value(&self) -> u8 {
		1 << self.ordinal()
	}
}

/// Iterates over the interrupts within a mask, highest priority first.
pub struct InterruptIter {
	/// The iterator's active interrupts mask.
	/// Iterated interrupts are popped from the mask.
	pub mask: InterruptMask,
}

impl InterruptIter {
	/// Create a new interrupt iterator.
	pub fn new(mask: InterruptMask) -> Self {
		InterruptIter {
			mask
		}
	}
}

impl Iterator for InterruptIter {
	type Item = Interrupt;

	fn next(&mut self) -> Option<Self::Item> {
		let interrupt = [
			Interrupt::VerticalBlank,
			Interrupt::LcdStat,
			Interrupt::Timer,
			Interrupt::Serial,
			Interrupt::Joypad,
		].iter().copied().find(|interrupt| self.mask & interrupt.value() != 0)?;

		self.mask &= !interrupt.value();

		Some(interrupt)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::vec::Vec;

	#[test]
	fn test_iteration_order() {
		let mask = Interrupt::Joypad.value() | Interrupt::LcdStat.value() | Interrupt::VerticalBlank.value();
		let raised: Vec<Interrupt> = InterruptIter::new(mask).collect();

		assert_eq!(vec![Interrupt::VerticalBlank, Interrupt::LcdStat, Interrupt::Joypad], raised);
	}

	#[test]
	fn test_empty_mask() {
		assert_eq!(None, InterruptIter::new(0).next());
	}
}
