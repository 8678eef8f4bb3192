// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
//! This library emulates the gameboy's (and gameboy color's) picture processing unit
//! together with the memory mapping it draws from, as described in the publicly
//! available "Pan Docs" and "Game Boy CPU Manual".
//!
//! The processor is not part of this crate. It drives the emulation by calling
//! [`bus::SystemBus::process`] with the cycles elapsed since the previous call, and
//! services the interrupts reported through [`interrupts::InterruptSource`].

extern crate alloc;

#[cfg(all(test, not(feature = "std")))]
#[macro_use]
extern crate std;

#[macro_use]
pub mod bus;
pub mod config;
pub mod interrupts;

use thiserror::Error;

/// Errors reported by the emulation library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameboyError {
	/// The address can't be used for the requested operation.
	#[error("bad address: {0:#06x}")]
	BadAddress(u16),
	/// A memory-mapped register was already registered at the address.
	#[error("register {0:#06x} is already mapped")]
	RegisterTaken(u16),
	/// The boot image doesn't fit its memory window.
	#[error("bad boot image size: {0} bytes")]
	BadBootImage(usize),
	/// The cartridge image doesn't contain a complete rom bank.
	#[error("bad rom size: {0} bytes")]
	BadRom(usize),
	/// The persistent storage failed.
	#[error("storage error: {0}")]
	Storage(&'static str),
}
