//! Small helpers shared between the host interface crate and its build script.
#![no_std]

#[cfg(feature = "build")]
extern crate std;

#[cfg(feature = "build")]
pub mod build;
mod util;

pub use util::*;
