//! Core input-shaping engine for the sordino motion controller.
//!
//! All times inside this crate are in milliseconds; velocities and
//! accelerations are per-millisecond. This crate intentionally avoids
//! any transport- or MCU-specific dependencies.

pub mod func_manager;
pub mod move_queue;
pub mod shaper;
pub mod window;
