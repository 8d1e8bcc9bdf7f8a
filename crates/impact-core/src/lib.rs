//! Core shared types for Impact.
//!
//! This crate is intentionally small and nearly dependency-free.

mod fs;
mod names;

pub use fs::canonicalize_if_possible;
pub use names::{binary_name, is_ignored_class, ROOT_CLASS};

/// The Impact version, embedded into persisted artifacts.
pub const IMPACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub const fn as_u8(self) -> u8 {
        match self {
            Endian::Little => 0,
            Endian::Big => 1,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Endian::Little),
            1 => Some(Endian::Big),
            _ => None,
        }
    }
}

#[inline]
pub const fn target_endian() -> Endian {
    if cfg!(target_endian = "little") {
        Endian::Little
    } else {
        Endian::Big
    }
}

/// Pointer width of the running target, in bytes.
#[inline]
pub const fn target_pointer_width() -> u8 {
    std::mem::size_of::<usize>() as u8
}
