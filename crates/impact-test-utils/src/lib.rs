//! Utilities shared by Impact tests.
//!
//! Tests never check in binary fixtures. Class files are synthesized with
//! [`ClassFileBuilder`] and packed into JARs with [`JarBuilder`], so each test
//! states exactly which hierarchy edges and call sites it needs.

mod classfile;
mod jar;

pub use classfile::ClassFileBuilder;
pub use jar::{Corpus, JarBuilder};
