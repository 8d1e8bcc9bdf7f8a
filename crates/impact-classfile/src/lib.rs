#![forbid(unsafe_code)]

//! Decoder for the parts of a JVM class file that the impact index needs: the
//! class's own name, its direct supertypes and the method references recorded
//! in its constant pool.

mod classfile;
mod constant_pool;
mod error;
mod reader;

pub use crate::classfile::ClassFile;
pub use crate::constant_pool::{ConstantPool, MemberRef, MemberRefKind};
pub use crate::error::{Error, Result};
