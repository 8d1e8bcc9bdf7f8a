//! Byte layout of the two index partitions.
//!
//! Every key is a concatenation of length-prefixed fields: a 4-byte big-endian
//! length followed by the field's UTF-8 bytes. A prefix built from complete
//! fields therefore only matches keys whose leading fields are exactly equal,
//! so scanning for `F("foo")` never yields `foobar` or `xfoo`.
//!
//! ```text
//! hierarchy  key: F(class) F(archive)
//!            val: u8 version (1), u8 flags (bit 0: superclass present),
//!                 [F(superclass)], u32 interface count, F(interface)*
//! methodrefs key: F(method) F(target class) F(caller class) F(archive)
//!            val: empty
//! ```

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::error::{IndexError, Result};

/// Version of the stored layout; stores written with another version are
/// rejected when opened.
pub const SCHEMA_VERSION: u32 = 1;

const HIERARCHY_VALUE_VERSION: u8 = 1;
const FLAG_HAS_SUPER: u8 = 0b0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Hierarchy,
    MethodRefs,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Hierarchy, Partition::MethodRefs];

    pub const fn name(self) -> &'static str {
        match self {
            Partition::Hierarchy => "hierarchy",
            Partition::MethodRefs => "methodrefs",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Appends `F(field)` to `out`.
pub fn encode_field(out: &mut Vec<u8>, field: &str) {
    let mut len = [0u8; 4];
    BigEndian::write_u32(&mut len, field.len() as u32);
    out.extend_from_slice(&len);
    out.extend_from_slice(field.as_bytes());
}

/// The scan prefix selecting every key whose first field is `field`.
pub fn field_prefix(field: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + field.len());
    encode_field(&mut out, field);
    out
}

struct FieldReader<'a> {
    bytes: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], &'static str> {
        if self.bytes.len() < len {
            return Err("truncated");
        }
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, &'static str> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, &'static str> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn field(&mut self) -> Result<&'a str, &'static str> {
        let len = self.u32()? as usize;
        std::str::from_utf8(self.take(len)?).map_err(|_| "field is not UTF-8")
    }

    fn finish(self) -> Result<(), &'static str> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err("trailing bytes")
        }
    }
}

fn decode_hierarchy_value(value: &[u8]) -> Result<(Option<String>, Vec<String>), &'static str> {
    let mut reader = FieldReader::new(value);
    if reader.u8()? != HIERARCHY_VALUE_VERSION {
        return Err("unknown layout version");
    }
    let flags = reader.u8()?;
    if flags & !FLAG_HAS_SUPER != 0 {
        return Err("unknown flag bits");
    }
    let super_class = if flags & FLAG_HAS_SUPER != 0 {
        Some(reader.field()?.to_owned())
    } else {
        None
    };
    let count = reader.u32()? as usize;
    // Each interface takes at least its 4-byte length.
    let mut interfaces = Vec::with_capacity(count.min(reader.bytes.len() / 4));
    for _ in 0..count {
        interfaces.push(reader.field()?.to_owned());
    }
    reader.finish()?;
    Ok((super_class, interfaces))
}

/// One class's direct supertypes as recorded in one archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HierarchyRecord {
    pub class_name: String,
    pub archive_path: String,
    /// `None` for the root type and for direct subclasses of it.
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
}

impl HierarchyRecord {
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(8 + self.class_name.len() + self.archive_path.len());
        encode_field(&mut key, &self.class_name);
        encode_field(&mut key, &self.archive_path);
        key
    }

    pub fn value(&self) -> Vec<u8> {
        let mut value = vec![HIERARCHY_VALUE_VERSION];
        match &self.super_class {
            Some(super_class) => {
                value.push(FLAG_HAS_SUPER);
                encode_field(&mut value, super_class);
            }
            None => value.push(0),
        }
        let mut count = [0u8; 4];
        BigEndian::write_u32(&mut count, self.interfaces.len() as u32);
        value.extend_from_slice(&count);
        for interface in &self.interfaces {
            encode_field(&mut value, interface);
        }
        value
    }

    pub fn decode(key: &[u8], value: &[u8]) -> Result<Self> {
        let corrupt_key = |reason| IndexError::CorruptKey {
            partition: Partition::Hierarchy.name(),
            reason,
        };
        let corrupt_value = |reason| IndexError::CorruptValue {
            partition: Partition::Hierarchy.name(),
            reason,
        };

        let mut fields = FieldReader::new(key);
        let class_name = fields.field().map_err(corrupt_key)?.to_owned();
        let archive_path = fields.field().map_err(corrupt_key)?.to_owned();
        fields.finish().map_err(corrupt_key)?;

        let (super_class, interfaces) = decode_hierarchy_value(value).map_err(corrupt_value)?;

        Ok(Self {
            class_name,
            archive_path,
            super_class,
            interfaces,
        })
    }

    /// The superclass (if any) followed by the declared interfaces.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.super_class
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

/// One call site: `caller_class` references `target_class.method_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodRefRecord {
    pub method_name: String,
    pub target_class: String,
    pub caller_class: String,
    pub archive_path: String,
}

impl MethodRefRecord {
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(
            16 + self.method_name.len()
                + self.target_class.len()
                + self.caller_class.len()
                + self.archive_path.len(),
        );
        encode_field(&mut key, &self.method_name);
        encode_field(&mut key, &self.target_class);
        encode_field(&mut key, &self.caller_class);
        encode_field(&mut key, &self.archive_path);
        key
    }

    pub fn from_key(key: &[u8]) -> Result<Self> {
        let decode = || -> Result<Self, &'static str> {
            let mut fields = FieldReader::new(key);
            let record = Self {
                method_name: fields.field()?.to_owned(),
                target_class: fields.field()?.to_owned(),
                caller_class: fields.field()?.to_owned(),
                archive_path: fields.field()?.to_owned(),
            };
            fields.finish()?;
            Ok(record)
        };
        decode().map_err(|reason| IndexError::CorruptKey {
            partition: Partition::MethodRefs.name(),
            reason,
        })
    }
}

impl fmt::Display for MethodRefRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.method_name, self.target_class, self.caller_class, self.archive_path
        )
    }
}
