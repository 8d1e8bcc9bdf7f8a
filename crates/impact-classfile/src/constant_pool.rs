use crate::error::{Error, Result};
use crate::reader::Reader;

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELDREF: u8 = 9;
const CONSTANT_METHODREF: u8 = 10;
const CONSTANT_INTERFACE_METHODREF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_DYNAMIC: u8 = 17;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
const CONSTANT_MODULE: u8 = 19;
const CONSTANT_PACKAGE: u8 = 20;

#[derive(Debug, Clone)]
enum Entry {
    /// Slot 0 and the second slot of `long`/`double` constants.
    Unusable,
    Utf8(String),
    Class { name_index: u16 },
    MemberRef {
        kind: RefKind,
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType { name_index: u16 },
    Other(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Field,
    Method,
    InterfaceMethod,
}

impl Entry {
    fn kind_name(&self) -> &'static str {
        match self {
            Entry::Unusable => "unusable",
            Entry::Utf8(_) => "Utf8",
            Entry::Class { .. } => "Class",
            Entry::MemberRef { kind, .. } => match kind {
                RefKind::Field => "Fieldref",
                RefKind::Method => "Methodref",
                RefKind::InterfaceMethod => "InterfaceMethodref",
            },
            Entry::NameAndType { .. } => "NameAndType",
            Entry::Other(name) => *name,
        }
    }
}

/// Whether a method reference came from a `CONSTANT_Methodref` or a
/// `CONSTANT_InterfaceMethodref` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRefKind {
    Method,
    InterfaceMethod,
}

/// A resolved method reference: the statically declared target class (internal
/// name) and the invoked method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef<'a> {
    pub kind: MemberRefKind,
    pub class_name: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Entry>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(Entry::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                CONSTANT_UTF8 => {
                    let len = reader.read_u2()? as usize;
                    Entry::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                CONSTANT_INTEGER => {
                    reader.skip(4)?;
                    Entry::Other("Integer")
                }
                CONSTANT_FLOAT => {
                    reader.skip(4)?;
                    Entry::Other("Float")
                }
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    reader.skip(8)?;
                    entries.push(Entry::Other(if tag == CONSTANT_LONG {
                        "Long"
                    } else {
                        "Double"
                    }));
                    // 8-byte constants take up two slots.
                    Entry::Unusable
                }
                CONSTANT_CLASS => Entry::Class {
                    name_index: reader.read_u2()?,
                },
                CONSTANT_STRING => {
                    reader.skip(2)?;
                    Entry::Other("String")
                }
                CONSTANT_FIELDREF | CONSTANT_METHODREF | CONSTANT_INTERFACE_METHODREF => {
                    let kind = match tag {
                        CONSTANT_FIELDREF => RefKind::Field,
                        CONSTANT_METHODREF => RefKind::Method,
                        _ => RefKind::InterfaceMethod,
                    };
                    Entry::MemberRef {
                        kind,
                        class_index: reader.read_u2()?,
                        name_and_type_index: reader.read_u2()?,
                    }
                }
                CONSTANT_NAME_AND_TYPE => {
                    let name_index = reader.read_u2()?;
                    reader.skip(2)?;
                    Entry::NameAndType { name_index }
                }
                CONSTANT_METHOD_HANDLE => {
                    reader.skip(3)?;
                    Entry::Other("MethodHandle")
                }
                CONSTANT_METHOD_TYPE => {
                    reader.skip(2)?;
                    Entry::Other("MethodType")
                }
                CONSTANT_DYNAMIC => {
                    reader.skip(4)?;
                    Entry::Other("Dynamic")
                }
                CONSTANT_INVOKE_DYNAMIC => {
                    reader.skip(4)?;
                    Entry::Other("InvokeDynamic")
                }
                CONSTANT_MODULE => {
                    reader.skip(2)?;
                    Entry::Other("Module")
                }
                CONSTANT_PACKAGE => {
                    reader.skip(2)?;
                    Entry::Other("Package")
                }
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };
            entries.push(entry);
        }

        // A trailing long/double may have pushed one slot past `count`.
        if entries.len() > count.max(1) {
            return Err(Error::InvalidConstantPoolIndex(count as u16));
        }

        Ok(Self { entries })
    }

    /// Number of slots, including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    fn get(&self, index: u16) -> Result<&Entry> {
        match self.entries.get(index as usize) {
            None | Some(Entry::Unusable) => Err(Error::InvalidConstantPoolIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Entry::Utf8(s) => Ok(s),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind_name(),
            }),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Entry::Class { name_index } => self.get_utf8(*name_index),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "Class",
                found: other.kind_name(),
            }),
        }
    }

    fn get_name_and_type_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Entry::NameAndType { name_index } => self.get_utf8(*name_index),
            other => Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: "NameAndType",
                found: other.kind_name(),
            }),
        }
    }

    /// Resolves every `Methodref` and `InterfaceMethodref` entry, in pool order.
    ///
    /// Field references and all other constants are skipped.
    pub fn method_refs(&self) -> Result<Vec<MemberRef<'_>>> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let Entry::MemberRef {
                kind,
                class_index,
                name_and_type_index,
            } = entry
            else {
                continue;
            };
            let kind = match kind {
                RefKind::Field => continue,
                RefKind::Method => MemberRefKind::Method,
                RefKind::InterfaceMethod => MemberRefKind::InterfaceMethod,
            };
            let class_name = self.get_class_name(*class_index)?;
            let name = self.get_name_and_type_name(*name_and_type_index)?;
            out.push(MemberRef {
                kind,
                class_name,
                name,
            });
        }
        Ok(out)
    }
}

/// Decodes the JVM's "modified UTF-8": NUL is encoded as `C0 80` and
/// supplementary characters as two 3-byte surrogate halves. An unpaired
/// surrogate decodes to U+FFFD.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        if !s.contains('\0') {
            return Ok(s.to_owned());
        }
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 == 0 {
            return Err(Error::InvalidModifiedUtf8);
        }
        if b0 & 0x80 == 0 {
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push((((b0 & 0x1F) as u16) << 6) | b1);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push((((b0 & 0x0F) as u16) << 12) | (b1 << 6) | b2);
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }

    Ok(String::from_utf16_lossy(&units))
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(Error::InvalidModifiedUtf8),
    }
}
