use crate::constant_pool::{ConstantPool, MemberRef};
use crate::error::{Error, Result};
use crate::reader::Reader;

/// The decoded view of one compiled class.
///
/// Class names are kept in JVM internal form (`java/lang/Object`).
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub constant_pool: ConstantPool,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?.to_owned();
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?.to_owned())
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?.to_owned());
        }

        // Members and attributes are not needed, but walking them validates the
        // overall structure so truncated class files are rejected.
        for _ in 0..2 {
            let members_count = reader.read_u2()?;
            for _ in 0..members_count {
                // access_flags, name_index, descriptor_index
                reader.skip(6)?;
                skip_attributes(&mut reader)?;
            }
        }
        skip_attributes(&mut reader)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            constant_pool: cp,
        })
    }

    /// Every `Methodref`/`InterfaceMethodref` in this class's constant pool.
    pub fn method_refs(&self) -> Result<Vec<MemberRef<'_>>> {
        self.constant_pool.method_refs()
    }
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let _name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
