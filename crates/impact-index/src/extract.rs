use std::path::Path;

use impact_archive::Archive;
use impact_classfile::ClassFile;
use impact_core::{binary_name, is_ignored_class, ROOT_CLASS};
use impact_storage::{StorageError, StoreWriter};

use crate::error::{IndexError, Result};
use crate::schema::{HierarchyRecord, MethodRefRecord, Partition};

/// The records produced by one class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedClass {
    pub hierarchy: HierarchyRecord,
    pub method_refs: Vec<MethodRefRecord>,
}

/// Turns one decoded class into its hierarchy record and one call-site record
/// per `Methodref`/`InterfaceMethodref` constant. Class names are converted to
/// binary (dotted) form; a superclass of `java.lang.Object` is omitted.
pub fn extract(archive_path: &str, class: &ClassFile) -> impact_classfile::Result<ExtractedClass> {
    let class_name = binary_name(&class.this_class).into_owned();

    let super_class = class
        .super_class
        .as_deref()
        .map(binary_name)
        .filter(|name| name != ROOT_CLASS)
        .map(|name| name.into_owned());

    let hierarchy = HierarchyRecord {
        class_name: class_name.clone(),
        archive_path: archive_path.to_owned(),
        super_class,
        interfaces: class
            .interfaces
            .iter()
            .map(|name| binary_name(name).into_owned())
            .collect(),
    };

    let method_refs = class
        .method_refs()?
        .into_iter()
        .map(|r| MethodRefRecord {
            method_name: r.name.to_owned(),
            target_class: binary_name(r.class_name).into_owned(),
            caller_class: class_name.clone(),
            archive_path: archive_path.to_owned(),
        })
        .collect();

    Ok(ExtractedClass {
        hierarchy,
        method_refs,
    })
}

/// Everything extracted from one archive, held until the archive as a whole
/// has been read successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRecords {
    pub archive_path: String,
    pub classes: Vec<ExtractedClass>,
}

impl ArchiveRecords {
    pub fn method_ref_count(&self) -> usize {
        self.classes.iter().map(|c| c.method_refs.len()).sum()
    }

    /// Writes every record into `writer`. Duplicate keys overwrite.
    pub fn write_to(&self, writer: &mut StoreWriter) -> Result<(), StorageError> {
        for class in &self.classes {
            writer.put(
                Partition::Hierarchy.name(),
                class.hierarchy.key(),
                class.hierarchy.value(),
            )?;
            for method_ref in &class.method_refs {
                writer.put(Partition::MethodRefs.name(), method_ref.key(), Vec::new())?;
            }
        }
        Ok(())
    }
}

/// The stored form of an archive path.
pub fn archive_path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Reads and decodes every `.class` entry of the archive at `path`.
///
/// `module-info` and `package-info` entries are skipped. The first unreadable
/// entry or undecodable class fails the whole archive.
pub fn index_archive(path: &Path) -> Result<ArchiveRecords> {
    let archive_path = archive_path_string(path);
    let mut archive = Archive::open(path).map_err(|source| IndexError::ArchiveRead {
        archive: path.to_path_buf(),
        source,
    })?;

    let mut classes = Vec::new();
    for entry in archive.class_entries() {
        let entry = entry.map_err(|source| IndexError::ArchiveRead {
            archive: path.to_path_buf(),
            source,
        })?;

        let class = ClassFile::parse(&entry.bytes).map_err(|source| {
            IndexError::MalformedDescriptor {
                archive: path.to_path_buf(),
                entry: entry.name.clone(),
                source,
            }
        })?;
        if is_ignored_class(&binary_name(&class.this_class)) {
            tracing::trace!(target: "impact.build", entry = %entry.name, "skipping descriptor-only class");
            continue;
        }

        let extracted =
            extract(&archive_path, &class).map_err(|source| IndexError::MalformedDescriptor {
                archive: path.to_path_buf(),
                entry: entry.name.clone(),
                source,
            })?;
        classes.push(extracted);
    }

    Ok(ArchiveRecords {
        archive_path,
        classes,
    })
}
