use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::header::{ArtifactKind, Compression, StorageHeader, HEADER_LEN};
use crate::persisted::{content_hash, StorageError};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteCompression {
    #[default]
    None,
    Zstd { level: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteArchiveOptions {
    pub compression: WriteCompression,
    /// Re-read the temp file and verify payload size and content hash before
    /// renaming it into place.
    pub validate_after_write: bool,
    /// `fsync` the file before renaming. The index is a rebuildable cache, so
    /// builds leave this off by default.
    pub sync: bool,
}

/// Serializes `value` with `rkyv` and atomically replaces `path` with it.
///
/// The artifact is first written to a unique temp file next to `path` and then
/// renamed over it, so readers never observe a partially written file.
pub fn write_archive_atomic<T>(
    path: &Path,
    kind: ArtifactKind,
    schema_version: u32,
    value: &T,
    options: WriteArchiveOptions,
) -> Result<u64, StorageError>
where
    T: rkyv::Archive + rkyv::Serialize<rkyv::ser::serializers::AllocSerializer<256>>,
{
    let parent = path
        .parent()
        .ok_or(StorageError::InvalidHeader("missing parent directory"))?;
    fs::create_dir_all(parent)?;

    let archived =
        rkyv::to_bytes::<_, 256>(value).map_err(|e| StorageError::Validation(e.to_string()))?;
    let uncompressed = archived.as_slice();
    let uncompressed_len = uncompressed.len() as u64;

    let (compression, zstd_level) = match options.compression {
        WriteCompression::None => (Compression::None, None),
        WriteCompression::Zstd { level } => (Compression::Zstd, Some(level)),
    };

    let hash = content_hash(uncompressed);
    let (tmp_path, file) = open_unique_tmp_file(path, parent)?;

    let result = (|| -> Result<u64, StorageError> {
        let (mut file, payload_len) = write_payload(file, uncompressed, compression, zstd_level)?;
        let header = StorageHeader::new(
            kind,
            schema_version,
            compression,
            payload_len,
            uncompressed_len,
            hash,
        );

        // Overwrite the placeholder header now that the final metadata is known.
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.encode())?;
        if options.sync {
            file.sync_all()?;
        }
        drop(file);

        if options.validate_after_write {
            validate_written_file(&tmp_path, &header)?;
        }

        rename_overwrite(&tmp_path, path)?;
        Ok(HEADER_LEN as u64 + payload_len)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_payload(
    mut file: fs::File,
    payload: &[u8],
    compression: Compression,
    zstd_level: Option<i32>,
) -> Result<(fs::File, u64), StorageError> {
    file.write_all(&[0u8; HEADER_LEN])?;

    match compression {
        Compression::None => {
            file.write_all(payload)?;
            Ok((file, payload.len() as u64))
        }
        Compression::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(file, zstd_level.unwrap_or(0))
                .map_err(|e| StorageError::Decompression(e.to_string()))?;
            encoder.write_all(payload)?;
            let mut file = encoder
                .finish()
                .map_err(|e| StorageError::Decompression(e.to_string()))?;
            let end = file.seek(SeekFrom::End(0))?;
            let payload_len = end
                .checked_sub(HEADER_LEN as u64)
                .ok_or(StorageError::InvalidHeader("payload length underflow"))?;
            Ok((file, payload_len))
        }
    }
}

fn validate_written_file(path: &Path, expected: &StorageHeader) -> Result<(), StorageError> {
    let mut file = fs::File::open(path)?;
    let mut header_bytes = [0u8; HEADER_LEN];
    file.read_exact(&mut header_bytes)?;
    if &StorageHeader::decode(&header_bytes)? != expected {
        return Err(StorageError::InvalidHeader("header mismatch after write"));
    }

    let mut payload_reader: Box<dyn Read> = match expected.compression {
        Compression::None => Box::new(file.take(expected.payload_len)),
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(file.take(expected.payload_len))
                .map_err(|e| StorageError::Decompression(e.to_string()))?,
        ),
    };

    let mut payload = Vec::with_capacity(expected.uncompressed_len as usize);
    payload_reader.read_to_end(&mut payload)?;
    if payload.len() as u64 != expected.uncompressed_len {
        return Err(StorageError::InvalidHeader("uncompressed length mismatch"));
    }

    let found = content_hash(&payload);
    if found != expected.content_hash {
        return Err(StorageError::HashMismatch {
            expected: expected.content_hash,
            found,
        });
    }
    Ok(())
}

fn rename_overwrite(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 1024;
    let mut attempts = 0usize;

    loop {
        match fs::rename(tmp_path, dest) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists || dest.exists() => {
                // On Windows, `rename` doesn't overwrite.
                let _ = fs::remove_file(dest);
                attempts += 1;
                if attempts >= MAX_RENAME_ATTEMPTS {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
