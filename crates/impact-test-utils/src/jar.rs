use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ClassFileBuilder;

/// Assembles a JAR from synthesized classes and raw entries.
#[derive(Debug, Default, Clone)]
pub struct JarBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl JarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `<internal name>.class`.
    pub fn class(self, class: ClassFileBuilder) -> Self {
        let name = format!("{}.class", class.name());
        let bytes = class.build();
        self.entry(name, bytes)
    }

    pub fn entry(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.into(), bytes.into()));
        self
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.add_directory("META-INF/", options).map_err(io::Error::other)?;
        zip.start_file("META-INF/MANIFEST.MF", options)
            .map_err(io::Error::other)?;
        zip.write_all(b"Manifest-Version: 1.0\r\n\r\n")?;

        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)
                .map_err(io::Error::other)?;
            zip.write_all(bytes)?;
        }
        zip.finish().map_err(io::Error::other)?;
        Ok(())
    }
}

/// A temporary directory tree of JARs to index.
pub struct Corpus {
    dir: TempDir,
}

impl Corpus {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `jar` to `relative` under the corpus root and returns its
    /// canonical path.
    pub fn add_jar(&self, relative: impl AsRef<Path>, jar: &JarBuilder) -> io::Result<PathBuf> {
        let path = self.dir.path().join(relative);
        jar.write(&path)?;
        fs::canonicalize(&path)
    }

    pub fn add_file(&self, relative: impl AsRef<Path>, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        fs::canonicalize(&path)
    }
}
