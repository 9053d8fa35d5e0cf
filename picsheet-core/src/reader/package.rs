//! In-memory OOXML package (the ZIP container of a workbook)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::error::SheetError;

/// One entry of the ZIP container
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// All entries of a workbook package, kept in their original order
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Load every entry of the package at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to read workbook package: {}", path.display()))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).context("Failed to open zip archive")?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
            });
        }

        log::debug!("Loaded package with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Read a part as UTF-8 text, `None` if the part does not exist
    pub fn read_string(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            Some(data) => {
                let text = String::from_utf8(data.to_vec())
                    .with_context(|| format!("Part '{}' is not valid UTF-8", name))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Read a part that must exist
    pub fn require_string(&self, name: &str) -> Result<String> {
        self.read_string(name)?
            .ok_or_else(|| SheetError::MissingPart(name.to_string()).into())
    }

    /// Replace the contents of a part, appending it when new
    pub fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
            }),
        }
    }
}
