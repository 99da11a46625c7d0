pub mod parts;

use std::io::{Cursor, Read, Write};

use crate::error::Error;

struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// In-memory view of a DOCX package: ordered part path → bytes.
///
/// Each processing call owns its own container. Parts are read eagerly on
/// [`Container::open`] so later passes never touch the archive reader.
pub struct Container {
    entries: Vec<Entry>,
}

impl Container {
    pub fn open(bytes: &[u8]) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::ContainerCorrupt(format!("file is not a ZIP archive ({e})")))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let name = entry.name().to_string();
            let is_dir = entry.is_dir();
            let mut data = Vec::new();
            if !is_dir {
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| Error::ContainerCorrupt(format!("{name}: {e}")))?;
            }
            entries.push(Entry { name, data, is_dir });
        }
        log::debug!("Opened container with {} entries", entries.len());
        Ok(Container { entries })
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    pub fn read_part(&self, path: &str) -> Result<&[u8], Error> {
        self.find(path)
            .map(|e| e.data.as_slice())
            .ok_or_else(|| Error::PartNotFound(path.to_string()))
    }

    /// UTF-8 view of an XML part, without a leading byte order mark.
    pub fn read_text(&self, path: &str) -> Result<&str, Error> {
        let bytes = self.read_part(path)?;
        let text = std::str::from_utf8(bytes).map_err(|e| Error::PartMalformed {
            path: path.to_string(),
            reason: format!("not UTF-8: {e}"),
        })?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    /// Replaces the part's bytes, or appends a new part at the end.
    pub fn write_part(&mut self, path: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| !e.is_dir && e.name == path) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: path.to_string(),
                data,
                is_dir: false,
            }),
        }
    }

    /// Media is STORED (already compressed), everything else DEFLATED.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        let failed = |e: zip::result::ZipError| Error::Serialization(e.to_string());

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), deflated)
                    .map_err(failed)?;
                continue;
            }
            let opts = if is_media(&entry.name) { stored } else { deflated };
            zip.start_file(entry.name.as_str(), opts).map_err(failed)?;
            zip.write_all(&entry.data)
                .map_err(|e| Error::Serialization(format!("{}: {e}", entry.name)))?;
        }
        let cursor = zip.finish().map_err(failed)?;
        Ok(cursor.into_inner())
    }

    fn find(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| !e.is_dir && e.name == path)
    }
}

fn is_media(name: &str) -> bool {
    name.contains("/media/")
}
