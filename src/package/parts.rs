use std::fmt::Write as _;

use super::Container;
use crate::docx::xml_escape;
use crate::error::Error;

pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PATH: &str = "_rels/.rels";
pub const DEFAULT_DOCUMENT_PATH: &str = "word/document.xml";

pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const MAIN_DOCUMENT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

/// Relationship table of one part (`word/_rels/document.xml.rels`).
#[derive(Clone, Debug, Default)]
pub struct Relationships {
    entries: Vec<Relationship>,
    modified: bool,
}

impl Relationships {
    pub fn parse(xml_content: &str) -> Result<Self, roxmltree::Error> {
        let xml = roxmltree::Document::parse(xml_content)?;
        let entries = xml
            .root_element()
            .children()
            .filter(|n| n.tag_name().name() == "Relationship")
            .filter_map(|node| {
                Some(Relationship {
                    id: node.attribute("Id")?.to_string(),
                    rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                    target: node.attribute("Target")?.to_string(),
                    target_mode: node.attribute("TargetMode").map(String::from),
                })
            })
            .collect();
        Ok(Relationships {
            entries,
            modified: false,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Callers allocate `rel.id` with `next_relationship_id` over this table.
    pub fn add(&mut self, rel: Relationship) {
        debug_assert!(self.get(&rel.id).is_none(), "duplicate relationship id {}", rel.id);
        self.entries.push(rel);
        self.modified = true;
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECL);
        let _ = write!(out, "<Relationships xmlns=\"{PKG_REL_NS}\">");
        for rel in &self.entries {
            let _ = write!(
                out,
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
                xml_escape(&rel.id),
                xml_escape(&rel.rel_type),
                xml_escape(&rel.target)
            );
            if let Some(mode) = &rel.target_mode {
                let _ = write!(out, " TargetMode=\"{}\"", xml_escape(mode));
            }
            out.push_str("/>");
        }
        out.push_str("</Relationships>");
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContentTypeEntry {
    Default {
        extension: String,
        content_type: String,
    },
    Override {
        part_name: String,
        content_type: String,
    },
}

/// The package's `[Content_Types].xml`.
#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    entries: Vec<ContentTypeEntry>,
    modified: bool,
}

impl ContentTypes {
    pub fn parse(xml_content: &str) -> Result<Self, roxmltree::Error> {
        let xml = roxmltree::Document::parse(xml_content)?;
        let entries = xml
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .filter_map(|node| {
                let content_type = node.attribute("ContentType")?.to_string();
                match node.tag_name().name() {
                    "Default" => Some(ContentTypeEntry::Default {
                        extension: node.attribute("Extension")?.to_string(),
                        content_type,
                    }),
                    "Override" => Some(ContentTypeEntry::Override {
                        part_name: node.attribute("PartName")?.to_string(),
                        content_type,
                    }),
                    _ => None,
                }
            })
            .collect();
        Ok(ContentTypes {
            entries,
            modified: false,
        })
    }

    /// Minimal registry for a package that lacks one. Marked modified so it
    /// gets written when stored.
    pub fn synthesize(main_document_path: &str) -> Self {
        let default = |ext: &str, ct: &str| ContentTypeEntry::Default {
            extension: ext.to_string(),
            content_type: ct.to_string(),
        };
        ContentTypes {
            entries: vec![
                default(
                    "rels",
                    "application/vnd.openxmlformats-package.relationships+xml",
                ),
                default("xml", "application/xml"),
                ContentTypeEntry::Override {
                    part_name: format!("/{main_document_path}"),
                    content_type: MAIN_DOCUMENT_CONTENT_TYPE.to_string(),
                },
            ],
            modified: true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentTypeEntry> {
        self.entries.iter()
    }

    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            ContentTypeEntry::Default {
                extension: ext,
                content_type,
            } if ext.eq_ignore_ascii_case(extension) => Some(content_type.as_str()),
            _ => None,
        })
    }

    /// Adds a Default mapping unless one already exists. Returns true if added.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> bool {
        if self.default_for(extension).is_some() {
            return false;
        }
        // Defaults conventionally precede Overrides.
        let at = self
            .entries
            .iter()
            .position(|e| matches!(e, ContentTypeEntry::Override { .. }))
            .unwrap_or(self.entries.len());
        self.entries.insert(
            at,
            ContentTypeEntry::Default {
                extension: extension.to_string(),
                content_type: content_type.to_string(),
            },
        );
        self.modified = true;
        true
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECL);
        let _ = write!(out, "<Types xmlns=\"{CONTENT_TYPES_NS}\">");
        for entry in &self.entries {
            let _ = match entry {
                ContentTypeEntry::Default {
                    extension,
                    content_type,
                } => write!(
                    out,
                    "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                    xml_escape(extension),
                    xml_escape(content_type)
                ),
                ContentTypeEntry::Override {
                    part_name,
                    content_type,
                } => write!(
                    out,
                    "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                    xml_escape(part_name),
                    xml_escape(content_type)
                ),
            };
        }
        out.push_str("</Types>");
        out
    }
}

/// Resolve the main document part from the package relationships,
/// falling back to `word/document.xml`.
pub fn main_document_path(container: &Container) -> String {
    let from_rels = container
        .read_text(PACKAGE_RELS_PATH)
        .ok()
        .and_then(|xml| Relationships::parse(xml).ok())
        .and_then(|rels| {
            rels.iter()
                .find(|r| r.rel_type.ends_with("/officeDocument"))
                .map(|r| resolve_target("", &r.target))
        });
    match from_rels {
        Some(path) if container.has_part(&path) => path,
        _ => DEFAULT_DOCUMENT_PATH.to_string(),
    }
}

/// "word/document.xml" → "word/_rels/document.xml.rels"
pub fn part_rels_path(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

pub fn part_dir(part_path: &str) -> &str {
    part_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = source_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

pub fn load_body(container: &Container, document_path: &str) -> Result<String, Error> {
    match container.read_text(document_path) {
        Ok(text) => Ok(text.to_string()),
        Err(Error::PartNotFound(path)) => Err(Error::MissingRequiredPart(path)),
        Err(e) => Err(e),
    }
}

pub fn load_relationships(
    container: &Container,
    document_path: &str,
) -> Result<Relationships, Error> {
    let rels_path = part_rels_path(document_path);
    let xml_content = match container.read_text(&rels_path) {
        Ok(text) => text,
        Err(Error::PartNotFound(_)) => {
            log::debug!("No {rels_path}; starting from an empty relationship table");
            return Ok(Relationships::default());
        }
        Err(e) => return Err(e),
    };
    Relationships::parse(xml_content).map_err(|e| Error::PartMalformed {
        path: rels_path,
        reason: e.to_string(),
    })
}

pub fn load_content_types(container: &Container) -> Result<Option<ContentTypes>, Error> {
    let xml_content = match container.read_text(CONTENT_TYPES_PATH) {
        Ok(text) => text,
        Err(Error::PartNotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    ContentTypes::parse(xml_content)
        .map(Some)
        .map_err(|e| Error::PartMalformed {
            path: CONTENT_TYPES_PATH.to_string(),
            reason: e.to_string(),
        })
}

pub fn store_body(container: &mut Container, document_path: &str, body: &str) {
    container.write_part(document_path, body.as_bytes().to_vec());
}

/// Only a modified table is written, so untouched packages keep their bytes.
pub fn store_relationships(container: &mut Container, document_path: &str, rels: &Relationships) {
    if rels.is_modified() {
        container.write_part(&part_rels_path(document_path), rels.to_xml().into_bytes());
    }
}

pub fn store_content_types(container: &mut Container, content_types: &ContentTypes) {
    if content_types.is_modified() {
        container.write_part(CONTENT_TYPES_PATH, content_types.to_xml().into_bytes());
    }
}
