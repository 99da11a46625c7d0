use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Input bytes are not a readable ZIP archive. No fallback bytes exist.
    #[error("container is not a valid ZIP archive: {0}")]
    ContainerCorrupt(String),

    #[error("part not found: {0}")]
    PartNotFound(String),

    /// The main document part is absent; the original bytes are returned.
    #[error("missing required part {0} (is this a DOCX file?)")]
    MissingRequiredPart(String),

    #[error("malformed part {path}: {reason}")]
    PartMalformed { path: String, reason: String },

    /// Recovered per key: a textual fallback replaces the token.
    #[error("image embedding failed for {key}: {reason}")]
    ImageEmbed { key: String, reason: String },

    #[error("failed to serialize container: {0}")]
    Serialization(String),

    #[error("template \"{0}\" not found")]
    TemplateNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::ContainerCorrupt(e.to_string())
    }
}

