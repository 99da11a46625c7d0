use std::collections::BTreeMap;

use crate::error::Error;

pub const DEFAULT_QR_SIZE_MM: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImagePlacement {
    /// The picture gets a paragraph of its own.
    #[default]
    Block,
    /// The picture stays inside the placeholder's run.
    Inline,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub default_size_mm: f64,
    pub placement: ImagePlacement,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            default_size_mm: DEFAULT_QR_SIZE_MM,
            placement: ImagePlacement::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageValue {
    pub data: Vec<u8>,
    pub size_mm: Option<f64>, // square edge; None uses Options::default_size_mm
    pub source: Option<String>, // what the image encodes, shown in the fallback text
}

#[derive(Clone, Debug)]
pub enum PlaceholderValue {
    Text(String),
    Image(ImageValue),
}

/// Placeholder key → value. Iteration order is the key order, so processing
/// is deterministic regardless of insertion order.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    values: BTreeMap<String, PlaceholderValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PlaceholderValue) {
        self.values.insert(key.into(), value);
    }

    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, PlaceholderValue::Text(value.into()));
        self
    }

    pub fn image(mut self, key: impl Into<String>, data: Vec<u8>, size_mm: Option<f64>) -> Self {
        self.insert(
            key,
            PlaceholderValue::Image(ImageValue {
                data,
                size_mm,
                source: None,
            }),
        );
        self
    }

    pub fn qr_image(
        mut self,
        key: impl Into<String>,
        data: Vec<u8>,
        size_mm: Option<f64>,
        url: impl Into<String>,
    ) -> Self {
        self.insert(
            key,
            PlaceholderValue::Image(ImageValue {
                data,
                size_mm,
                source: Some(url.into()),
            }),
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&PlaceholderValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlaceholderValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Substituted {
        count: usize,
    },
    Embedded {
        count: usize,
        relationship_id: String,
        media_path: String,
    },
    FallbackUsed {
        count: usize,
        reason: String,
    },
    NotFound,
    /// Visible in the paragraph text, but split over several runs in the XML.
    SplitAcrossRuns,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyReport {
    pub key: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct ProcessReport {
    pub keys: Vec<KeyReport>,
    pub warnings: Vec<Error>,
    /// Set when a document-scoped failure caused the input to be returned untouched.
    pub original_returned: bool,
}

impl ProcessReport {
    pub fn outcome(&self, key: &str) -> Option<&Outcome> {
        self.keys.iter().find(|k| k.key == key).map(|k| &k.outcome)
    }

    pub fn images_embedded(&self) -> usize {
        self.keys
            .iter()
            .filter(|k| matches!(k.outcome, Outcome::Embedded { .. }))
            .count()
    }
}

#[derive(Debug)]
pub struct Processed {
    pub bytes: Vec<u8>,
    pub report: ProcessReport,
}
