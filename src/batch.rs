//! Boundary with the form and spreadsheet collaborators: turning their inputs
//! into [`Bindings`] and running one document per row.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::assemble::process_document_with;
use crate::error::Error;
use crate::model::{Bindings, ImageValue, Options, PlaceholderValue, Processed};

pub const TITLE_KEY: &str = "TITLE_PLACEHOLDER";
pub const BODY_KEY: &str = "BODY_PLACEHOLDER";
pub const MAX_QR_PER_ROW: usize = 10;

/// Bitmap resolution handed to the QR generator.
pub const PIXELS_PER_MM: f64 = 8.0;

/// Produces PNG bytes encoding `url`, `pixel_width` pixels square.
pub trait QrRenderer {
    fn render_png(&self, url: &str, pixel_width: u32) -> Result<Vec<u8>, String>;
}

pub fn qr_pixel_width(size_mm: f64) -> u32 {
    (size_mm * PIXELS_PER_MM).round().max(1.0) as u32
}

pub fn qr_code_key(n: usize) -> String {
    format!("QR_CODE_{n}")
}

pub fn qr_title_key(n: usize) -> String {
    format!("QR_TITLE_{n}")
}

#[derive(Clone, Debug, Default)]
pub struct QrEntry {
    pub url: String,
    pub title: String,
}

/// What the single-document form collects.
#[derive(Clone, Debug, Default)]
pub struct FormInput {
    pub title: String,
    pub body: String,
    pub qr_codes: Vec<QrEntry>,
}

impl FormInput {
    /// Entries with a blank URL are dropped and the rest numbered from 1.
    pub fn to_bindings(&self, renderer: &dyn QrRenderer, size_mm: f64) -> Bindings {
        let mut bindings = Bindings::new()
            .text(TITLE_KEY, self.title.as_str())
            .text(BODY_KEY, self.body.as_str());
        let filled = self.qr_codes.iter().filter(|qr| !qr.url.trim().is_empty());
        for (i, qr) in filled.enumerate() {
            add_qr(&mut bindings, i + 1, qr, renderer, size_mm);
        }
        bindings
    }
}

/// One spreadsheet row: up to ten URL/title pairs, by column position.
#[derive(Clone, Debug, Default)]
pub struct BatchRow {
    pub qr_codes: Vec<QrEntry>,
}

impl BatchRow {
    /// Rows without a first URL carry no document.
    pub fn is_empty(&self) -> bool {
        self.qr_codes
            .first()
            .is_none_or(|qr| qr.url.trim().is_empty())
    }

    /// Unlike the form, numbering follows the column, so a blank pair leaves a gap.
    pub fn to_bindings(
        &self,
        title: &str,
        body: &str,
        renderer: &dyn QrRenderer,
        size_mm: f64,
    ) -> Bindings {
        let mut bindings = Bindings::new().text(TITLE_KEY, title).text(BODY_KEY, body);
        for (i, qr) in self.qr_codes.iter().take(MAX_QR_PER_ROW).enumerate() {
            if !qr.url.trim().is_empty() {
                add_qr(&mut bindings, i + 1, qr, renderer, size_mm);
            }
        }
        bindings
    }
}

fn add_qr(bindings: &mut Bindings, n: usize, qr: &QrEntry, renderer: &dyn QrRenderer, size_mm: f64) {
    let url = qr.url.trim();
    // An empty buffer fails embedding and yields the fallback text for this code only.
    let data = renderer
        .render_png(url, qr_pixel_width(size_mm))
        .unwrap_or_else(|e| {
            log::warn!("QR generation failed for {}: {e}", qr_code_key(n));
            Vec::new()
        });
    bindings.insert(
        qr_code_key(n),
        PlaceholderValue::Image(ImageValue {
            data,
            size_mm: Some(size_mm),
            source: Some(url.to_string()),
        }),
    );
    let title = if qr.title.trim().is_empty() {
        format!("QR Code {n}")
    } else {
        qr.title.clone()
    };
    bindings.insert(qr_title_key(n), PlaceholderValue::Text(title));
}

#[derive(Clone, Debug, Default)]
pub struct BatchInput {
    pub title: String,
    pub body: String,
    pub rows: Vec<BatchRow>,
}

pub struct BatchDocument {
    pub file_name: String,
    pub result: Result<Processed, Error>,
}

/// Fill `template` once per non-empty row.
///
/// Documents are produced one after another, each from a freshly opened
/// container, so nothing carries over between rows.
pub fn process_batch(
    template: &[u8],
    input: &BatchInput,
    renderer: &dyn QrRenderer,
    options: &Options,
) -> Vec<BatchDocument> {
    let rows: Vec<&BatchRow> = input.rows.iter().filter(|r| !r.is_empty()).collect();
    log::info!("Batch: {} documents from {} rows", rows.len(), input.rows.len());

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let bindings =
                row.to_bindings(&input.title, &input.body, renderer, options.default_size_mm);
            let result = process_document_with(template, &bindings, options);
            if let Err(e) = &result {
                log::warn!("Batch document {}: {e}", i + 1);
            }
            BatchDocument {
                file_name: batch_file_name(i + 1, now_millis()),
                result,
            }
        })
        .collect()
}

/// `Processed_<stem>_<millis>.docx`
pub fn processed_file_name(template_name: &str, millis: u128) -> String {
    let stem = template_name.strip_suffix(".docx").unwrap_or(template_name);
    format!("Processed_{stem}_{millis}.docx")
}

/// `Document_<n>_<millis>.docx`
pub fn batch_file_name(n: usize, millis: u128) -> String {
    format!("Document_{n}_{millis}.docx")
}

pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
