use std::time::Instant;

use crate::docx::drawing::{EmbedTarget, embed_image_or_fallback};
use crate::docx::ensure_namespaces;
use crate::docx::placeholders::{find_tokens, split_keys, substitute_text};
use crate::error::Error;
use crate::model::{
    Bindings, KeyReport, Options, Outcome, PlaceholderValue, ProcessReport, Processed,
};
use crate::package::Container;
use crate::package::parts::{
    load_body, load_content_types, load_relationships, main_document_path, store_body,
    store_content_types, store_relationships,
};

/// Fill a template with `bindings`, sizing images without an explicit size at
/// `size_mm`. See [`process_document_with`].
pub fn process_document(
    input: &[u8],
    bindings: &Bindings,
    size_mm: f64,
) -> Result<Processed, Error> {
    let options = Options {
        default_size_mm: size_mm,
        ..Options::default()
    };
    process_document_with(input, bindings, &options)
}

/// Fill a template.
///
/// The only error is [`Error::ContainerCorrupt`]. Any other document-level
/// failure returns the input bytes untouched, with the cause in
/// `report.warnings` and `report.original_returned` set. Failures of a single
/// image binding are recovered in place with fallback text.
pub fn process_document_with(
    input: &[u8],
    bindings: &Bindings,
    options: &Options,
) -> Result<Processed, Error> {
    let t0 = Instant::now();
    let mut container = Container::open(input)?;
    let t_open = t0.elapsed();

    let mut report = ProcessReport::default();
    let bytes = match fill(&mut container, bindings, options, &mut report) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("{e}; returning the original document unchanged");
            report.warnings.push(e);
            report.original_returned = true;
            input.to_vec()
        }
    };
    let t_total = t0.elapsed();

    log::info!(
        "Timing: open={:.1}ms, fill={:.1}ms, total={:.1}ms ({} bindings, {} images, {} warnings, output {} bytes)",
        t_open.as_secs_f64() * 1000.0,
        (t_total - t_open).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bindings.len(),
        report.images_embedded(),
        report.warnings.len(),
        bytes.len(),
    );
    Ok(Processed { bytes, report })
}

fn fill(
    container: &mut Container,
    bindings: &Bindings,
    options: &Options,
    report: &mut ProcessReport,
) -> Result<Vec<u8>, Error> {
    let document_path = main_document_path(container);
    let original_body = load_body(container, &document_path)?;

    // Untouched templates keep their root tag as is.
    let has_image_tokens = bindings.iter().any(|(key, value)| {
        matches!(value, PlaceholderValue::Image(_)) && !find_tokens(&original_body, key).is_empty()
    });
    let mut body = if has_image_tokens {
        ensure_namespaces(&original_body)?
    } else {
        original_body.clone()
    };

    let mut relationships = load_relationships(container, &document_path)?;
    let mut content_types = load_content_types(container)?;
    let split = split_keys(&original_body);

    for (key, value) in bindings.iter() {
        let outcome = match value {
            PlaceholderValue::Text(text) => match substitute_text(&mut body, key, text) {
                0 => Outcome::NotFound,
                count => Outcome::Substituted { count },
            },
            PlaceholderValue::Image(image) => {
                let size_mm = image.size_mm.unwrap_or(options.default_size_mm);
                let mut target = EmbedTarget {
                    container: &mut *container,
                    relationships: &mut relationships,
                    content_types: &mut content_types,
                    document_path: &document_path,
                    placement: options.placement,
                };
                let (outcome, warning) =
                    embed_image_or_fallback(&mut body, key, image, size_mm, &mut target);
                report.warnings.extend(warning);
                outcome
            }
        };
        let outcome = match outcome {
            Outcome::NotFound if split.iter().any(|k| k == key) => {
                log::warn!("Placeholder {{{{{key}}}}} is split across runs and was left as is");
                Outcome::SplitAcrossRuns
            }
            other => other,
        };
        log::debug!("{key}: {outcome:?}");
        report.keys.push(KeyReport {
            key: key.to_string(),
            outcome,
        });
    }

    if body != original_body {
        store_body(container, &document_path, &body);
    }
    store_relationships(container, &document_path, &relationships);
    if let Some(content_types) = &content_types {
        store_content_types(container, content_types);
    }
    container.serialize()
}
