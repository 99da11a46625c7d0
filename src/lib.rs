mod assemble;
pub mod batch;
pub mod docx;
mod error;
mod model;
pub mod package;
pub mod registry;

pub use assemble::{process_document, process_document_with};
pub use error::Error;
pub use model::{
    Bindings, DEFAULT_QR_SIZE_MM, ImagePlacement, ImageValue, KeyReport, Options, Outcome,
    PlaceholderValue, ProcessReport, Processed,
};
pub use registry::{Template, TemplateRegistry};

use std::path::Path;
use std::time::Instant;

pub fn fill_docx_file(
    input: &Path,
    output: &Path,
    bindings: &Bindings,
    options: &Options,
) -> Result<ProcessReport, Error> {
    let t0 = Instant::now();

    let bytes = std::fs::read(input).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, input.display())),
        ),
        _ => Error::Io(e),
    })?;
    let t_read = t0.elapsed();

    let processed = process_document_with(&bytes, bindings, options)?;
    let t_fill = t0.elapsed();

    std::fs::write(output, &processed.bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: read={:.1}ms, fill={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_read.as_secs_f64() * 1000.0,
        (t_fill - t_read).as_secs_f64() * 1000.0,
        (t_total - t_fill).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        processed.bytes.len(),
    );

    Ok(processed.report)
}

/// Placeholder keys of a template, plus those split across runs.
pub fn inspect_docx_bytes(input: &[u8]) -> Result<(Vec<String>, Vec<String>), Error> {
    let container = package::Container::open(input)?;
    let document_path = package::parts::main_document_path(&container);
    let body = package::parts::load_body(&container, &document_path)?;
    Ok((
        docx::placeholders::scan_keys(&body),
        docx::placeholders::split_keys(&body),
    ))
}
