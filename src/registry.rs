use std::collections::BTreeMap;
use std::path::Path;

use crate::assemble::process_document_with;
use crate::error::Error;
use crate::model::{Bindings, Options, Processed};

#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub display_name: String,
    pub bytes: Vec<u8>,
}

/// Uploaded templates, keyed by name.
///
/// Owned by whoever constructs it. Nothing in the crate keeps a shared
/// instance, so independent callers never see each other's templates.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the template previously registered under `name`, if any.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        display_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Option<Template> {
        let name = name.into();
        let template = Template {
            name: name.clone(),
            display_name: display_name.into(),
            bytes,
        };
        self.templates.insert(name, template)
    }

    /// Register a file under its stem, e.g. `Patient_Letter.docx` becomes
    /// `Patient_Letter`, shown as "Patient Letter".
    pub fn add_file(&mut self, path: &Path) -> Result<String, Error> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template")
            .to_string();
        let display_name = display_name_for(&name);
        log::info!("Registered template {name} ({} bytes)", bytes.len());
        self.add(name.clone(), display_name, bytes);
        Ok(name)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Template> {
        self.templates.remove(name)
    }

    /// Templates sorted by name.
    pub fn list(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn process(
        &self,
        name: &str,
        bindings: &Bindings,
        options: &Options,
    ) -> Result<Processed, Error> {
        let template = self
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        process_document_with(&template.bytes, bindings, options)
    }
}

pub fn display_name_for(name: &str) -> String {
    name.replace('_', " ")
}
