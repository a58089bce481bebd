//! Container load and repack.
//!
//! A loaded package is a flat mapping of part name → content, with text
//! parts (XML and relationship tables) held as strings and everything
//! else (media) as bytes. Archive order is preserved so the output
//! container lists parts the way the template did.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::conventions::TemplateConventions;
use crate::error::{Result, SynthesisError};

/// Content of one part.
#[derive(Debug, Clone)]
pub enum PartContent {
    Text(String),
    Binary(Vec<u8>),
}

/// One entry of a part's relationship table.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// The in-memory document package one export operates on.
#[derive(Debug, Clone)]
pub struct TemplatePackage {
    order: Vec<String>,
    parts: HashMap<String, PartContent>,
}

impl TemplatePackage {
    /// Unpacks the container. Nominally-text parts that are not valid
    /// UTF-8 are kept as binary and passed through untouched.
    pub fn load(bytes: &[u8], conventions: &TemplateConventions) -> Result<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(SynthesisError::CorruptPackage)?;

        let mut order = Vec::with_capacity(archive.len());
        let mut parts = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(SynthesisError::CorruptPackage)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .map_err(|e| SynthesisError::CorruptPackage(e.into()))?;

            let content = if name.ends_with(".xml") || name.ends_with(".rels") {
                match String::from_utf8(buf) {
                    Ok(text) => PartContent::Text(text),
                    Err(e) => {
                        warn!(part = %name, "text part is not valid UTF-8, passing through");
                        PartContent::Binary(e.into_bytes())
                    }
                }
            } else {
                PartContent::Binary(buf)
            };
            order.push(name.clone());
            parts.insert(name, content);
        }

        let pkg = Self { order, parts };
        if pkg.text(&conventions.main_part).is_none() {
            return Err(SynthesisError::MissingRequiredPart(
                conventions.main_part.clone(),
            ));
        }
        info!(parts = pkg.order.len(), "loaded template package");
        Ok(pkg)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.parts.get(name) {
            Some(PartContent::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn binary(&self, name: &str) -> Option<&[u8]> {
        match self.parts.get(name) {
            Some(PartContent::Binary(b)) => Some(b),
            _ => None,
        }
    }

    /// Replaces or appends a text part.
    pub fn set_text(&mut self, name: &str, content: String) {
        if !self.parts.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.parts
            .insert(name.to_string(), PartContent::Text(content));
    }

    /// Replaces or appends a binary part.
    pub fn set_binary(&mut self, name: &str, bytes: Vec<u8>) {
        if !self.parts.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.parts
            .insert(name.to_string(), PartContent::Binary(bytes));
    }

    /// Parses the relationship table owned by `part`. A missing or
    /// malformed table yields an empty list.
    pub fn relationships(&self, part: &str) -> Vec<Relationship> {
        let rels_name = TemplateConventions::rels_part_for(part);
        let Some(xml) = self.text(&rels_name) else {
            return Vec::new();
        };
        let doc = match roxmltree::Document::parse(xml) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(part = %rels_name, error = %e, "unparseable relationship table");
                return Vec::new();
            }
        };
        let mut rels = Vec::new();
        for node in doc.descendants() {
            if node.tag_name().name() != "Relationship" {
                continue;
            }
            if let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) {
                rels.push(Relationship {
                    id: id.to_string(),
                    rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                    target: target.to_string(),
                });
            }
        }
        debug!(part = %rels_name, count = rels.len(), "parsed relationship table");
        rels
    }

    /// Repacks every part (modified and untouched) into a new container.
    pub fn assemble(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for name in &self.order {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| SynthesisError::AssemblyFailure(e.to_string()))?;
            let bytes: &[u8] = match &self.parts[name] {
                PartContent::Text(t) => t.as_bytes(),
                PartContent::Binary(b) => b,
            };
            writer
                .write_all(bytes)
                .map_err(|e| SynthesisError::AssemblyFailure(e.to_string()))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| SynthesisError::AssemblyFailure(e.to_string()))?;
        info!(parts = self.order.len(), "assembled output package");
        Ok(cursor.into_inner())
    }
}
