//! Template-merge engine for a fixed Arabic business-letter DOCX
//! template.
//!
//! Given the master template bytes and a filled [`LetterForm`], the
//! engine produces a new, structurally valid package: placeholders
//! resolved (with bidi repair of mixed-script values), the template
//! table regenerated or removed, conditional sections pruned, logo
//! slots overwritten, extra images appended as pages, and every
//! relationship id and media filename kept consistent.
//!
//! ```no_run
//! use docx_letter::{LetterForm, LetterSynthesizer, RenderTarget};
//!
//! let template: Vec<u8> = std::fs::read("master.docx").unwrap();
//! let form = LetterForm {
//!     to: "أحمد".to_string(),
//!     subject_name: "طلب".to_string(),
//!     ..Default::default()
//! };
//! let engine = LetterSynthesizer::new(RenderTarget::MobileKit);
//! let letter = engine.synthesize(&template, &form).unwrap();
//! ```
//!
//! Rendering the produced package to PDF or images, persistence and
//! sharing are the caller's concern.

pub mod bidi;
pub mod conventions;
pub mod engine;
pub mod error;
mod images;
pub mod model;
pub mod package;
mod placeholder;
mod prune;
pub mod table;
mod xmlutil;

pub use conventions::{FieldAnchor, FieldAnchors, TemplateConventions};
pub use engine::{LetterSynthesizer, RenderTarget};
pub use error::SynthesisError;
pub use model::{AppendedImage, LetterForm, TableModel};
pub use table::TableLayout;
