//! Template conventions.
//!
//! The master template is fixed, but all of its ambient conventions —
//! part names, anchor spellings, shape names, media slots, width
//! heuristics — live here as an explicit, versioned configuration value
//! instead of literals scattered through the pipeline. Tests run the
//! engine against synthetic templates by constructing their own value.

use serde::{Deserialize, Serialize};

/// Anchor spellings for one form field. The master template mixes two
/// conventions: a bracket form (`«key»`) and, in some locations, a plain
/// literal string carrying the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAnchor {
    /// Key between `«` and `»`.
    pub bracket: String,
    /// Literal spelling used verbatim in some parts, if any.
    pub literal: Option<String>,
}

impl FieldAnchor {
    pub fn bracket_only(key: &str) -> Self {
        Self {
            bracket: key.to_string(),
            literal: None,
        }
    }

    pub fn with_literal(key: &str, literal: &str) -> Self {
        Self {
            bracket: key.to_string(),
            literal: Some(literal.to_string()),
        }
    }
}

/// Anchor spellings for every text field of the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAnchors {
    pub sender: FieldAnchor,
    pub to: FieldAnchor,
    pub subject_name: FieldAnchor,
    pub body: FieldAnchor,
    pub closing: FieldAnchor,
    pub signature: FieldAnchor,
}

/// All conventions the engine assumes about the master template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConventions {
    /// Schema version of this conventions value.
    pub version: u32,

    /// The main document part. Its absence is fatal.
    pub main_part: String,
    /// Every part that may contain user-visible text (main document plus
    /// header/footer variants). Missing entries are skipped.
    pub text_parts: Vec<String>,

    pub field_anchors: FieldAnchors,

    /// Literal sentinel of the repeatable "copy to" paragraph.
    pub cc_anchor: String,
    /// Header label identifying the notes column (and fingerprinting the
    /// one template table).
    pub notes_header: String,
    /// Declared display name of the removable date-box shape.
    pub date_box_name: String,
    /// Fallback internal shape id, matched when the display name is not
    /// found (template drift).
    pub date_box_id: String,

    /// Media part overwritten by the watermark logo slot.
    pub watermark_part: String,
    /// Media part overwritten by the header logo slot.
    pub header_logo_part: String,

    /// Fixed width of the notes column, twips.
    pub notes_column_twips: u32,
    /// Width contributed per character of the widest cell, twips.
    pub char_twips: u32,
    /// Padding added on top of the character estimate, twips.
    pub padding_twips: u32,
    /// Floor for any computed column width, twips.
    pub min_column_twips: u32,

    /// Printable area for appended images, EMUs.
    pub printable_width_emu: u64,
    pub printable_height_emu: u64,
    /// Pixel dimensions assumed when an appended image cannot be probed.
    pub assumed_image_px: (u32, u32),
}

impl Default for TemplateConventions {
    fn default() -> Self {
        Self {
            version: 1,
            main_part: "word/document.xml".to_string(),
            text_parts: vec![
                "word/document.xml".to_string(),
                "word/header1.xml".to_string(),
                "word/header2.xml".to_string(),
                "word/header3.xml".to_string(),
                "word/footer1.xml".to_string(),
                "word/footer2.xml".to_string(),
                "word/footer3.xml".to_string(),
            ],
            field_anchors: FieldAnchors {
                sender: FieldAnchor::bracket_only("sender"),
                to: FieldAnchor::with_literal("to", "اسم المخاطب"),
                subject_name: FieldAnchor::with_literal("subject_name", "موضوع الخطاب"),
                body: FieldAnchor::bracket_only("body"),
                closing: FieldAnchor::bracket_only("closing"),
                signature: FieldAnchor::bracket_only("signature"),
            },
            cc_anchor: "نسخة إلى".to_string(),
            notes_header: "الملاحظات".to_string(),
            date_box_name: "مربع التاريخ".to_string(),
            date_box_id: "_x0000_s1026".to_string(),
            watermark_part: "word/media/image1.png".to_string(),
            header_logo_part: "word/media/image2.png".to_string(),
            notes_column_twips: 4320,
            char_twips: 120,
            padding_twips: 240,
            min_column_twips: 720,
            printable_width_emu: 5_760_000,
            printable_height_emu: 8_892_000,
            assumed_image_px: (1000, 1414),
        }
    }
}

impl FieldAnchors {
    /// Anchor spellings for the field named `name` (the `LetterForm`
    /// field identifiers).
    pub(crate) fn get(&self, name: &str) -> &FieldAnchor {
        match name {
            "sender" => &self.sender,
            "to" => &self.to,
            "subject_name" => &self.subject_name,
            "body" => &self.body,
            "closing" => &self.closing,
            "signature" => &self.signature,
            other => unreachable!("unknown field name {other}"),
        }
    }
}

impl TemplateConventions {
    /// Relationship part owning `part` (e.g. `word/_rels/document.xml.rels`
    /// for `word/document.xml`).
    pub fn rels_part_for(part: &str) -> String {
        match part.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
            None => format!("_rels/{part}.rels"),
        }
    }
}
