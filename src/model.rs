//! Data model for one export request.
//!
//! A [`LetterForm`] is created by the caller per export and is immutable
//! for the duration of synthesis. All text fields are raw user input;
//! bidi shaping and XML escaping happen inside the pipeline.

use serde::{Deserialize, Serialize};

/// The filled letter form handed to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LetterForm {
    pub sender: String,
    pub to: String,
    pub subject_name: String,
    pub body: String,
    pub closing: String,
    pub signature: String,
    /// "Copy to" lines, one entry per recipient of a copy.
    #[serde(default)]
    pub cc_lines: Vec<String>,
    /// Whether the floating date box stays in the letter.
    #[serde(default)]
    pub show_date: bool,
    /// Whether the letter carries a table. When false, the template
    /// table is removed regardless of `table`.
    #[serde(default)]
    pub use_table: bool,
    #[serde(default)]
    pub table: Option<TableModel>,
    /// Raw logo bytes overwriting the watermark and header-logo slots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Vec<u8>>,
    /// Images appended as extra pages, in order.
    #[serde(default)]
    pub appended_images: Vec<AppendedImage>,
}

impl LetterForm {
    /// The named text fields in substitution order.
    pub(crate) fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("sender", &self.sender),
            ("to", &self.to),
            ("subject_name", &self.subject_name),
            ("body", &self.body),
            ("closing", &self.closing),
            ("signature", &self.signature),
        ]
    }
}

/// A rectangular grid of cell strings. Row 0 is the header.
///
/// Rectangularity holds by construction: both [`TableModel::new`] and
/// deserialization pad short rows, so no other stage revalidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawTableModel")]
pub struct TableModel {
    rows: Vec<Vec<String>>,
}

/// Wire shape of [`TableModel`]; rows may arrive ragged.
#[derive(Deserialize)]
struct RawTableModel {
    rows: Vec<Vec<String>>,
}

impl From<RawTableModel> for TableModel {
    fn from(raw: RawTableModel) -> Self {
        TableModel::new(raw.rows)
    }
}

impl TableModel {
    /// Builds a grid, padding short rows with empty cells so every row
    /// has the same column count.
    pub fn new(mut rows: Vec<Vec<String>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(cols, String::new());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }

    /// Header cells (row 0), if any.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }
}

/// One image appended to the letter as a new page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendedImage {
    pub data: Vec<u8>,
    /// Display name used for the drawing's non-visual properties.
    #[serde(default)]
    pub name: Option<String>,
}
