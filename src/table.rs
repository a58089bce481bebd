//! Table regeneration.
//!
//! The template carries exactly one table, fingerprinted by the
//! notes-column header label somewhere in its content. Its style blocks
//! (table properties, header row, first data row) are the style source
//! for the regenerated table; only text and column widths change.

use regex::Regex;
use tracing::{debug, warn};

use crate::conventions::TemplateConventions;
use crate::model::TableModel;
use crate::xmlutil::{escape_xml, find_block};

/// Layout strategy of the rebuilt table, selected by render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// Fixed layout with an absolute (dxa) table width. Required by the
    /// constrained mobile rendering engine.
    Fixed,
    /// Autofit layout with a percentage table width, for the desktop
    /// editor. Computed column widths remain as hints.
    Autofit,
}

/// Regenerates (or removes) every table block matching the fingerprint.
/// `grid` of `None` removes; `Some` rebuilds the first match in place.
/// Returns the new part text and whether any block matched.
pub(crate) fn synthesize(
    xml: &str,
    grid: Option<&TableModel>,
    layout: TableLayout,
    conventions: &TemplateConventions,
) -> (String, bool) {
    let mut out = xml.to_string();
    let mut matched = false;
    let mut from = 0;
    while let Some((start, end)) = find_block(&out, "w:tbl", from) {
        if !out[start..end].contains(&conventions.notes_header) {
            from = end;
            continue;
        }
        matched = true;
        match grid {
            None => {
                debug!("removing template table");
                out.replace_range(start..end, "");
                from = start;
            }
            Some(model) => {
                match rebuild(&out[start..end], model, layout, conventions) {
                    Some(table) => {
                        debug!(
                            rows = model.row_count(),
                            cols = model.column_count(),
                            "rebuilt template table"
                        );
                        out.replace_range(start..end, &table);
                    }
                    None => warn!("template table has no usable row templates, left unchanged"),
                }
                break;
            }
        }
    }
    (out, matched)
}

/// Computed widths in twips, one per column. The notes column gets a
/// large fixed width; every other column is sized from its widest cell.
pub(crate) fn column_widths(
    model: &TableModel,
    notes_column: Option<usize>,
    conventions: &TemplateConventions,
) -> Vec<u32> {
    (0..model.column_count())
        .map(|c| {
            if Some(c) == notes_column {
                return conventions.notes_column_twips;
            }
            let longest = model
                .rows()
                .iter()
                .map(|row| row[c].chars().count() as u32)
                .max()
                .unwrap_or(0);
            (longest * conventions.char_twips + conventions.padding_twips)
                .max(conventions.min_column_twips)
        })
        .collect()
}

fn rebuild(
    block: &str,
    model: &TableModel,
    layout: TableLayout,
    conventions: &TemplateConventions,
) -> Option<String> {
    let tbl_pr = find_block(block, "w:tblPr", 0)
        .map(|(s, e)| &block[s..e])
        .unwrap_or("<w:tblPr></w:tblPr>");

    // Row templates: header row, then first data row (header again when
    // the template has a single row).
    let (h_start, h_end) = find_block(block, "w:tr", 0)?;
    let header_row = &block[h_start..h_end];
    let data_row = find_block(block, "w:tr", h_end)
        .map(|(s, e)| &block[s..e])
        .unwrap_or(header_row);

    let notes_column = model.header().and_then(|header| {
        header
            .iter()
            .position(|cell| cell.trim() == conventions.notes_header)
    });
    let widths = column_widths(model, notes_column, conventions);
    let total: u32 = widths.iter().sum();
    let total = if total > 0 {
        total
    } else {
        declared_grid_total(block)
    };

    let grid_xml: String = std::iter::once("<w:tblGrid>".to_string())
        .chain(widths.iter().map(|w| format!(r#"<w:gridCol w:w="{w}"/>"#)))
        .chain(std::iter::once("</w:tblGrid>".to_string()))
        .collect();

    let mut rows_xml = String::new();
    for (i, row) in model.rows().iter().enumerate() {
        let template = if i == 0 { header_row } else { data_row };
        rows_xml.push_str(&build_row(template, row, &widths)?);
    }

    Some(format!(
        "<w:tbl>{}{}{}</w:tbl>",
        apply_layout(tbl_pr, layout, total),
        grid_xml,
        rows_xml
    ))
}

/// Sum of the template's declared grid-column widths, the fallback total
/// when nothing else yields one.
fn declared_grid_total(block: &str) -> u32 {
    let grid_col = Regex::new(r#"<w:gridCol[^>]*w:w="(\d+)""#).expect("gridCol pattern is static");
    grid_col
        .captures_iter(block)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .sum()
}

/// Forces the layout strategy onto the template's table properties,
/// replacing declared width/layout in place and keeping everything else.
fn apply_layout(tbl_pr: &str, layout: TableLayout, total: u32) -> String {
    let (width_xml, layout_xml) = match layout {
        TableLayout::Fixed => (
            format!(r#"<w:tblW w:w="{total}" w:type="dxa"/>"#),
            r#"<w:tblLayout w:type="fixed"/>"#.to_string(),
        ),
        TableLayout::Autofit => (
            r#"<w:tblW w:w="5000" w:type="pct"/>"#.to_string(),
            r#"<w:tblLayout w:type="autofit"/>"#.to_string(),
        ),
    };

    let mut out = tbl_pr.to_string();
    out = replace_or_insert(&out, "w:tblW", &width_xml);
    out = replace_or_insert(&out, "w:tblLayout", &layout_xml);
    out
}

/// Replaces the first `tag` element inside a properties block, or inserts
/// `xml` right after the block's opening tag when absent.
fn replace_or_insert(props: &str, tag: &str, xml: &str) -> String {
    let mut out = props.to_string();
    match find_block(&out, tag, 0) {
        Some((s, e)) => out.replace_range(s..e, xml),
        None => {
            if let Some(open_end) = out.find('>') {
                out.insert_str(open_end + 1, xml);
            }
        }
    }
    out
}

fn build_row(template: &str, cells: &[String], widths: &[u32]) -> Option<String> {
    let open_end = template.find('>')? + 1;
    let open_tag = &template[..open_end];
    let tr_pr = find_block(template, "w:trPr", 0)
        .map(|(s, e)| &template[s..e])
        .unwrap_or("");
    let (c_start, c_end) = find_block(template, "w:tc", 0)?;
    let cell_template = &template[c_start..c_end];

    let mut row = String::from(open_tag);
    row.push_str(tr_pr);
    for (text, width) in cells.iter().zip(widths) {
        row.push_str(&build_cell(cell_template, text, *width));
    }
    row.push_str("</w:tr>");
    Some(row)
}

/// Rebuilds one cell from its style template: declared width forced to
/// the computed one, first text run carrying the new (escaped) text,
/// remaining runs emptied, all other properties copied verbatim.
fn build_cell(template: &str, text: &str, width: u32) -> String {
    let width_xml = format!(r#"<w:tcW w:w="{width}" w:type="dxa"/>"#);
    let mut cell = match find_block(template, "w:tcW", 0) {
        Some((s, e)) => {
            let mut c = template.to_string();
            c.replace_range(s..e, &width_xml);
            c
        }
        None => match find_block(template, "w:tcPr", 0) {
            Some((s, _)) => {
                let mut c = template.to_string();
                let open_end = c[s..].find('>').map(|i| s + i + 1).unwrap_or(s);
                c.insert_str(open_end, &width_xml);
                c
            }
            None => {
                let mut c = template.to_string();
                if let Some(open_end) = c.find('>') {
                    c.insert_str(open_end + 1, &format!("<w:tcPr>{width_xml}</w:tcPr>"));
                }
                c
            }
        },
    };

    let run_re = Regex::new(r"<w:t[^>]*>[^<]*</w:t>").expect("run pattern is static");
    let escaped = escape_xml(text);
    let mut first = true;
    cell = run_re
        .replace_all(&cell, |_: &regex::Captures<'_>| {
            if first {
                first = false;
                format!(r#"<w:t xml:space="preserve">{escaped}</w:t>"#)
            } else {
                "<w:t></w:t>".to_string()
            }
        })
        .into_owned();

    if first {
        // Template cell had no text run at all.
        if let Some(close) = cell.rfind("</w:tc>") {
            cell.insert_str(
                close,
                &format!(r#"<w:p><w:r><w:t xml:space="preserve">{escaped}</w:t></w:r></w:p>"#),
            );
        }
    }
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conventions() -> TemplateConventions {
        TemplateConventions::default()
    }

    /// Minimal template table carrying the notes-column fingerprint.
    fn template_table() -> String {
        let notes = conventions().notes_header;
        concat!(
            "<w:tbl>",
            r#"<w:tblPr><w:tblStyle w:val="Grid"/><w:tblW w:w="9000" w:type="dxa"/></w:tblPr>"#,
            r#"<w:tblGrid><w:gridCol w:w="3000"/><w:gridCol w:w="6000"/></w:tblGrid>"#,
            r#"<w:tr><w:trPr><w:trHeight w:val="400"/></w:trPr>"#,
            r#"<w:tc><w:tcPr><w:tcW w:w="3000" w:type="dxa"/><w:shd w:fill="DDDDDD"/></w:tcPr>"#,
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>م</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:tcPr><w:tcW w:w="6000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>NOTES</w:t></w:r></w:p></w:tc>"#,
            "</w:tr>",
            r#"<w:tr><w:tc><w:tcPr><w:tcW w:w="3000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>1</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:tcPr><w:tcW w:w="6000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc></w:tr>"#,
            "</w:tbl>"
        )
        .replace("NOTES", &notes)
    }

    fn document_with_table() -> String {
        format!("<w:body><w:p/>{}<w:p/></w:body>", template_table())
    }

    fn model_2x3() -> TableModel {
        TableModel::new(vec![
            vec!["م".into(), "البيان".into(), conventions().notes_header],
            vec!["1".into(), "قلم حبر".into(), "عاجل".into()],
        ])
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn no_grid_removes_every_fingerprinted_table() {
        let doc = format!("{}{}", document_with_table(), template_table());
        let (out, matched) = synthesize(&doc, None, TableLayout::Fixed, &conventions());
        assert!(matched);
        assert_eq!(count(&out, "<w:tbl>"), 0);
        assert!(out.contains("<w:p/>"));
    }

    #[test]
    fn unrelated_table_is_untouched() {
        let doc = "<w:body><w:tbl><w:tr><w:tc><w:p><w:r><w:t>other</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body>";
        let (out, matched) = synthesize(doc, None, TableLayout::Fixed, &conventions());
        assert!(!matched);
        assert_eq!(out, doc);
    }

    #[test]
    fn rebuilt_table_matches_grid_shape() {
        let model = model_2x3();
        let (out, matched) =
            synthesize(&document_with_table(), Some(&model), TableLayout::Fixed, &conventions());
        assert!(matched);
        assert_eq!(count(&out, "<w:tr>"), 2);
        assert_eq!(count(&out, "<w:tc>"), 6);
        assert_eq!(count(&out, "<w:gridCol"), 3);
    }

    #[test]
    fn deserialized_ragged_grid_rebuilds_without_gaps() {
        let conv = conventions();
        let json = format!(
            r#"{{"rows":[["1","2","{}"],["x"]]}}"#,
            conv.notes_header
        );
        let model: TableModel = serde_json::from_str(&json).unwrap();
        let (out, matched) =
            synthesize(&document_with_table(), Some(&model), TableLayout::Fixed, &conv);
        assert!(matched);
        assert_eq!(count(&out, "<w:tc>"), 6);
        assert_eq!(count(&out, "<w:gridCol"), 3);
    }

    #[test]
    fn notes_column_width_dominates() {
        let conv = conventions();
        let model = TableModel::new(vec![
            vec![
                "م".into(),
                "وصف طويل جدا جدا جدا جدا جدا جدا".into(),
                conv.notes_header.clone(),
            ],
            vec!["1".into(), "نص".into(), "م".into()],
        ]);
        let widths = column_widths(&model, Some(2), &conv);
        assert!(widths[2] >= widths[0]);
        assert!(widths[2] >= widths[1]);
        assert!(widths[2] > conv.min_column_twips);
    }

    #[test]
    fn narrow_columns_hit_the_floor() {
        let conv = conventions();
        let model = TableModel::new(vec![vec!["م".into()], vec!["1".into()]]);
        let widths = column_widths(&model, None, &conv);
        assert_eq!(widths, vec![conv.min_column_twips]);
    }

    #[test]
    fn fixed_layout_declares_dxa_width() {
        let model = model_2x3();
        let conv = conventions();
        let (out, _) =
            synthesize(&document_with_table(), Some(&model), TableLayout::Fixed, &conv);
        assert!(out.contains(r#"<w:tblLayout w:type="fixed"/>"#));
        let total: u32 = column_widths(&model, Some(2), &conv).iter().sum();
        assert!(out.contains(&format!(r#"<w:tblW w:w="{total}" w:type="dxa"/>"#)));
    }

    #[test]
    fn autofit_layout_declares_pct_width() {
        let (out, _) = synthesize(
            &document_with_table(),
            Some(&model_2x3()),
            TableLayout::Autofit,
            &conventions(),
        );
        assert!(out.contains(r#"<w:tblLayout w:type="autofit"/>"#));
        assert!(out.contains(r#"<w:tblW w:w="5000" w:type="pct"/>"#));
    }

    #[test]
    fn header_cells_keep_template_shading() {
        let (out, _) = synthesize(
            &document_with_table(),
            Some(&model_2x3()),
            TableLayout::Fixed,
            &conventions(),
        );
        // Header style template carries shading and bold run properties;
        // both must survive into every rebuilt header cell.
        assert_eq!(count(&out, r#"<w:shd w:fill="DDDDDD"/>"#), 3);
        assert!(out.contains("<w:b/>"));
    }

    #[test]
    fn cell_text_is_escaped() {
        let model = TableModel::new(vec![
            vec![conventions().notes_header],
            vec!["a & b".into()],
        ]);
        let (out, _) = synthesize(
            &document_with_table(),
            Some(&model),
            TableLayout::Fixed,
            &conventions(),
        );
        assert!(out.contains("a &amp; b"));
    }
}
