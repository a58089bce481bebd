//! Pipeline orchestration.
//!
//! One call in, one result out: the engine loads its own private copy of
//! the template, runs the stages in order and repacks. No I/O happens
//! beyond the initial unzip and final assembly, so concurrent exports
//! never share state.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::conventions::TemplateConventions;
use crate::error::Result;
use crate::images;
use crate::model::{LetterForm, TableModel};
use crate::package::TemplatePackage;
use crate::placeholder::ReplacementSet;
use crate::prune;
use crate::table::{self, TableLayout};

/// A4 in twips, forced onto the main part for the mobile renderer.
const A4_TWIPS: (u32, u32) = (11906, 16838);

/// The rendering engine the produced document is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Constrained mobile rendering engine: fixed table layout, forced
    /// standard page size.
    MobileKit,
    /// Full-featured desktop editor: autofit table layout.
    DesktopEditor,
}

impl RenderTarget {
    fn table_layout(self) -> TableLayout {
        match self {
            RenderTarget::MobileKit => TableLayout::Fixed,
            RenderTarget::DesktopEditor => TableLayout::Autofit,
        }
    }

    fn forces_page_size(self) -> bool {
        matches!(self, RenderTarget::MobileKit)
    }
}

/// The template-merge engine. Construct once per target, call
/// [`synthesize`](Self::synthesize) per export.
pub struct LetterSynthesizer {
    conventions: TemplateConventions,
    target: RenderTarget,
}

impl LetterSynthesizer {
    pub fn new(target: RenderTarget) -> Self {
        Self::with_conventions(target, TemplateConventions::default())
    }

    pub fn with_conventions(target: RenderTarget, conventions: TemplateConventions) -> Self {
        Self {
            conventions,
            target,
        }
    }

    pub fn conventions(&self) -> &TemplateConventions {
        &self.conventions
    }

    /// Runs the full pipeline over `template` and returns the new
    /// container bytes.
    pub fn synthesize(&self, template: &[u8], form: &LetterForm) -> Result<Vec<u8>> {
        let conv = &self.conventions;
        let mut pkg = TemplatePackage::load(template, conv)?;

        // Placeholders across every text part that exists. The loader
        // already guaranteed the main part; other parts degrade per-part.
        let replacements = ReplacementSet::from_form(form, conv);
        for part in &conv.text_parts {
            match pkg.text(part) {
                Some(text) => {
                    let updated = replacements.apply(text);
                    pkg.set_text(part, updated);
                }
                None if pkg.contains(part) => {
                    warn!(part = %part, "text part unreadable, left unmodified");
                }
                None => debug!(part = %part, "text part absent, skipped"),
            }
        }

        // Table synthesis on the main part.
        let grid = effective_grid(form);
        let main = match pkg.text(&conv.main_part) {
            Some(text) => text.to_string(),
            None => {
                return Err(crate::error::SynthesisError::MissingRequiredPart(
                    conv.main_part.clone(),
                ))
            }
        };
        let (main, matched) = table::synthesize(&main, grid, self.target.table_layout(), conv);
        if form.use_table && grid.is_some() && !matched {
            warn!("table requested but no template table matched the fingerprint");
        }

        // Conditional sections.
        let main = prune::apply_distribution_list(&main, &form.cc_lines, conv);
        let main = prune::apply_date_box(&main, form.show_date, conv);
        pkg.set_text(&conv.main_part, main);

        // Media.
        if let Some(logo) = &form.logo {
            images::apply_logo(&mut pkg, logo, conv);
        }
        images::append_images(&mut pkg, &form.appended_images, conv);

        if self.target.forces_page_size() {
            self.force_page_size(&mut pkg);
        }

        let out = pkg.assemble()?;
        info!(
            bytes = out.len(),
            render_target = ?self.target,
            "synthesized letter package"
        );
        Ok(out)
    }

    /// Rewrites the declared page size to A4; the mobile renderer lays
    /// out unstable page geometry otherwise.
    fn force_page_size(&self, pkg: &mut TemplatePackage) {
        let Some(doc) = pkg.text(&self.conventions.main_part) else {
            return;
        };
        let pg_re = Regex::new(r"<w:pgSz[^>]*/>").expect("page size pattern is static");
        let (w, h) = A4_TWIPS;
        let updated = pg_re
            .replace_all(doc, format!(r#"<w:pgSz w:w="{w}" w:h="{h}"/>"#).as_str())
            .into_owned();
        pkg.set_text(&self.conventions.main_part, updated);
    }
}

/// The grid the table stage works with: present only when the form both
/// enables the table and supplies a non-empty model.
fn effective_grid(form: &LetterForm) -> Option<&TableModel> {
    if !form.use_table {
        return None;
    }
    form.table.as_ref().filter(|t| !t.is_empty())
}
