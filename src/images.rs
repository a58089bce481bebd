//! Media slot replacement and page-appended images.
//!
//! Appending an image touches three identifier spaces at once: the
//! owning part's relationship ids, the media filename namespace, and the
//! drawing markup referencing both. New ids are allocated strictly above
//! the current maxima, so re-running against a fresh template always
//! starts from the same allocation.

use std::io::Cursor;

use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::conventions::TemplateConventions;
use crate::model::AppendedImage;
use crate::package::TemplatePackage;
use crate::xmlutil::escape_xml;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Overwrites the two fixed logo media slots in place. The slots already
/// exist in the template, so no relationship changes are needed.
pub(crate) fn apply_logo(
    pkg: &mut TemplatePackage,
    logo: &[u8],
    conventions: &TemplateConventions,
) {
    for slot in [&conventions.watermark_part, &conventions.header_logo_part] {
        if pkg.contains(slot) {
            pkg.set_binary(slot, logo.to_vec());
            info!(part = %slot, bytes = logo.len(), "replaced logo media slot");
        } else {
            warn!(part = %slot, "logo media slot missing from template");
        }
    }
}

/// Appends each image as a new page: a forced page break followed by an
/// aspect-fitted inline drawing, inserted immediately before the final
/// section properties of the main document part.
pub(crate) fn append_images(
    pkg: &mut TemplatePackage,
    images: &[AppendedImage],
    conventions: &TemplateConventions,
) {
    if images.is_empty() {
        return;
    }

    let rels_part = TemplateConventions::rels_part_for(&conventions.main_part);
    if pkg.text(&rels_part).is_none() {
        warn!(part = %rels_part, "relationship table missing, cannot append images");
        return;
    }

    // Resolve the insertion point before touching the package, so a
    // degraded no-op leaves no orphaned media or relationships behind.
    let (mut doc, insert_at) = match pkg.text(&conventions.main_part) {
        Some(text) => {
            match text.rfind("<w:sectPr").or_else(|| text.rfind("</w:body>")) {
                Some(at) => (text.to_string(), at),
                None => {
                    warn!("main part has no section properties or body close, images not appended");
                    return;
                }
            }
        }
        None => return,
    };

    let mut next_rid = max_relationship_id(pkg, &conventions.main_part) + 1;
    let mut next_media = max_media_index(pkg) + 1;

    let mut drawings = String::new();
    for (i, img) in images.iter().enumerate() {
        let (px_w, px_h) = probe_dimensions(&img.data).unwrap_or_else(|| {
            warn!(index = i, "image dimensions unreadable, assuming defaults");
            conventions.assumed_image_px
        });
        let ext = sniff_extension(&img.data);
        let (cx, cy) = fit_emu(px_w, px_h, conventions);

        let rid = format!("rId{next_rid}");
        let media_part = format!("word/media/image{next_media}.{ext}");
        let target = format!("media/image{next_media}.{ext}");

        pkg.set_binary(&media_part, img.data.clone());
        add_relationship(pkg, &rels_part, &rid, &target);
        ensure_content_type_default(pkg, ext);

        let name = img
            .name
            .as_deref()
            .map(escape_xml)
            .unwrap_or_else(|| format!("Appended {}", i + 1));
        drawings.push_str(&page_image_xml(&rid, &name, 1000 + next_rid, cx, cy));
        debug!(%rid, part = %media_part, cx, cy, "appended image page");

        next_rid += 1;
        next_media += 1;
    }

    doc.insert_str(insert_at, &drawings);
    pkg.set_text(&conventions.main_part, doc);
    info!(count = images.len(), "appended image pages");
}

/// Highest numeric suffix among the part's `rIdN` relationship ids.
pub(crate) fn max_relationship_id(pkg: &TemplatePackage, part: &str) -> u32 {
    pkg.relationships(part)
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Highest numeric suffix among `word/media/imageN.*` parts.
fn max_media_index(pkg: &TemplatePackage) -> u32 {
    pkg.part_names()
        .filter_map(|name| {
            let rest = name.strip_prefix("word/media/image")?;
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        })
        .max()
        .unwrap_or(0)
}

fn add_relationship(pkg: &mut TemplatePackage, rels_part: &str, rid: &str, target: &str) {
    let Some(xml) = pkg.text(rels_part) else {
        return;
    };
    let entry = format!(r#"<Relationship Id="{rid}" Type="{IMAGE_REL_TYPE}" Target="{target}"/>"#);
    let updated = match xml.rfind("</Relationships>") {
        Some(at) => {
            let mut s = xml.to_string();
            s.insert_str(at, &entry);
            s
        }
        None => {
            warn!(part = %rels_part, "relationship table has no closing element");
            return;
        }
    };
    pkg.set_text(rels_part, updated);
}

/// Registers a `Default` content type for `ext` if the template does not
/// declare one; the desktop renderer refuses parts with unmapped
/// extensions.
fn ensure_content_type_default(pkg: &mut TemplatePackage, ext: &str) {
    const PART: &str = "[Content_Types].xml";
    let Some(xml) = pkg.text(PART) else {
        warn!("content types part missing");
        return;
    };
    if xml.contains(&format!(r#"Extension="{ext}""#)) {
        return;
    }
    let mime = match ext {
        "jpeg" => "image/jpeg",
        _ => "image/png",
    };
    let Some(at) = xml.rfind("</Types>") else {
        return;
    };
    let mut updated = xml.to_string();
    updated.insert_str(
        at,
        &format!(r#"<Default Extension="{ext}" ContentType="{mime}"/>"#),
    );
    pkg.set_text(PART, updated);
}

/// Reads only the image header for its pixel dimensions.
fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn sniff_extension(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "jpeg",
        _ => "png",
    }
}

/// Scales pixel dimensions to EMUs inside the printable area, preserving
/// aspect ratio and never upscaling.
pub(crate) fn fit_emu(px_w: u32, px_h: u32, conventions: &TemplateConventions) -> (u64, u64) {
    // 96 dpi: one pixel is 9525 EMUs.
    let native_w = u64::from(px_w.max(1)) * 9525;
    let native_h = u64::from(px_h.max(1)) * 9525;
    let scale = (conventions.printable_width_emu as f64 / native_w as f64)
        .min(conventions.printable_height_emu as f64 / native_h as f64)
        .min(1.0);
    (
        (native_w as f64 * scale).round() as u64,
        (native_h as f64 * scale).round() as u64,
    )
}

/// A forced page break followed by one inline drawing.
fn page_image_xml(rid: &str, name: &str, docpr_id: u32, cx: u64, cy: u64) -> String {
    format!(
        concat!(
            r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#,
            r#"<w:p><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" "#,
            r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill>"#,
            r#"<a:blip r:embed="{rid}" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        ),
        cx = cx,
        cy = cy,
        id = docpr_id,
        name = name,
        rid = rid
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    // 1x1 transparent PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9c, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn pkg_with_main(doc: &str) -> TemplatePackage {
        let rels = concat!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>"#,
            "</Relationships>"
        );
        let parts: [(&str, &[u8]); 3] = [
            ("word/document.xml", doc.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", TINY_PNG),
        ];
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, bytes) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        TemplatePackage::load(&bytes, &TemplateConventions::default()).unwrap()
    }

    #[test]
    fn missing_insertion_point_commits_nothing() {
        let mut pkg = pkg_with_main("<w:document><w:p/></w:document>");
        let images = [AppendedImage {
            data: TINY_PNG.to_vec(),
            name: None,
        }];
        append_images(&mut pkg, &images, &TemplateConventions::default());

        assert!(pkg.binary("word/media/image2.png").is_none());
        assert_eq!(pkg.relationships("word/document.xml").len(), 1);
        assert_eq!(
            pkg.text("word/document.xml"),
            Some("<w:document><w:p/></w:document>")
        );
    }

    #[test]
    fn images_land_before_section_properties() {
        let mut pkg =
            pkg_with_main("<w:document><w:body><w:p/><w:sectPr/></w:body></w:document>");
        let images = [AppendedImage {
            data: TINY_PNG.to_vec(),
            name: None,
        }];
        append_images(&mut pkg, &images, &TemplateConventions::default());

        assert!(pkg.binary("word/media/image2.png").is_some());
        let doc = pkg.text("word/document.xml").unwrap();
        assert!(doc.rfind("<w:drawing>").unwrap() < doc.rfind("<w:sectPr").unwrap());
    }

    #[test]
    fn tiny_image_is_not_upscaled() {
        let conv = TemplateConventions::default();
        let (cx, cy) = fit_emu(1, 1, &conv);
        assert_eq!((cx, cy), (9525, 9525));
    }

    #[test]
    fn large_image_fits_printable_width() {
        let conv = TemplateConventions::default();
        let (cx, cy) = fit_emu(2000, 1000, &conv);
        assert_eq!(cx, conv.printable_width_emu);
        assert_eq!(cy, conv.printable_width_emu / 2);
    }

    #[test]
    fn tall_image_fits_printable_height() {
        let conv = TemplateConventions::default();
        let (cx, cy) = fit_emu(1000, 10000, &conv);
        assert_eq!(cy, conv.printable_height_emu);
        assert!(cx < conv.printable_width_emu);
    }

    #[test]
    fn png_header_dimensions_are_probed() {
        assert_eq!(probe_dimensions(TINY_PNG), Some((1, 1)));
        assert_eq!(probe_dimensions(b"garbage"), None);
    }

    #[test]
    fn extension_sniffing_defaults_to_png() {
        assert_eq!(sniff_extension(TINY_PNG), "png");
        assert_eq!(sniff_extension(b"\xff\xd8\xff\xe0 jpeg header"), "jpeg");
        assert_eq!(sniff_extension(b"garbage"), "png");
    }
}
