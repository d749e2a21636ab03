//! PPTX slide extraction via zip + quick-xml.
//!
//! Slide order comes from `ppt/_rels/presentation.xml.rels`; per-slide text
//! comes from the `a:t` runs inside each shape. A shape whose placeholder is
//! typed `title`/`ctrTitle` supplies the slide title.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::ExtractError;
use crate::extractor::{ExtractedSlide, PresentationFormat, SlideExtractor, SlideKind};

pub struct PptxExtractor;

impl PptxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PptxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideExtractor for PptxExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedSlide>, ExtractError> {
        let _span = tracing::info_span!("extractor.pptx").entered();

        let file = std::fs::File::open(path).map_err(|e| ExtractError::ReadSource {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = ZipArchive::new(file)
            .map_err(|e| ExtractError::PptxProcessing(format!("Failed to open PPTX: {}", e)))?;

        let slide_paths = slide_order(&mut archive)?;

        let mut slides = Vec::with_capacity(slide_paths.len());
        for (ordinal, slide_path) in slide_paths.iter().enumerate() {
            let xml = read_archive_file(&mut archive, slide_path)?;
            let parsed = parse_slide_xml(&xml)?;
            let kind = SlideKind::classify(&parsed.title, &parsed.body);
            slides.push(ExtractedSlide {
                ordinal: ordinal as u32,
                title: parsed.title,
                body: parsed.body,
                layout: parsed.layout,
                kind,
            });
        }

        Ok(slides)
    }

    fn supports(&self, format: PresentationFormat) -> bool {
        matches!(format, PresentationFormat::Pptx)
    }
}

/// Ordered slide part paths from the presentation relationships.
fn slide_order<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<String>, ExtractError> {
    let rels = read_archive_file(archive, "ppt/_rels/presentation.xml.rels")?;

    let mut reader = Reader::from_str(&rels);
    reader.config_mut().trim_text(true);

    let mut slides: Vec<(String, Option<usize>)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                if rel_type.ends_with("/slide") {
                    let order = trailing_number(&id).or_else(|| trailing_number(&target));
                    let full_path = if let Some(stripped) = target.strip_prefix('/') {
                        stripped.to_string()
                    } else {
                        format!("ppt/{}", target)
                    };
                    slides.push((full_path, order));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::XmlParsing(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(path, _)| path).collect())
}

struct ParsedSlide {
    title: String,
    body: String,
    layout: String,
}

/// Pulls title, body text and a layout summary from one slide part.
fn parse_slide_xml(xml: &str) -> Result<ParsedSlide, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut title = String::new();
    let mut body_parts: Vec<String> = Vec::new();

    let mut shape_count = 0u32;
    let mut picture_count = 0u32;
    let mut in_shape = false;
    let mut shape_is_title = false;
    let mut in_text = false;
    let mut shape_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"sp" => {
                    in_shape = true;
                    shape_is_title = false;
                    shape_text.clear();
                    shape_count += 1;
                }
                b"pic" => picture_count += 1,
                b"ph" if in_shape => {
                    shape_is_title |= placeholder_is_title(e);
                }
                b"t" if in_shape => in_text = true,
                b"p" if in_shape && !shape_text.is_empty() => shape_text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"ph" && in_shape {
                    shape_is_title |= placeholder_is_title(e);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    let decoded = e.unescape().unwrap_or_default();
                    shape_text.push_str(&decoded);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"sp" => {
                    let text = shape_text.trim().to_string();
                    if !text.is_empty() {
                        if shape_is_title && title.is_empty() {
                            title = text;
                        } else {
                            body_parts.push(text);
                        }
                    }
                    in_shape = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::XmlParsing(format!("Slide XML error: {}", e)));
            }
            _ => {}
        }
    }

    // No typed title placeholder: fall back to the first short text block.
    if title.is_empty() {
        if let Some(first) = body_parts.first() {
            if first.len() <= 120 && !first.contains('\n') {
                title = body_parts.remove(0);
            }
        }
    }

    let layout = format!("{} shapes, {} pictures", shape_count, picture_count);

    Ok(ParsedSlide {
        title,
        body: body_parts.join("\n"),
        layout,
    })
}

fn placeholder_is_title(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.as_ref() == b"type"
            && matches!(attr.value.as_ref(), b"title" | b"ctrTitle")
    })
}

fn read_archive_file<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String, ExtractError> {
    let mut file = archive.by_name(path).map_err(|e| {
        ExtractError::PptxProcessing(format!("Missing archive entry '{}': {}", path, e))
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content).map_err(|e| {
        ExtractError::PptxProcessing(format!("Failed to read '{}': {}", path, e))
    })?;

    Ok(content)
}

/// Extracts a trailing number from strings like "rId2" or "slide3.xml".
fn trailing_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml");
    let digits: String = s
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
