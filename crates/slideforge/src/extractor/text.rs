//! Plain-text slide extraction. Decks arrive as blocks separated by `---`
//! lines; the first non-empty line of a block is its title.

use std::path::Path;

use crate::error::ExtractError;
use crate::extractor::{ExtractedSlide, PresentationFormat, SlideExtractor, SlideKind};

pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedSlide>, ExtractError> {
        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::ReadSource {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut slides = Vec::new();
        for block in content.split('\n').collect::<Vec<_>>().split(|l| l.trim() == "---") {
            let lines: Vec<&str> = block
                .iter()
                .map(|l| l.trim_end())
                .skip_while(|l| l.is_empty())
                .collect();
            if lines.iter().all(|l| l.is_empty()) {
                continue;
            }

            let title = lines.first().copied().unwrap_or("").trim().to_string();
            let body = lines
                .iter()
                .skip(1)
                .copied()
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();

            let kind = SlideKind::classify(&title, &body);
            slides.push(ExtractedSlide {
                ordinal: slides.len() as u32,
                title,
                body,
                layout: format!("{} lines", lines.len()),
                kind,
            });
        }

        Ok(slides)
    }

    fn supports(&self, format: PresentationFormat) -> bool {
        matches!(format, PresentationFormat::Text)
    }
}
