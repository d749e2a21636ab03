//! Slide extraction: turns an uploaded presentation file into an ordered
//! sequence of slide records. Pure transformation: no database access here.

pub mod pptx;
pub mod text;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationFormat {
    Pptx,
    Text,
}

impl PresentationFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pptx" => Some(PresentationFormat::Pptx),
            "txt" | "md" => Some(PresentationFormat::Text),
            _ => None,
        }
    }
}

/// Coarse content classification of a slide, used by the assembler to put
/// title slides first and to describe candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Title,
    Content,
    Chart,
    Quote,
    Conclusion,
}

impl SlideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideKind::Title => "title",
            SlideKind::Content => "content",
            SlideKind::Chart => "chart",
            SlideKind::Quote => "quote",
            SlideKind::Conclusion => "conclusion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(SlideKind::Title),
            "content" => Some(SlideKind::Content),
            "chart" => Some(SlideKind::Chart),
            "quote" => Some(SlideKind::Quote),
            "conclusion" => Some(SlideKind::Conclusion),
            _ => None,
        }
    }

    /// Keyword classification over title and body text.
    pub fn classify(title: &str, body: &str) -> Self {
        let title = title.to_lowercase();
        let body = body.to_lowercase();

        if ["title", "agenda", "overview"].iter().any(|w| title.contains(w)) {
            SlideKind::Title
        } else if ["chart", "graph", "data", "statistics"]
            .iter()
            .any(|w| body.contains(w))
        {
            SlideKind::Chart
        } else if ["quote", "testimonial", "feedback"].iter().any(|w| body.contains(w)) {
            SlideKind::Quote
        } else if ["conclusion", "summary", "next steps"]
            .iter()
            .any(|w| body.contains(w))
        {
            SlideKind::Conclusion
        } else {
            SlideKind::Content
        }
    }
}

/// One extracted slide, before persistence.
#[derive(Debug, Clone)]
pub struct ExtractedSlide {
    /// Zero-based position within the source deck.
    pub ordinal: u32,
    pub title: String,
    pub body: String,
    /// Short human-readable layout summary (shape counts).
    pub layout: String,
    pub kind: SlideKind,
}

pub trait SlideExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<ExtractedSlide>, ExtractError>;
    fn supports(&self, format: PresentationFormat) -> bool;
}

/// Routes a file to the extractor that handles its format.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn SlideExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(pptx::PptxExtractor::new()),
                Box::new(text::TextExtractor::new()),
            ],
        }
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<ExtractedSlide>, ExtractError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = PresentationFormat::from_extension(extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(extension.to_string()))?;

        for extractor in &self.extractors {
            if extractor.supports(format) {
                let slides = extractor.extract(path)?;
                if slides.is_empty() {
                    return Err(ExtractError::Empty(path.to_path_buf()));
                }
                return Ok(slides);
            }
        }

        Err(ExtractError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
