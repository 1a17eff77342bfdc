use std::ops::Range as ByteRange;

use trawl_core::{FileId, LineIndex, Range, TextRange, TextSize};

/// A syntax node reported by the resolver's in-file traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedNode {
    pub range: TextRange,
    /// The node's name token, if it has one (the `Bar` of `Foo.Bar`).
    pub identifier: Option<TextRange>,
}

impl MatchedNode {
    pub fn new(range: TextRange) -> Self {
        Self {
            range,
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: TextRange) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Range a reference should cover: the identifier when present, else the whole node.
    pub fn reference_range(&self) -> TextRange {
        self.identifier.unwrap_or(self.range)
    }
}

/// Where a reference sits, in editor coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRegion {
    pub file: FileId,
    pub range: Range,
}

/// Display text for one reference: its line plus the highlighted part of that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub line: String,
    /// Byte range of the reference within `line`.
    pub highlight: ByteRange<usize>,
}

/// Builds the display text shown next to each reference.
pub trait PreviewBuilder: Send + Sync {
    fn build(&self, file: &FileId, text: &str, line_index: &LineIndex, range: TextRange) -> Preview;
}

/// Shows the reference's line with the reference highlighted, clipped to that line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinePreviewBuilder;

impl PreviewBuilder for LinePreviewBuilder {
    fn build(&self, _file: &FileId, text: &str, line_index: &LineIndex, range: TextRange) -> Preview {
        let line = line_index.line_text(text, range.start());
        let line_start = line_index
            .line_span(line_index.line_of(range.start()))
            .map_or(0, |span| u32::from(span.start()));
        let start = ((u32::from(range.start()) - line_start) as usize).min(line.len());
        let end = ((u32::from(range.end()) - line_start) as usize).min(line.len());
        Preview {
            line: line.to_string(),
            highlight: start..end.max(start),
        }
    }
}

/// One matched occurrence of the searched symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference<R> {
    region: SourceRegion,
    resolution: R,
    offset: TextSize,
    length: TextSize,
    preview: Preview,
}

impl<R> Reference<R> {
    pub fn new(
        region: SourceRegion,
        resolution: R,
        offset: TextSize,
        length: TextSize,
        preview: Preview,
    ) -> Self {
        Self {
            region,
            resolution,
            offset,
            length,
            preview,
        }
    }

    pub fn region(&self) -> &SourceRegion {
        &self.region
    }

    pub fn file(&self) -> &FileId {
        &self.region.file
    }

    pub fn resolution(&self) -> &R {
        &self.resolution
    }

    /// Byte offset of the reference in the file's text.
    pub fn offset(&self) -> TextSize {
        self.offset
    }

    /// Length in bytes.
    pub fn length(&self) -> TextSize {
        self.length
    }

    pub fn text_range(&self) -> TextRange {
        TextRange::at(self.offset, self.length)
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }
}

/// All references found in one file, ordered by position. Delivered whole, never in parts.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchedFile<R> {
    file: FileId,
    references: Vec<Reference<R>>,
}

impl<R> SearchedFile<R> {
    pub(crate) fn new(file: FileId, mut references: Vec<Reference<R>>) -> Self {
        references.sort_by_key(|reference| reference.offset);
        Self { file, references }
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn references(&self) -> &[Reference<R>] {
        &self.references
    }

    pub fn into_references(self) -> Vec<Reference<R>> {
        self.references
    }
}
