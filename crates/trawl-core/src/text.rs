//! Text coordinates shared by the search and cache crates.

pub use text_size::{TextRange, TextSize};

/// Zero-based line and byte column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Editor position: zero-based line and UTF-16 code unit column.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range of editor positions.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Line layout of one text snapshot.
///
/// `\n`, `\r\n` and a lone `\r` all end a line. Each line's span excludes its terminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineIndex {
    lines: Vec<TextRange>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0usize;
        let mut bytes = text.bytes().enumerate().peekable();
        while let Some((at, byte)) = bytes.next() {
            let terminator_len = match byte {
                b'\n' => 1,
                b'\r' if bytes.peek().is_some_and(|&(_, next)| next == b'\n') => {
                    bytes.next();
                    2
                }
                b'\r' => 1,
                _ => continue,
            };
            lines.push(span(start, at));
            start = at + terminator_len;
        }
        lines.push(span(start, text.len()));

        Self {
            lines,
            len: TextSize::of(text),
        }
    }

    #[inline]
    pub fn len(&self) -> TextSize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == TextSize::from(0)
    }

    #[inline]
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Span of `line` without its terminator.
    #[inline]
    pub fn line_span(&self, line: u32) -> Option<TextRange> {
        self.lines.get(line as usize).copied()
    }

    /// Line containing `offset`. Offsets past the end belong to the last line, offsets inside
    /// a terminator to the line it ends.
    pub fn line_of(&self, offset: TextSize) -> u32 {
        let offset = offset.min(self.len);
        let after = self.lines.partition_point(|line| line.start() <= offset);
        after.saturating_sub(1) as u32
    }

    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let line = self.line_of(offset);
        let span = self.lines[line as usize];
        LineCol {
            line,
            col: u32::from(offset.clamp(span.start(), span.end()) - span.start()),
        }
    }

    /// Editor position of `offset`. `text` must be the snapshot this index was built from.
    pub fn position(&self, text: &str, offset: TextSize) -> Position {
        debug_assert_eq!(TextSize::of(text), self.len);
        let LineCol { line, col } = self.line_col(offset);
        let start = usize::from(self.lines[line as usize].start());
        let character = text
            .get(start..start + col as usize)
            .map_or(0, |prefix| prefix.encode_utf16().count() as u32);
        Position { line, character }
    }

    pub fn range(&self, text: &str, range: TextRange) -> Range {
        Range::new(
            self.position(text, range.start()),
            self.position(text, range.end()),
        )
    }

    /// The line containing `offset`, without its terminator.
    pub fn line_text<'a>(&self, text: &'a str, offset: TextSize) -> &'a str {
        let span = self.lines[self.line_of(offset) as usize];
        text.get(std::ops::Range::<usize>::from(span)).unwrap_or("")
    }
}

fn span(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32))
}
