use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

use crate::common::source::Source;

/// A `Span` refers to a section of a source, much like a `&str`, but
/// carrying a reference to its `Source` rather than to a `String`. Spans
/// are attached to tokens, syntax-tree nodes, and errors, so that any of
/// them can be pointed out in the original text.
#[derive(Clone, Eq, PartialEq)]
pub struct Span {
    source: Rc<Source>,
    offset: usize,
    length: usize,
}

impl Span {
    /// Creates a new `Span` from a byte offset and a length.
    pub fn new(source: &Rc<Source>, offset: usize, length: usize) -> Span {
        Span {
            source: Rc::clone(source),
            offset,
            length,
        }
    }

    /// A zero-length `Span` pointing at a specific offset.
    pub fn point(source: &Rc<Source>, offset: usize) -> Span {
        Span::new(source, offset, 0)
    }

    /// The index one past the end of the `Span`.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Creates a new `Span` covering both of the spans passed in.
    /// ```plain
    /// hello this is cool
    /// ^^^^^              | Span a
    ///            ^^      | Span b
    /// ^^^^^^^^^^^^^      | combined
    /// ```
    pub fn combine(a: &Span, b: &Span) -> Span {
        if a.source != b.source {
            panic!("Can't combine two Spans with separate sources");
        }

        let offset = a.offset.min(b.offset);
        let end = a.end().max(b.end());

        Span::new(&a.source, offset, end - offset)
    }

    /// The text the `Span` refers to.
    pub fn contents(&self) -> String {
        self.source.contents[self.offset..self.end()].to_string()
    }

    /// The zero-indexed line the `Span` starts on.
    pub fn line(&self) -> usize {
        self.source.contents[..self.offset].matches('\n').count()
    }

    /// The zero-indexed column the `Span` starts at.
    pub fn col(&self) -> usize {
        self.source.contents[..self.offset]
            .rsplit('\n')
            .next()
            .unwrap_or("")
            .chars()
            .count()
    }

    pub fn path(&self) -> String {
        self.source.path.to_string_lossy().to_string()
    }

    /// The full lines of source the span touches, for error rendering.
    fn lines(&self) -> Vec<String> {
        let all: Vec<&str> = self.source.contents.split('\n').collect();
        let last = all.len().saturating_sub(1);
        let start = self.line().min(last);
        let end_offset = self.end().min(self.source.contents.len());
        let end = self.source.contents[..end_offset]
            .matches('\n')
            .count()
            .min(last);
        all[start..=end.max(start)].iter().map(|s| s.to_string()).collect()
    }

    pub fn format(&self) -> FormattedSpan {
        FormattedSpan {
            path: self.path(),
            start: self.line(),
            start_col: self.col(),
            length: self.length.max(1),
            lines: self.lines(),
        }
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("contents", &self.contents())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// A span located in its source and ready to be displayed:
/// the lines it touches, plus where in those lines it starts.
pub struct FormattedSpan {
    pub path: String,
    pub start: usize,
    pub start_col: usize,
    pub length: usize,
    pub lines: Vec<String>,
}

impl FormattedSpan {
    pub fn is_multiline(&self) -> bool {
        self.lines.len() != 1
    }

    fn gutter_padding(&self) -> usize {
        (self.start + self.lines.len()).to_string().len()
    }

    /// Number of carets under a single-line span.
    fn carets(&self) -> usize {
        let room = self.lines[0].len().saturating_sub(self.start_col);
        self.length.min(room).max(1)
    }
}

impl Display for FormattedSpan {
    /// Renders the span in gutter style:
    /// ```plain
    /// In ./source:1:5
    ///   |
    /// 1 | x = blatant error
    ///   |     ^^^^^^^^^^^^^
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "In {}:{}:{}",
            self.path,
            self.start + 1,
            self.start_col + 1
        )?;
        writeln!(f, "{} |", " ".repeat(self.gutter_padding()))?;

        if !self.is_multiline() {
            writeln!(f, "{} | {}", self.start + 1, self.lines[0])?;
            writeln!(
                f,
                "{} | {}{}",
                " ".repeat(self.gutter_padding()),
                " ".repeat(self.start_col),
                "^".repeat(self.carets()),
            )?;
        } else {
            for (index, line) in self.lines.iter().enumerate() {
                let line_no = (self.start + index + 1).to_string();
                let padding = " ".repeat(self.gutter_padding() - line_no.len());
                writeln!(f, "{}{} > {}", line_no, padding, line)?;
            }
        }

        Ok(())
    }
}

/// A wrapper that pairs an item with the `Span` it was produced from.
/// Tokens and syntax-tree nodes are passed around as `Spanned<T>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(item: T, span: Span) -> Spanned<T> {
        Spanned { item, span }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combination() {
        let source = Source::source("heck, that's awesome");
        let a = Span::new(&source, 0, 5);
        let b = Span::new(&source, 11, 2);

        assert_eq!(Span::combine(&a, &b), Span::new(&source, 0, 13));
    }

    #[test]
    fn line_and_col() {
        let source = Source::source("one\ntwo three");
        let span = Span::new(&source, 8, 5);

        assert_eq!(span.line(), 1);
        assert_eq!(span.col(), 4);
        assert_eq!(span.contents(), "three");
    }

    #[test]
    fn line_start_positions() {
        // a span at column 0 sits on its own line, not at the end of the
        // previous one
        let source = Source::source("x = 1\nboom");
        let span = Span::new(&source, 6, 4);

        assert_eq!(span.line(), 1);
        assert_eq!(span.col(), 0);
        assert_eq!(format!("{}", span.format()).lines().next(), Some("In ./source:2:1"));
    }

    #[test]
    fn empty() {
        let source = Source::source("");
        let span = Span::point(&source, 0);
        format!("{}", span);
    }
}
