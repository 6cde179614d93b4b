use serde::{Deserialize, Serialize};

/// Source region in line/column coordinates. Lines and columns are 1-based,
/// the end column is the column of the last character (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self { start_line, start_column, end_line, end_column }
    }

    /// Span starting where `self` starts and ending where `end` ends.
    pub fn to(&self, end: Span) -> Span {
        Span {
            start_line: self.start_line,
            start_column: self.start_column,
            end_line: end.end_line,
            end_column: end.end_column,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Span::default()
    }

    /// True when `other` lies completely inside `self`.
    pub fn encloses(&self, other: &Span) -> bool {
        if other.is_empty() {
            return true;
        }
        (self.start_line, self.start_column) <= (other.start_line, other.start_column)
            && (other.end_line, other.end_column) <= (self.end_line, self.end_column)
    }

    pub fn contains(&self, line: u32, column: u32) -> bool {
        (self.start_line, self.start_column) <= (line, column)
            && (line, column) <= (self.end_line, self.end_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encloses_nested_regions() {
        let outer = Span::new(1, 1, 4, 2);
        assert!(outer.encloses(&Span::new(2, 5, 3, 1)));
        assert!(outer.encloses(&outer));
        assert!(!outer.encloses(&Span::new(4, 1, 4, 3)));
    }
}
