//! Byte-preserving reference scanners.
//!
//! Discovery parses documents with a DOM; rewriting must not. These scanners
//! locate reference values as byte spans in the original text so a rewrite
//! only replaces the values it resolves and leaves everything else as-is.

pub mod css;
pub mod html;

use crate::canon::RefAttr;

/// A reference value found at `start..end` in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub start: usize,
    pub end: usize,
    pub value: String,
    pub attr: RefAttr,
}

impl Located {
    pub fn new(start: usize, end: usize, value: impl Into<String>, attr: RefAttr) -> Self {
        Self {
            start,
            end,
            value: value.into(),
            attr,
        }
    }

    fn shifted(mut self, offset: usize) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

/// Replace spans of `text`; spans must be sorted and non-overlapping.
pub fn splice(text: &str, replacements: &[(usize, usize, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, replacement) in replacements {
        if *start < cursor {
            continue;
        }
        out.push_str(&text[cursor..*start]);
        out.push_str(replacement);
        cursor = *end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice() {
        let text = "a url(x) b url(y)";
        let out = splice(text, &[(6, 7, "X1".into()), (15, 16, "Y1".into())]);
        assert_eq!(out, "a url(X1) b url(Y1)");
    }

    #[test]
    fn test_splice_skips_overlap() {
        let out = splice("abcdef", &[(1, 3, "X".into()), (2, 4, "Y".into())]);
        assert_eq!(out, "aXdef");
    }
}
