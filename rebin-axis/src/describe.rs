use std::str::FromStr;

use crate::error::RebinError;

/// Options controlling the diagnostic dump produced by `describe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescribeOptions {
    /// Only summarize the base axis, skipping node and child details
    pub base_only: bool,
    /// Enumerate the grouped bins of every node
    pub ranges: bool,
    /// Indentation depth of the first line
    pub indent: usize,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            base_only: false,
            ranges: true,
            indent: 0,
        }
    }
}

impl DescribeOptions {
    pub fn base_only(mut self) -> Self {
        self.base_only = true;
        self
    }

    pub fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub(crate) fn nested(self) -> Self {
        self.with_indent(self.indent + 1)
    }

    pub(crate) fn pad(&self) -> String {
        "  ".repeat(self.indent)
    }
}

/// Parse a flag string such as `"base"` or `"noranges, base"`
impl FromStr for DescribeOptions {
    type Err = RebinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = Self::default();
        for flag in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
        {
            match flag.to_ascii_lowercase().as_str() {
                "base" => options.base_only = true,
                "noranges" => options.ranges = false,
                _ => return Err(RebinError::UnknownDescribeFlag(flag.to_string())),
            }
        }
        Ok(options)
    }
}
