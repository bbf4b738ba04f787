//! Delimited-text output options.

/// Line terminator written after each serialized row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineTerminator {
    /// `\r\n`, as RFC 4180 prescribes
    #[default]
    CrLf,
    /// `\n`
    Lf,
}

impl LineTerminator {
    /// The terminator text.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::CrLf => "\r\n",
            LineTerminator::Lf => "\n",
        }
    }
}

/// Options for serializing tables.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter
    pub delimiter: u8,

    /// Terminator used when writing lines to a file
    pub line_terminator: LineTerminator,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            line_terminator: LineTerminator::CrLf,
        }
    }
}

impl CsvOptions {
    /// Create new CSV options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the line terminator.
    pub fn with_line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.line_terminator = terminator;
        self
    }
}
