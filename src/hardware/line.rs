//! Symbolic digital line names.
//!
//! The U6 labels its digital lines by port family and pin, e.g. `FIO0`,
//! `EIO3`, `CIO1`. Only the first character selects the family; the pin index
//! is whatever follows the three-character prefix.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a line name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineParseError {
    /// Name has no characters after the three-character prefix.
    #[error("'{0}' has no pin index after its three-character prefix")]
    MissingIndex(String),

    /// Characters after the prefix are not a decimal integer.
    #[error("'{name}' has a non-numeric pin index '{suffix}'")]
    InvalidIndex {
        /// Full name as given
        name: String,
        /// Text that failed to parse
        suffix: String,
    },

    /// Offset plus index does not fit a line number.
    #[error("'{0}' addresses a line number that is out of range")]
    Overflow(String),
}

/// Digital port family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortFamily {
    /// Flexible I/O, lines 0-7
    Fio,
    /// Extended I/O, lines start at 8
    Eio,
    /// Control I/O, lines start at 16
    Cio,
    /// Multiplexer I/O, lines start at 16
    Mio,
}

impl PortFamily {
    /// Select the family from the first character of a line name.
    ///
    /// Anything that is not `E`, `C` or `M` is treated as FIO.
    pub fn from_name(name: &str) -> Self {
        match name.chars().next() {
            Some('E') => PortFamily::Eio,
            Some('C') => PortFamily::Cio,
            Some('M') => PortFamily::Mio,
            _ => PortFamily::Fio,
        }
    }

    /// Line-number offset added to the pin index.
    pub fn offset(self) -> u32 {
        match self {
            PortFamily::Fio => 0,
            PortFamily::Eio => 8,
            PortFamily::Cio | PortFamily::Mio => 16,
        }
    }
}

/// A parsed digital line: the name the operator used and its physical number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigitalLine {
    name: String,
    family: PortFamily,
    index: u32,
    number: u32,
}

impl DigitalLine {
    /// Parse a line name such as `FIO0` or `EIO3`.
    pub fn parse(name: &str) -> Result<Self, LineParseError> {
        let suffix = name
            .get(3..)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LineParseError::MissingIndex(name.to_string()))?;

        let index: u32 = suffix
            .parse()
            .map_err(|_| LineParseError::InvalidIndex {
                name: name.to_string(),
                suffix: suffix.to_string(),
            })?;

        let family = PortFamily::from_name(name);
        let number = family
            .offset()
            .checked_add(index)
            .ok_or_else(|| LineParseError::Overflow(name.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            family,
            index,
            number,
        })
    }

    /// Name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port family.
    pub fn family(&self) -> PortFamily {
        self.family
    }

    /// Pin index within the family.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Physical line number (family offset + pin index).
    pub fn number(&self) -> u32 {
        self.number
    }
}

impl FromStr for DigitalLine {
    type Err = LineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DigitalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.name, self.number)
    }
}
