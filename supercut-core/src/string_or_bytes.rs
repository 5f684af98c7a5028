use std::{
    borrow::Cow,
    fmt::{Debug, Display},
};

/// Captured output of a child process. Kept as text when it is valid UTF-8.
#[derive(Clone, PartialEq, Eq)]
pub enum StringOrBytes {
    String(String),
    Bytes(Vec<u8>),
}

impl StringOrBytes {
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
        }
    }

    #[inline]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }

    /// The last `count` lines, which is where ffmpeg puts the reason it gave up.
    #[inline]
    pub fn tail(&self, count: usize) -> String {
        let text = self.to_string_lossy();
        let lines: Vec<&str> = text.lines().collect();
        lines[lines.len().saturating_sub(count)..].join("\n")
    }
}

impl Default for StringOrBytes {
    #[inline]
    fn default() -> Self {
        Self::String(String::new())
    }
}

impl Debug for StringOrBytes {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => {
                if f.alternate() {
                    f.write_str(&textwrap::indent(s, "        "))?;
                } else {
                    f.write_str(s)?;
                }
            },
            Self::Bytes(b) => write!(f, "{} raw bytes", b.len())?,
        }

        Ok(())
    }
}

impl Display for StringOrBytes {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<Vec<u8>> for StringOrBytes {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        match simdutf8::basic::from_utf8(&bytes) {
            Ok(text) => Self::String(text.to_owned()),
            Err(_) => Self::Bytes(bytes),
        }
    }
}

impl From<String> for StringOrBytes {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
