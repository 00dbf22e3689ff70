use alloc::string::String;

/// All errors that can occur while decoding SCXRD data files.
#[derive(Debug)]
pub enum Error {
    /// The buffer ends before a required header field.
    TruncatedHeader {
        /// Byte offset one past the end of the field that could not be read.
        needed: usize,
        /// Length of the buffer that was supplied.
        available: usize,
    },
    /// The text header does not describe a rodhypix file.
    InvalidFormat(&'static str),
    /// The image payload uses a compression scheme other than TY6.
    UnsupportedCompression(String),
    /// No bytes were supplied.
    EmptyInput,
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TruncatedHeader { needed, available } => write!(
                f,
                "truncated header: need {needed} bytes, buffer holds {available}"
            ),
            Error::InvalidFormat(what) => write!(f, "invalid rodhypix file: {what}"),
            Error::UnsupportedCompression(tag) => {
                write!(f, "unsupported compression: {tag:?}")
            }
            Error::EmptyInput => write!(f, "no binary data provided"),
            #[cfg(feature = "std")]
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Fail with [`Error::TruncatedHeader`] unless `buf` holds at least `needed` bytes.
pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        Err(Error::TruncatedHeader {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}
