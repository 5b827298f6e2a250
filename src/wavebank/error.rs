use super::format::MiniFormatTag;
use thiserror::Error;

/// Broad classification of [`XwbError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A concrete structural violation. Always fatal.
    FormatValidation,
    /// The data is probably malformed but breaks no concrete rule.
    HeuristicSuspicion,
}

#[derive(Debug, Error)]
pub enum XwbError {
    #[error("Invalid magic: expected \"WBND\", got {0:02X?}")]
    InvalidMagic([u8; 4]),
    #[error("Field '{field}' must not be negative, got {value}")]
    NegativeValue { field: &'static str, value: i64 },
    #[error("Unknown codec tag {0}")]
    UnknownCodecTag(u32),
    #[error("Entry {index} uses codec {codec:?}, only PCM is supported")]
    UnsupportedCodec { index: usize, codec: MiniFormatTag },
    #[error("Unknown bits per sample flag {0}")]
    UnknownBitsPerSample(u32),
    #[error("Field '{field}' value {value} does not fit in {bits} bits")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        bits: u32,
    },
    #[error("Entry count is {entry_count}, but there are {streams} streams and {sounds} sounds")]
    EntryCountMismatch {
        entry_count: u32,
        streams: usize,
        sounds: usize,
    },
    #[error("Bank name is {0} bytes long, at most 64 bytes are allowed")]
    BankNameTooLong(usize),
    #[error("Bank name '{0}' contains non-ASCII characters")]
    NonAsciiBankName(String),
    #[error("Bank name is not valid UTF-8")]
    NonUtf8BankName,
    #[error("Entry {index} has no channels, its duration cannot be computed")]
    NoChannels { index: usize },
    #[error("Inconsistent offsets: {0}")]
    InconsistentOffsets(String),
    #[error("Unexpected end of data while reading the {0}")]
    Truncated(&'static str),
    #[error("Suspicious data: {0}")]
    HeuristicSuspicion(String),
}

impl XwbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XwbError::HeuristicSuspicion(_) => ErrorKind::HeuristicSuspicion,
            _ => ErrorKind::FormatValidation,
        }
    }

    pub fn inconsistent_offsets<S: Into<String>>(message: S) -> Self {
        XwbError::InconsistentOffsets(message.into())
    }
}

/// Turns an out-of-bounds read or seek inside `stage` into [`XwbError::Truncated`].
///
/// Other errors pass through untouched.
pub(crate) fn truncated(stage: &'static str) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
    move |err| {
        let out_of_bounds = err.chain().any(|cause| {
            cause.downcast_ref::<std::io::Error>().is_some_and(|e| {
                matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidInput
                )
            })
        });
        if out_of_bounds {
            XwbError::Truncated(stage).into()
        } else {
            err
        }
    }
}

/// Converts a signed on-disk value into an unsigned one.
pub(crate) fn non_negative(field: &'static str, value: i32) -> Result<u32, XwbError> {
    u32::try_from(value).map_err(|_| XwbError::NegativeValue {
        field,
        value: value as i64,
    })
}
