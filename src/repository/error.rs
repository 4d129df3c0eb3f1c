//! Error handling for the `repository` module.
//!
//! Parsing an object can fail for three reasons. The encoding may not have
//! the shape required for the object ([`StructuralError`]), the values may
//! be well-formed but not acceptable ([`SemanticError`]), or something
//! outside the content proper is wrong, such as the signed envelope or the
//! validity period. All of these end up in a [`ParseError`].
//!
//! Objects that are sent across a process boundary can fail to decode with
//! a [`TransportError`].

use std::{error, fmt};
use std::convert::Infallible;
use bcder::Tag;
use bcder::decode::DecodeError;
use super::elements::ElementKind;
use super::x509::{MalformedTime, Time};


//------------ StructuralError -----------------------------------------------

/// The encoded object does not have the required shape.
#[derive(Debug)]
pub struct StructuralError {
    /// The name of the field that was being parsed, if known.
    context: Option<&'static str>,

    /// What exactly went wrong.
    kind: StructuralErrorKind,
}

#[derive(Debug)]
enum StructuralErrorKind {
    /// The data is not a valid DER encoding.
    Decoding(DecodeError<Infallible>),

    /// There is data after the end of the outer value.
    TrailingData { len: usize },

    /// A sequence has the wrong number of elements.
    ElementCount { allowed: &'static [usize], found: usize },

    /// A sequence ended before the requested position.
    MissingElement { position: usize },

    /// An element has the wrong type.
    UnexpectedElement {
        position: usize,
        expected: ElementKind,
        found: Tag,
        constructed: bool,
    },

    /// An element has the right tag but its content is not valid DER.
    BadEncoding {
        position: usize,
        kind: ElementKind,
        err: DecodeError<Infallible>,
    },

    /// An element has the right type but an unusable value.
    BadValue {
        position: usize,
        kind: ElementKind,
        reason: &'static str,
    },
}

impl StructuralError {
    pub(crate) fn decoding(err: DecodeError<Infallible>) -> Self {
        StructuralErrorKind::Decoding(err).into()
    }

    pub(crate) fn trailing_data(len: usize) -> Self {
        StructuralErrorKind::TrailingData { len }.into()
    }

    pub(crate) fn element_count(
        allowed: &'static [usize], found: usize
    ) -> Self {
        StructuralErrorKind::ElementCount { allowed, found }.into()
    }

    pub(crate) fn missing_element(position: usize) -> Self {
        StructuralErrorKind::MissingElement { position }.into()
    }

    pub(crate) fn unexpected_element(
        position: usize, expected: ElementKind, found: Tag, constructed: bool
    ) -> Self {
        StructuralErrorKind::UnexpectedElement {
            position, expected, found, constructed
        }.into()
    }

    pub(crate) fn bad_encoding(
        position: usize, kind: ElementKind, err: DecodeError<Infallible>
    ) -> Self {
        StructuralErrorKind::BadEncoding { position, kind, err }.into()
    }

    pub(crate) fn bad_value(
        position: usize, kind: ElementKind, reason: &'static str
    ) -> Self {
        StructuralErrorKind::BadValue { position, kind, reason }.into()
    }

    /// Attaches the name of the field being parsed.
    ///
    /// If the error already has a context, the inner one is kept since it
    /// is the more specific one.
    pub(crate) fn context(mut self, context: &'static str) -> Self {
        if self.context.is_none() {
            self.context = Some(context)
        }
        self
    }

    /// Returns the position of the offending element if there is one.
    pub fn position(&self) -> Option<usize> {
        match self.kind {
            StructuralErrorKind::Decoding(_) => None,
            StructuralErrorKind::TrailingData { .. } => None,
            StructuralErrorKind::ElementCount { .. } => None,
            StructuralErrorKind::MissingElement { position } => {
                Some(position)
            }
            StructuralErrorKind::UnexpectedElement { position, .. } => {
                Some(position)
            }
            StructuralErrorKind::BadEncoding { position, .. } => {
                Some(position)
            }
            StructuralErrorKind::BadValue { position, .. } => Some(position),
        }
    }

    /// Returns the field name the error occured in if known.
    pub fn field(&self) -> Option<&'static str> {
        self.context
    }
}

impl From<StructuralErrorKind> for StructuralError {
    fn from(kind: StructuralErrorKind) -> Self {
        StructuralError { context: None, kind }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(context) = self.context {
            write!(f, "{}: ", context)?;
        }
        match self.kind {
            StructuralErrorKind::Decoding(ref err) => {
                write!(f, "failed ASN.1 parse: {}", err)
            }
            StructuralErrorKind::TrailingData { len } => {
                write!(f, "{} octets of trailing data", len)
            }
            StructuralErrorKind::ElementCount { allowed, found } => {
                f.write_str("want ")?;
                for (idx, count) in allowed.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{}", count)?;
                }
                write!(f, " elements, have {}", found)
            }
            StructuralErrorKind::MissingElement { position } => {
                write!(f, "missing element at position {}", position)
            }
            StructuralErrorKind::UnexpectedElement {
                position, expected, found, constructed
            } => {
                write!(
                    f, "want ASN.1 {} at position {}, have {} {}",
                    expected, position,
                    if constructed { "constructed" } else { "primitive" },
                    found
                )
            }
            StructuralErrorKind::BadEncoding { position, kind, ref err } => {
                write!(
                    f, "invalid ASN.1 {} at position {}: {}",
                    kind, position, err
                )
            }
            StructuralErrorKind::BadValue { position, kind, reason } => {
                write!(
                    f, "invalid ASN.1 {} at position {}: {}",
                    kind, position, reason
                )
            }
        }
    }
}

impl error::Error for StructuralError { }


//------------ SemanticError -------------------------------------------------

/// A well-formed value is not acceptable.
#[derive(Clone, Debug)]
pub enum SemanticError {
    /// An explicit content version was present.
    ///
    /// No version other than the default exists yet and the default must
    /// not be encoded in DER.
    UnsupportedVersion(i64),

    /// The manifest number is negative.
    NegativeManifestNumber,

    /// The manifest number has more than 20 octets.
    ManifestNumberTooLong(usize),

    /// The file hash algorithm is not SHA-256.
    BadHashAlgorithm(String),

    /// A file name is not plain ASCII.
    FileNameNotAscii,

    /// A file name contains a path separator or a NUL character.
    FileNameNotPlain(String),

    /// A file name is too short to have a suffix.
    FileNameTooShort(String),

    /// A file hash is not exactly 32 octets long.
    BadHashLength(usize),

    /// The validity window is malformed or inverted.
    Time(MalformedTime),

    /// The AS number of a ROA is outside the 32 bit range.
    AsIdOutOfRange,

    /// A ROA address family is not IPv4 or IPv6.
    BadAddressFamily,

    /// A ROA address family appears more than once.
    DuplicateAddressFamily,

    /// A ROA contains no address family or an empty one.
    EmptyAddressBlocks,

    /// A ROA prefix is longer than its address family allows.
    BadPrefixLength(usize),

    /// A ROA max length is outside the permitted range.
    ///
    /// The max length is `None` if it doesn’t even fit into a `u32`.
    BadMaxLength { prefix_len: u8, max_length: Option<u32> },
}

impl From<MalformedTime> for SemanticError {
    fn from(err: MalformedTime) -> Self {
        SemanticError::Time(err)
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::SemanticError::*;

        match *self {
            UnsupportedVersion(0) => {
                f.write_str("incorrect encoding for version 0")
            }
            UnsupportedVersion(version) => {
                write!(f, "version {} not supported (yet)", version)
            }
            NegativeManifestNumber => {
                f.write_str(
                    "manifestNumber: want positive integer, have negative"
                )
            }
            ManifestNumberTooLong(len) => {
                write!(
                    f,
                    "manifestNumber: want 20 or less octets, have {}",
                    len
                )
            }
            BadHashAlgorithm(ref oid) => {
                write!(f, "fileHashAlg: want SHA256 object, have {}", oid)
            }
            FileNameNotAscii => {
                f.write_str("file name is not an ASCII string")
            }
            FileNameNotPlain(ref name) => {
                write!(f, "path components disallowed in filename: {}", name)
            }
            FileNameTooShort(ref name) => {
                write!(
                    f, "filename must be large enough for suffix part: {}",
                    name
                )
            }
            BadHashLength(len) => {
                write!(f, "hash: invalid SHA256 length, have {}", len)
            }
            Time(ref err) => err.fmt(f),
            AsIdOutOfRange => f.write_str("asID: out of range"),
            BadAddressFamily => {
                f.write_str("addressFamily: want IPv4 or IPv6")
            }
            DuplicateAddressFamily => {
                f.write_str("multiple blocks for one address family")
            }
            EmptyAddressBlocks => f.write_str("no prefixes in ROA"),
            BadPrefixLength(len) => {
                write!(f, "prefix length {} too large for family", len)
            }
            BadMaxLength { prefix_len, max_length: Some(max_length) } => {
                write!(
                    f, "max length {} invalid for prefix length {}",
                    max_length, prefix_len
                )
            }
            BadMaxLength { prefix_len, max_length: None } => {
                write!(
                    f, "max length out of range for prefix length {}",
                    prefix_len
                )
            }
        }
    }
}

impl error::Error for SemanticError { }


//------------ ParseError ----------------------------------------------------

/// Parsing a signed object failed.
///
/// No object is ever produced alongside this error. A stale manifest is not
/// an error: it is returned as a manifest marked stale.
#[derive(Debug)]
pub enum ParseError {
    /// The signed envelope could not be unwrapped.
    Cms(String),

    /// The EE certificate lacks a required extension.
    MissingExtension(&'static str),

    /// The content does not have the required shape.
    Structural(StructuralError),

    /// The content contains unacceptable values.
    Semantic(SemanticError),

    /// The object only becomes valid at the given time.
    NotYetValid(Time),
}

impl From<StructuralError> for ParseError {
    fn from(err: StructuralError) -> Self {
        ParseError::Structural(err)
    }
}

impl From<SemanticError> for ParseError {
    fn from(err: SemanticError) -> Self {
        ParseError::Semantic(err)
    }
}

impl From<MalformedTime> for ParseError {
    fn from(err: MalformedTime) -> Self {
        ParseError::Semantic(err.into())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::Cms(ref err) => {
                write!(f, "invalid signed object: {}", err)
            }
            ParseError::MissingExtension(ext) => {
                write!(f, "missing {} X509 extension", ext)
            }
            ParseError::Structural(ref err) => err.fmt(f),
            ParseError::Semantic(ref err) => err.fmt(f),
            ParseError::NotYetValid(time) => {
                write!(f, "not yet valid, starts {}", time)
            }
        }
    }
}

impl error::Error for ParseError { }


//------------ TransportError ------------------------------------------------

/// An object could not be decoded from its transfer encoding.
#[derive(Clone, Debug)]
pub struct TransportError(TransportErrorKind);

#[derive(Clone, Debug)]
enum TransportErrorKind {
    Truncated { needed: u64, remaining: usize },
    BadFlag(i32),
    BadString,
    BadTime(i64),
    BadValue(&'static str),
    TrailingData(usize),
}

impl TransportError {
    pub(crate) fn truncated(needed: u64, remaining: usize) -> Self {
        TransportError(TransportErrorKind::Truncated { needed, remaining })
    }

    pub(crate) fn bad_flag(flag: i32) -> Self {
        TransportError(TransportErrorKind::BadFlag(flag))
    }

    pub(crate) fn bad_string() -> Self {
        TransportError(TransportErrorKind::BadString)
    }

    pub(crate) fn bad_time(secs: i64) -> Self {
        TransportError(TransportErrorKind::BadTime(secs))
    }

    pub(crate) fn bad_value(reason: &'static str) -> Self {
        TransportError(TransportErrorKind::BadValue(reason))
    }

    pub(crate) fn trailing_data(len: usize) -> Self {
        TransportError(TransportErrorKind::TrailingData(len))
    }

    /// Returns whether the error was caused by running out of data.
    pub fn is_truncated(&self) -> bool {
        matches!(self.0, TransportErrorKind::Truncated { .. })
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            TransportErrorKind::Truncated { needed, remaining } => {
                write!(
                    f, "truncated data: need {} octets, have {}",
                    needed, remaining
                )
            }
            TransportErrorKind::BadFlag(flag) => {
                write!(f, "invalid flag value {}", flag)
            }
            TransportErrorKind::BadString => {
                f.write_str("string is not valid UTF-8")
            }
            TransportErrorKind::BadTime(secs) => {
                write!(f, "invalid time value {}", secs)
            }
            TransportErrorKind::BadValue(reason) => f.write_str(reason),
            TransportErrorKind::TrailingData(len) => {
                write!(f, "{} octets of trailing data", len)
            }
        }
    }
}

impl error::Error for TransportError { }
