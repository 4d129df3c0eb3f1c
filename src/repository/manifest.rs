//! RPKI Manifests.
//!
//! Manifests list all the files that are currently published by an RPKI CA.
//! They are defined in RFC 6486.
//!
//! This module defines the type [`Manifest`] that represents a parsed and
//! validated manifest, the type [`ManifestContent`] for the decoded content
//! alone, as well as some helper types for accessing the content.

use std::{error, fmt, io};
use std::path::Path;
use bcder::{encode, BitString, Captured, Integer, Mode, OctetString, Tag};
use bcder::captured::CapturedBuilder;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use log::{debug, warn};
use crate::oid;
use crate::crypto::{DigestAlgorithm, FileDigest};
use crate::util::hex;
use super::elements::{ElementKind, ElementSeq};
use super::error::{
    ParseError, SemanticError, StructuralError, TransportError
};
use super::sigobj::{check_version, CmsUnwrap, KeyIds};
use super::wire::{Composer, Parser};
use super::x509::{Time, ValidityOutcome, ValidityWindow};


//------------ Manifest ------------------------------------------------------

/// A parsed and validated RPKI manifest.
///
/// A manifest is only created by parsing a signed object whose content
/// passes all checks, or by decoding the transfer encoding of such a
/// manifest. It cannot be changed afterwards.
///
/// If the manifest’s nextUpdate time had passed when it was parsed, it is
/// marked as stale and its file list is empty.
///
/// When deserializing, the same checks as for the transfer encoding are
/// applied.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "ManifestFields")
)]
pub struct Manifest {
    /// The path the manifest was read from.
    source_path: String,

    /// The number of this manifest.
    ///
    /// These numbers are similar to the serial numbers of certificates.
    manifest_number: ManifestNumber,

    /// The thisUpdate and nextUpdate times.
    validity: ValidityWindow,

    /// Had nextUpdate passed at the time of parsing?
    stale: bool,

    /// The list of files in their original order.
    files: Vec<FileAndHash>,

    /// The subject key identifier of the EE certificate.
    ski: String,

    /// The authority key identifier of the EE certificate.
    aki: String,

    /// The CA issuers URI of the EE certificate.
    aia: Option<String>,
}

/// # Parsing
///
impl Manifest {
    /// Parses and validates a manifest.
    ///
    /// The signed object is read from `data` and unwrapped by `cms`.
    /// The `source_path` is kept with the manifest and used in log
    /// messages.
    pub fn parse<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C,
    ) -> Result<Self, ParseError> {
        Self::parse_at(data, source_path, cms, Time::now())
    }

    /// Parses and validates a manifest at the given time.
    pub fn parse_at<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C, now: Time,
    ) -> Result<Self, ParseError> {
        Self::parse_with_cert_at(data, source_path, cms, now).map(|res| {
            res.1
        })
    }

    /// Parses a manifest and also returns its EE certificate.
    ///
    /// If parsing fails, the certificate is dropped, too.
    pub fn parse_with_cert_at<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C, now: Time,
    ) -> Result<(C::Cert, Self), ParseError> {
        match Self::parse_inner(data, source_path, cms, now) {
            Ok(res) => {
                debug!(
                    "{}: manifest {} with {} files",
                    source_path, res.1.manifest_number, res.1.files.len()
                );
                Ok(res)
            }
            Err(err) => {
                warn!("{}: {}", source_path, err);
                Err(err)
            }
        }
    }

    fn parse_inner<C: CmsUnwrap>(
        data: &[u8], source_path: &str, cms: &C, now: Time,
    ) -> Result<(C::Cert, Self), ParseError> {
        let (cert, content) = cms.unwrap_content(
            data, &oid::CT_RPKI_MANIFEST
        ).map_err(|err| ParseError::Cms(err.to_string()))?.into_parts();
        let ids = KeyIds::from_cert(&cert).map_err(
            ParseError::MissingExtension
        )?;
        let head = ContentHead::decode(content)?;

        // A stale manifest is returned without looking at its file list.
        let (stale, files) = match head.validity.check_at(now) {
            ValidityOutcome::TooEarly => {
                return Err(ParseError::NotYetValid(
                    head.validity.this_update()
                ))
            }
            ValidityOutcome::Stale => {
                warn!(
                    "{}: manifest expired on {}",
                    source_path, head.validity.next_update()
                );
                (true, Vec::new())
            }
            ValidityOutcome::Current => (false, head.files()?),
        };
        Ok((cert, Manifest {
            source_path: source_path.into(),
            manifest_number: head.manifest_number,
            validity: head.validity,
            stale,
            files,
            ski: ids.ski,
            aki: ids.aki,
            aia: ids.aia,
        }))
    }
}

/// # Data Access
///
impl Manifest {
    /// Returns the path the manifest was read from.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn manifest_number(&self) -> ManifestNumber {
        self.manifest_number
    }

    pub fn validity(&self) -> ValidityWindow {
        self.validity
    }

    pub fn this_update(&self) -> Time {
        self.validity.this_update()
    }

    pub fn next_update(&self) -> Time {
        self.validity.next_update()
    }

    /// Returns whether the manifest was stale when parsed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns the file list in its original order.
    pub fn files(&self) -> &[FileAndHash] {
        &self.files
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileAndHash> + '_ {
        self.files.iter()
    }

    /// Returns the number of entries in the file list.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns whether the file list is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn subject_key_id(&self) -> &str {
        &self.ski
    }

    pub fn authority_key_id(&self) -> &str {
        &self.aki
    }

    pub fn authority_info_access(&self) -> Option<&str> {
        self.aia.as_deref()
    }
}

/// # Checking the Listed Files
///
impl Manifest {
    /// Checks the hashes of all listed files.
    ///
    /// The files are expected in `base_dir`, normally the directory the
    /// manifest itself is in. All files are checked even if some of them
    /// don’t match. If any file is missing or has a different hash, all
    /// these files are returned as the error.
    pub fn check_file_hashes(
        &self, base_dir: &Path
    ) -> Result<(), Vec<HashMismatch>> {
        self.check_file_hashes_with(base_dir, DigestAlgorithm::default())
    }

    /// Checks the hashes of all listed files using the given digester.
    pub fn check_file_hashes_with<D: FileDigest>(
        &self, base_dir: &Path, digester: D,
    ) -> Result<(), Vec<HashMismatch>> {
        let mut mismatches = Vec::new();
        for item in &self.files {
            let path = base_dir.join(&item.file);
            let actual = match digester.compute_digest(&path) {
                Ok(digest) => Some(ManifestHash::from_array(digest)),
                Err(err) => {
                    warn!(
                        "{}: cannot read {}: {}",
                        self.source_path, path.display(), err
                    );
                    None
                }
            };
            if actual != Some(item.hash) {
                warn!(
                    "{}: bad message digest for {}",
                    self.source_path, item.file
                );
                mismatches.push(HashMismatch {
                    file: item.file.clone(),
                    expected: item.hash,
                    actual,
                });
            }
        }
        if mismatches.is_empty() {
            Ok(())
        }
        else {
            Err(mismatches)
        }
    }
}

/// # Transfer Encoding
///
/// A manifest is sent between processes as the following fields:
///
/// ```txt
/// stale                   i32, 0 or 1
/// source_path             string
/// entry_count             u64
/// entries                 entry_count times:
///     file                string
///     hash                32 octets
/// authority_info_access   string, empty if absent
/// authority_key_id        string
/// subject_key_id          string
/// manifest_number         20 octets, big-endian
/// this_update             i64, seconds since the epoch
/// next_update             i64, seconds since the epoch
/// ```
///
/// See the [`wire`](super::wire) module for how fields are encoded.
impl Manifest {
    /// Returns the transfer encoding of the manifest.
    pub fn encode_wire(&self) -> Bytes {
        let mut target = Composer::new();
        target.put_bool(self.stale);
        target.put_str(&self.source_path);
        target.put_len(self.files.len());
        for item in &self.files {
            target.put_str(&item.file);
            target.put_fixed(item.hash.as_slice());
        }
        target.put_opt_str(self.aia.as_deref());
        target.put_str(&self.aki);
        target.put_str(&self.ski);
        target.put_fixed(&self.manifest_number.into_array());
        target.put_time(self.validity.this_update());
        target.put_time(self.validity.next_update());
        target.finish()
    }

    /// Decodes a manifest from its transfer encoding.
    ///
    /// The data must contain exactly one manifest. The file names are
    /// checked again so that a decoded manifest can never point outside
    /// its directory.
    pub fn decode_wire(data: Bytes) -> Result<Self, TransportError> {
        let mut parser = Parser::new(data);
        let stale = parser.get_bool()?;
        let source_path = parser.get_string()?;
        let count = parser.get_count(8 + ManifestHash::LEN)?;
        if stale && count > 0 {
            return Err(TransportError::bad_value("files in stale manifest"))
        }
        let mut files = Vec::with_capacity(count);
        for _ in 0..count {
            let file = parser.get_string()?;
            if check_file_name(&file).is_err() {
                return Err(TransportError::bad_value("invalid file name"))
            }
            let hash = ManifestHash(parser.get_array()?);
            files.push(FileAndHash { file, hash });
        }
        let aia = parser.get_opt_string()?;
        let aki = parser.get_string()?;
        let ski = parser.get_string()?;
        let manifest_number = ManifestNumber(parser.get_array()?);
        let validity = ValidityWindow::new(
            parser.get_time()?, parser.get_time()?
        ).map_err(|_| TransportError::bad_value("bad update interval"))?;
        parser.finish()?;
        let res = Manifest {
            source_path, manifest_number, validity, stale, files,
            ski, aki, aia
        };
        res.check()?;
        Ok(res)
    }

    /// Checks the invariants of a manifest not created by parsing.
    fn check(&self) -> Result<(), TransportError> {
        if self.stale && !self.files.is_empty() {
            return Err(TransportError::bad_value("files in stale manifest"))
        }
        if self.files.iter().any(|item| check_file_name(&item.file).is_err()) {
            return Err(TransportError::bad_value("invalid file name"))
        }
        if self.aki.is_empty() || self.ski.is_empty() {
            return Err(TransportError::bad_value("missing key identifier"))
        }
        if self.aia.as_deref() == Some("") {
            return Err(TransportError::bad_value("empty CA issuers URI"))
        }
        ValidityWindow::new(
            self.validity.this_update(), self.validity.next_update()
        ).map_err(|_| TransportError::bad_value("bad update interval"))?;
        Ok(())
    }
}


//------------ ManifestFields ------------------------------------------------

/// The unchecked fields of a deserialized manifest.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct ManifestFields {
    source_path: String,
    manifest_number: ManifestNumber,
    validity: ValidityWindow,
    stale: bool,
    files: Vec<FileAndHash>,
    ski: String,
    aki: String,
    aia: Option<String>,
}

#[cfg(feature = "serde")]
impl TryFrom<ManifestFields> for Manifest {
    type Error = TransportError;

    fn try_from(fields: ManifestFields) -> Result<Self, Self::Error> {
        let res = Manifest {
            source_path: fields.source_path,
            manifest_number: fields.manifest_number,
            validity: fields.validity,
            stale: fields.stale,
            files: fields.files,
            ski: fields.ski,
            aki: fields.aki,
            aia: fields.aia,
        };
        res.check()?;
        Ok(res)
    }
}


//------------ ManifestContent -----------------------------------------------

/// The decoded content of a manifest.
///
/// This is the eContent of the signed object with all fields checked for
/// their shape and values. Whether the manifest is current is left to the
/// caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestContent {
    manifest_number: ManifestNumber,
    validity: ValidityWindow,
    files: Vec<FileAndHash>,
}

impl ManifestContent {
    /// Decodes the manifest content from its encoded form.
    ///
    /// The content is a sequence of five elements, or six if the version
    /// is present. Since no version other than the default exists, the
    /// version being present is an error for now.
    pub fn decode(content: Bytes) -> Result<Self, ParseError> {
        let head = ContentHead::decode(content)?;
        let files = head.files()?;
        Ok(ManifestContent {
            manifest_number: head.manifest_number,
            validity: head.validity,
            files,
        })
    }

    pub fn manifest_number(&self) -> ManifestNumber {
        self.manifest_number
    }

    pub fn validity(&self) -> ValidityWindow {
        self.validity
    }

    pub fn files(&self) -> &[FileAndHash] {
        &self.files
    }
}


//------------ ContentHead ---------------------------------------------------

/// The manifest content decoded up to and including nextUpdate.
///
/// The fileHashAlg and fileList fields are only decoded on request, so
/// that a manifest can be classified by its validity window first.
struct ContentHead {
    seq: ElementSeq,

    /// The position of the manifest number.
    pos: usize,

    manifest_number: ManifestNumber,
    validity: ValidityWindow,
}

impl ContentHead {
    fn decode(content: Bytes) -> Result<Self, ParseError> {
        let seq = ElementSeq::decode(content).map_err(|err| {
            err.context("Manifest")
        })?;
        let mut pos = 0;
        if seq.check_len(&[5, 6]).map_err(|err| err.context("Manifest"))? == 6
        {
            check_version(&seq, pos)?;
            pos += 1;
        }

        let manifest_number = ManifestNumber::from_integer(
            &seq.integer(pos).map_err(|err| err.context("manifestNumber"))?
        )?;

        let this_update = seq.generalized_time(pos + 1).map_err(|err| {
            err.context("thisUpdate")
        })?;
        let next_update = seq.generalized_time(pos + 2).map_err(|err| {
            err.context("nextUpdate")
        })?;
        let validity = ValidityWindow::from_generalized_times(
            &this_update, &next_update
        )?;

        Ok(ContentHead { seq, pos, manifest_number, validity })
    }

    /// Checks the hash algorithm and decodes the file list.
    fn files(&self) -> Result<Vec<FileAndHash>, ParseError> {
        let alg = self.seq.oid(self.pos + 3).map_err(|err| {
            err.context("fileHashAlg")
        })?;
        if alg != oid::SHA256 {
            return Err(SemanticError::BadHashAlgorithm(alg.to_string()).into())
        }
        FileAndHash::parse_list(
            &self.seq.sequence(self.pos + 4).map_err(|err| {
                err.context("fileList")
            })?
        )
    }
}


//------------ ManifestContentBuilder ----------------------------------------

/// Creates the encoded content of a manifest.
pub struct ManifestContentBuilder {
    manifest_number: ManifestNumber,
    this_update: Time,
    next_update: Time,
    file_list: CapturedBuilder,
}

impl ManifestContentBuilder {
    pub fn new(
        manifest_number: ManifestNumber,
        this_update: Time,
        next_update: Time,
    ) -> Self {
        ManifestContentBuilder {
            manifest_number,
            this_update,
            next_update,
            file_list: Captured::builder(Mode::Der),
        }
    }

    pub fn push(&mut self, item: &FileAndHash) {
        self.push_pair(item.file(), item.hash().as_slice())
    }

    /// Adds a file name and hash without checking them.
    pub fn push_pair(&mut self, file: &str, hash: &[u8]) {
        self.file_list.extend(
            encode::sequence((
                OctetString::encode_slice_as(file.as_bytes(), Tag::IA5_STRING),
                BitString::encode_slice(hash, 0),
            ))
        )
    }

    pub fn encode(self) -> impl encode::Values {
        encode::sequence((
            // version is DEFAULT
            self.manifest_number.encode(),
            self.this_update.encode_generalized_time(),
            self.next_update.encode_generalized_time(),
            oid::SHA256.encode(),
            encode::sequence(
                self.file_list.freeze()
            )
        ))
    }

    /// Returns the DER encoded content.
    pub fn into_bytes(self) -> Bytes {
        self.encode().to_captured(Mode::Der).into_bytes()
    }
}


//------------ FileAndHash ---------------------------------------------------

/// An entry in the list of a manifest.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileAndHash {
    /// The name of the file.
    file: String,

    /// A SHA256 hash over the file’s content.
    hash: ManifestHash,
}

impl FileAndHash {
    /// Creates a new entry, checking the file name.
    pub fn new(file: String, hash: ManifestHash) -> Result<Self, SemanticError> {
        check_file_name(&file)?;
        Ok(FileAndHash { file, hash })
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn hash(&self) -> &ManifestHash {
        &self.hash
    }

    /// Parses the elements of the fileList sequence.
    ///
    /// ```txt
    /// FileAndHash ::= SEQUENCE {
    ///     file            IA5String,
    ///     hash            BIT STRING
    /// }
    /// ```
    ///
    /// The order of the entries is kept. A single bad entry fails the
    /// whole list.
    pub fn parse_list(list: &ElementSeq) -> Result<Vec<Self>, ParseError> {
        let mut res = Vec::with_capacity(list.len());
        for pos in 0..list.len() {
            let item = list.sequence(pos).map_err(|err| {
                err.context("fileList")
            })?;
            res.push(Self::parse_item(&item)?);
        }
        Ok(res)
    }

    fn parse_item(item: &ElementSeq) -> Result<Self, ParseError> {
        item.check_len(&[2]).map_err(|err| err.context("FileAndHash"))?;
        let file = item.ia5_string(0).map_err(|err| {
            err.context("FileAndHash")
        })?.ok_or(SemanticError::FileNameNotAscii)?;
        check_file_name(&file)?;

        let hash = item.bit_string(1).map_err(|err| {
            err.context("FileAndHash")
        })?;
        if hash.unused() != 0 {
            return Err(StructuralError::bad_value(
                1, ElementKind::BitString, "hash with unused bits"
            ).context("FileAndHash").into())
        }
        let hash = ManifestHash::try_from(&hash.octet_bytes()[..])?;
        Ok(FileAndHash { file, hash })
    }
}

/// Checks that a file name is a plain name with a suffix.
///
/// The name may not contain path components, since it would otherwise be
/// possible to refer to files outside the publication point, and must be
/// long enough to hold at least one character and a three letter suffix.
fn check_file_name(name: &str) -> Result<(), SemanticError> {
    if name.contains(['/', '\\', '\0']) {
        Err(SemanticError::FileNameNotPlain(name.into()))
    }
    else if name.len() <= 4 {
        Err(SemanticError::FileNameTooShort(name.into()))
    }
    else {
        Ok(())
    }
}


//------------ ManifestNumber ------------------------------------------------

/// The number of a manifest.
///
/// This is a non-negative integer of at most 20 octets. It is shown as a
/// hex number with upper case digits.
//
//  We keep the number in 20 octets left padded.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifestNumber([u8; 20]);

impl ManifestNumber {
    /// The maximum number of octets of a manifest number.
    pub const MAX_LEN: usize = 20;

    /// Creates a number from its big-endian octets.
    ///
    /// Leading zero octets are ignored. Fails if more than 20 octets are
    /// left after that.
    pub fn from_slice(octets: &[u8]) -> Result<Self, SemanticError> {
        let start = octets.iter().position(|&ch| ch != 0)
            .unwrap_or(octets.len());
        let octets = &octets[start..];
        if octets.len() > Self::MAX_LEN {
            return Err(SemanticError::ManifestNumberTooLong(octets.len()))
        }
        let mut res = [0u8; 20];
        res[Self::MAX_LEN - octets.len()..].copy_from_slice(octets);
        Ok(ManifestNumber(res))
    }

    /// Creates a number from a decoded INTEGER.
    pub fn from_integer(value: &Integer) -> Result<Self, SemanticError> {
        if value.is_negative() {
            return Err(SemanticError::NegativeManifestNumber)
        }
        Self::from_slice(value.as_slice())
    }

    pub fn from_array(array: [u8; 20]) -> Self {
        ManifestNumber(array)
    }

    pub fn into_array(self) -> [u8; 20] {
        self.0
    }

    /// Returns the octets without leading zeros.
    fn significant(&self) -> &[u8] {
        let start = self.0.iter().position(|&ch| ch != 0)
            .unwrap_or(Self::MAX_LEN);
        &self.0[start..]
    }

    /// Returns whether the encoded INTEGER needs a leading zero octet.
    fn needs_pad(&self) -> bool {
        match self.significant().first() {
            Some(first) => first & 0x80 != 0,
            None => true
        }
    }
}


//--- From

impl From<u64> for ManifestNumber {
    fn from(value: u64) -> Self {
        Self::from(u128::from(value))
    }
}

impl From<u128> for ManifestNumber {
    fn from(value: u128) -> Self {
        let mut res = [0u8; 20];
        res[4..].copy_from_slice(&value.to_be_bytes());
        ManifestNumber(res)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for ManifestNumber {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.significant().len() + usize::from(self.needs_pad())
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        if self.needs_pad() {
            target.write_all(b"\0")?;
        }
        target.write_all(self.significant())
    }
}


//--- Display and Debug

impl fmt::Display for ManifestNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let significant = self.significant();
        if significant.is_empty() {
            return f.write_str("0")
        }
        let mut buf = [0u8; 40];
        f.write_str(hex::encode(significant, &mut buf))
    }
}

impl fmt::Debug for ManifestNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ManifestNumber({})", self)
    }
}


//------------ ManifestHash --------------------------------------------------

/// A manifest hash.
///
/// This is a SHA256 hash.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifestHash([u8; 32]);

impl ManifestHash {
    /// The length of a hash in octets.
    pub const LEN: usize = DigestAlgorithm::DIGEST_LEN;

    pub fn from_array(array: [u8; 32]) -> Self {
        ManifestHash(array)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns whether `data` has this hash value.
    pub fn matches(&self, data: &[u8]) -> bool {
        DigestAlgorithm::default().digest(data).as_ref() == self.as_slice()
    }
}

impl<'a> TryFrom<&'a [u8]> for ManifestHash {
    type Error = SemanticError;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        value.try_into().map(ManifestHash).map_err(|_| {
            SemanticError::BadHashLength(value.len())
        })
    }
}

impl fmt::Display for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 64];
        f.write_str(hex::encode(self.as_slice(), &mut buf))
    }
}

impl fmt::Debug for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ManifestHash({})", self)
    }
}


//------------ HashMismatch --------------------------------------------------

/// A file whose content does not match its manifest hash.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HashMismatch {
    file: String,
    expected: ManifestHash,
    actual: Option<ManifestHash>,
}

impl HashMismatch {
    /// Returns the file name as given on the manifest.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the hash listed on the manifest.
    pub fn expected(&self) -> ManifestHash {
        self.expected
    }

    /// Returns the hash of the file or `None` if it couldn’t be read.
    pub fn actual(&self) -> Option<ManifestHash> {
        self.actual
    }
}

impl fmt::Display for HashMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.actual {
            Some(actual) => {
                write!(
                    f, "bad message digest for {}: expected {}, have {}",
                    self.file, self.expected, actual
                )
            }
            None => write!(f, "cannot read {}", self.file)
        }
    }
}

impl error::Error for HashMismatch { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::fs;
    use std::convert::Infallible;
    use chrono::TimeDelta;
    use crate::repository::sigobj::{EeCert, SignedContent};
    use super::*;

    //--- Helpers

    #[derive(Clone, Debug)]
    struct TestCert {
        ski: Option<String>,
        aki: Option<String>,
        aia: Option<String>,
    }

    impl EeCert for TestCert {
        fn subject_key_id(&self) -> Option<String> {
            self.ski.clone()
        }

        fn authority_key_id(&self) -> Option<String> {
            self.aki.clone()
        }

        fn authority_info_access(&self) -> Option<String> {
            self.aia.clone()
        }

        fn not_after(&self) -> Time {
            Time::utc(2030, 1, 1, 0, 0, 0).unwrap()
        }
    }

    /// Pretends the data is already the verified content.
    struct PassThrough(TestCert);

    impl CmsUnwrap for PassThrough {
        type Cert = TestCert;
        type Error = Infallible;

        fn unwrap_content(
            &self, data: &[u8], _content_type: &bcder::ConstOid,
        ) -> Result<SignedContent<TestCert>, Infallible> {
            Ok(SignedContent::new(
                self.0.clone(), Bytes::copy_from_slice(data)
            ))
        }
    }

    fn cert() -> TestCert {
        TestCert {
            ski: Some("AB".repeat(20)),
            aki: Some("CD".repeat(20)),
            aia: Some("rsync://example.com/ca.cer".into()),
        }
    }

    fn cms() -> PassThrough {
        PassThrough(cert())
    }

    fn now() -> Time {
        Time::utc(2021, 9, 17, 12, 0, 0).unwrap()
    }

    fn content(next_update: Time) -> ManifestContentBuilder {
        let mut builder = ManifestContentBuilder::new(
            12u64.into(), now() - TimeDelta::try_hours(1).unwrap(),
            next_update,
        );
        builder.push_pair("one.roa", &[1; 32]);
        builder.push_pair("two.cer", &[2; 32]);
        builder
    }

    fn current() -> Bytes {
        content(now() + TimeDelta::try_hours(1).unwrap()).into_bytes()
    }

    fn der(values: impl encode::Values) -> Bytes {
        values.to_captured(Mode::Der).into_bytes()
    }

    fn with_number(number: &[u8]) -> Bytes {
        der(encode::sequence((
            OctetString::encode_slice_as(number, Tag::INTEGER),
            now().encode_generalized_time(),
            now().encode_generalized_time(),
            oid::SHA256.encode(),
            encode::sequence(Captured::empty(Mode::Der)),
        )))
    }

    /// Encodes a value with a short definite length by hand.
    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        assert!(content.len() < 0x100);
        let mut res = vec![tag];
        if content.len() >= 0x80 {
            res.push(0x81);
        }
        res.push(content.len() as u8);
        res.extend_from_slice(content);
        res
    }

    fn with_file(file: &str, hash: &[u8]) -> Bytes {
        let mut builder = ManifestContentBuilder::new(
            1u64.into(), now(), now()
        );
        builder.push_pair(file, hash);
        builder.into_bytes()
    }

    //--- Tests

    #[test]
    fn parse_current() {
        let mft = Manifest::parse_at(
            &current(), "repo/ca/mft.mft", &cms(), now()
        ).unwrap();
        assert!(!mft.is_stale());
        assert_eq!(mft.len(), 2);
        assert_eq!(mft.files()[0].file(), "one.roa");
        assert_eq!(mft.files()[0].hash().as_slice(), &[1; 32]);
        assert_eq!(mft.files()[1].file(), "two.cer");
        assert_eq!(mft.manifest_number().to_string(), "0C");
        assert_eq!(mft.source_path(), "repo/ca/mft.mft");
        assert_eq!(mft.subject_key_id(), "AB".repeat(20));
        assert_eq!(mft.authority_key_id(), "CD".repeat(20));
        assert_eq!(
            mft.authority_info_access(), Some("rsync://example.com/ca.cer")
        );
    }

    #[test]
    fn parse_stale_drops_files() {
        let data = content(now() - TimeDelta::try_seconds(1).unwrap())
            .into_bytes();
        let mft = Manifest::parse_at(&data, "mft.mft", &cms(), now()).unwrap();
        assert!(mft.is_stale());
        assert!(mft.is_empty());
        assert_eq!(mft.manifest_number(), ManifestNumber::from(12u64));
    }

    #[test]
    fn parse_too_early() {
        let mut builder = ManifestContentBuilder::new(
            1u64.into(),
            now() + TimeDelta::try_seconds(1).unwrap(),
            now() + TimeDelta::try_hours(1).unwrap(),
        );
        builder.push_pair("one.roa", &[1; 32]);
        assert!(matches!(
            Manifest::parse_at(&builder.into_bytes(), "m", &cms(), now()),
            Err(ParseError::NotYetValid(_))
        ));
    }

    #[test]
    fn parse_at_second_resolution() {
        let data = content(now()).into_bytes();
        let later = now() + TimeDelta::try_milliseconds(500).unwrap();
        let mft = Manifest::parse_at(&data, "mft.mft", &cms(), later).unwrap();
        assert!(!mft.is_stale());
        assert_eq!(mft.len(), 2);

        let later = now() + TimeDelta::try_seconds(1).unwrap();
        let mft = Manifest::parse_at(&data, "mft.mft", &cms(), later).unwrap();
        assert!(mft.is_stale());
    }

    #[test]
    fn stale_skips_file_list() {
        let expired = now() - TimeDelta::try_hours(1).unwrap();
        let data = der(encode::sequence((
            7u8.encode(),
            (expired - TimeDelta::try_hours(1).unwrap())
                .encode_generalized_time(),
            expired.encode_generalized_time(),
            oid::CT_RPKI_MANIFEST.encode(),
            1u8.encode(),
        )));
        let mft = Manifest::parse_at(&data, "mft.mft", &cms(), now()).unwrap();
        assert!(mft.is_stale());
        assert!(mft.is_empty());
        assert_eq!(mft.manifest_number(), ManifestNumber::from(7u64));

        // The same content is rejected once it is current.
        let then = expired - TimeDelta::try_minutes(1).unwrap();
        assert!(matches!(
            Manifest::parse_at(&data, "mft.mft", &cms(), then),
            Err(ParseError::Semantic(SemanticError::BadHashAlgorithm(_)))
        ));

        // And is not yet valid before its window.
        let early = expired - TimeDelta::try_hours(2).unwrap();
        assert!(matches!(
            Manifest::parse_at(&data, "mft.mft", &cms(), early),
            Err(ParseError::NotYetValid(_))
        ));
    }

    #[test]
    fn parse_requires_key_ids() {
        for (ski, aki, missing) in [
            (None, Some("CD"), "SKI"),
            (Some(""), Some("CD"), "SKI"),
            (Some("AB"), None, "AKI"),
            (Some("AB"), Some(""), "AKI"),
        ] {
            let cms = PassThrough(TestCert {
                ski: ski.map(Into::into),
                aki: aki.map(Into::into),
                aia: None,
            });
            match Manifest::parse_at(&current(), "m", &cms, now()) {
                Err(ParseError::MissingExtension(ext)) => {
                    assert_eq!(ext, missing)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn empty_issuer_uri_is_absent() {
        let cms = PassThrough(TestCert { aia: Some(String::new()), ..cert() });
        let mft = Manifest::parse_at(&current(), "m", &cms, now()).unwrap();
        assert_eq!(mft.authority_info_access(), None);
        assert_eq!(Manifest::decode_wire(mft.encode_wire()).unwrap(), mft);
    }

    #[test]
    fn trailing_data() {
        let mut data = current().to_vec();
        data.push(0);
        let err = match ManifestContent::decode(data.into()) {
            Err(ParseError::Structural(err)) => err,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(err.field(), Some("Manifest"));

        // A FileAndHash with a stray octet after the hash.
        let mut item = tlv(0x16, b"a.roa");
        item.extend_from_slice(&tlv(0x03, &[0; 33]));
        item.push(0);
        let mut data = der(1u8.encode()).to_vec();
        data.extend_from_slice(&der(now().encode_generalized_time()));
        data.extend_from_slice(&der(now().encode_generalized_time()));
        data.extend_from_slice(&der(oid::SHA256.encode()));
        data.extend_from_slice(&tlv(0x30, &tlv(0x30, &item)));
        let data = Bytes::from(tlv(0x30, &data));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Structural(_))
        ));
    }

    #[test]
    fn empty_file_list() {
        let mft = ManifestContent::decode(with_number(b"\x01")).unwrap();
        assert!(mft.files().is_empty());
    }

    #[test]
    fn element_count() {
        for values in [
            der(encode::sequence((
                1u8.encode(),
                now().encode_generalized_time(),
                now().encode_generalized_time(),
                oid::SHA256.encode(),
            ))),
            der(encode::sequence((
                1u8.encode(),
                now().encode_generalized_time(),
                now().encode_generalized_time(),
                oid::SHA256.encode(),
                encode::sequence(Captured::empty(Mode::Der)),
                encode::sequence(Captured::empty(Mode::Der)),
                encode::sequence(Captured::empty(Mode::Der)),
            ))),
        ] {
            assert!(matches!(
                ManifestContent::decode(values),
                Err(ParseError::Structural(_))
            ));
        }
    }

    #[test]
    fn any_explicit_version_is_rejected() {
        for version in [0u8, 1] {
            let data = der(encode::sequence((
                encode::sequence_as(Tag::CTX_0, version.encode()),
                1u8.encode(),
                now().encode_generalized_time(),
                now().encode_generalized_time(),
                oid::SHA256.encode(),
                encode::sequence(Captured::empty(Mode::Der)),
            )));
            assert!(matches!(
                ManifestContent::decode(data),
                Err(ParseError::Semantic(SemanticError::UnsupportedVersion(v)))
                    if v == i64::from(version)
            ));
        }
    }

    #[test]
    fn wrong_field_types() {
        // thisUpdate as UTCTime.
        let data = der(encode::sequence((
            1u8.encode(),
            OctetString::encode_slice_as(b"210917120000Z", Tag::UTC_TIME),
            now().encode_generalized_time(),
            oid::SHA256.encode(),
            encode::sequence(Captured::empty(Mode::Der)),
        )));
        let err = match ManifestContent::decode(data) {
            Err(ParseError::Structural(err)) => err,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(err.position(), Some(1));
        assert_eq!(err.field(), Some("thisUpdate"));
    }

    #[test]
    fn manifest_number_range() {
        assert!(matches!(
            ManifestContent::decode(with_number(b"\xff")),
            Err(ParseError::Semantic(SemanticError::NegativeManifestNumber))
        ));

        let mut long = vec![0u8];
        long.extend_from_slice(&[0xff; 21]);
        assert!(matches!(
            ManifestContent::decode(with_number(&long)),
            Err(ParseError::Semantic(
                SemanticError::ManifestNumberTooLong(21)
            ))
        ));

        long.pop();
        let mft = ManifestContent::decode(with_number(&long)).unwrap();
        assert_eq!(mft.manifest_number().to_string(), "FF".repeat(20));

        let mft = ManifestContent::decode(with_number(b"\0")).unwrap();
        assert_eq!(mft.manifest_number().to_string(), "0");
    }

    #[test]
    fn bad_hash_algorithm() {
        let data = der(encode::sequence((
            1u8.encode(),
            now().encode_generalized_time(),
            now().encode_generalized_time(),
            oid::CT_RPKI_MANIFEST.encode(),
            encode::sequence(Captured::empty(Mode::Der)),
        )));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Semantic(SemanticError::BadHashAlgorithm(_)))
        ));
    }

    #[test]
    fn inverted_window() {
        let data = der(encode::sequence((
            1u8.encode(),
            now().encode_generalized_time(),
            (now() - TimeDelta::try_seconds(1).unwrap())
                .encode_generalized_time(),
            oid::SHA256.encode(),
            encode::sequence(Captured::empty(Mode::Der)),
        )));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Semantic(SemanticError::Time(_)))
        ));
    }

    #[test]
    fn file_names() {
        assert!(matches!(
            ManifestContent::decode(with_file("a/b.roa", &[0; 32])),
            Err(ParseError::Semantic(SemanticError::FileNameNotPlain(_)))
        ));
        assert!(matches!(
            ManifestContent::decode(with_file("../x.roa", &[0; 32])),
            Err(ParseError::Semantic(SemanticError::FileNameNotPlain(_)))
        ));
        assert!(matches!(
            ManifestContent::decode(with_file("a.ro", &[0; 32])),
            Err(ParseError::Semantic(SemanticError::FileNameTooShort(_)))
        ));
        assert!(ManifestContent::decode(with_file("a.roa", &[0; 32])).is_ok());
        assert!(matches!(
            ManifestContent::decode(with_file("fü.roa", &[0; 32])),
            Err(ParseError::Semantic(SemanticError::FileNameNotAscii))
        ));
    }

    #[test]
    fn hash_length() {
        assert!(matches!(
            ManifestContent::decode(with_file("a.roa", &[0; 31])),
            Err(ParseError::Semantic(SemanticError::BadHashLength(31)))
        ));
        assert!(matches!(
            ManifestContent::decode(with_file("a.roa", &[0; 33])),
            Err(ParseError::Semantic(SemanticError::BadHashLength(33)))
        ));
    }

    #[test]
    fn file_and_hash_shape() {
        let item = |values: Captured| der(encode::sequence((
            1u8.encode(),
            now().encode_generalized_time(),
            now().encode_generalized_time(),
            oid::SHA256.encode(),
            encode::sequence(values),
        )));
        // Three elements.
        let data = item(encode::sequence((
            OctetString::encode_slice_as(b"a.roa", Tag::IA5_STRING),
            BitString::encode_slice([0u8; 32], 0),
            1u8.encode(),
        )).to_captured(Mode::Der));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Structural(_))
        ));
        // Name as an octet string.
        let data = item(encode::sequence((
            OctetString::encode_slice(b"a.roa"),
            BitString::encode_slice([0u8; 32], 0),
        )).to_captured(Mode::Der));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Structural(_))
        ));
        // Not a sequence.
        let data = item(1u8.encode().to_captured(Mode::Der));
        assert!(matches!(
            ManifestContent::decode(data),
            Err(ParseError::Structural(_))
        ));
    }

    #[test]
    fn check_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let alg = DigestAlgorithm::default();
        let mut builder = ManifestContentBuilder::new(
            1u64.into(), now(), now() + TimeDelta::try_hours(1).unwrap(),
        );
        for (name, data) in [("one.roa", b"one"), ("two.roa", b"two")] {
            fs::write(dir.path().join(name), data).unwrap();
            builder.push_pair(name, alg.digest(data).as_ref());
        }
        builder.push_pair("missing.crl", &[0; 32]);
        let mft = Manifest::parse_at(
            &builder.into_bytes(), "mft.mft", &cms(), now()
        ).unwrap();

        let mismatches = mft.check_file_hashes(dir.path()).unwrap_err();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].file(), "missing.crl");
        assert_eq!(mismatches[0].actual(), None);

        fs::write(dir.path().join("two.roa"), b"owt").unwrap();
        let mismatches = mft.check_file_hashes(dir.path()).unwrap_err();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].file(), "two.roa");
        assert!(mismatches[0].actual().unwrap().matches(b"owt"));
        assert_eq!(mismatches[1].file(), "missing.crl");
    }

    #[test]
    fn wire_round_trip() {
        let mft = Manifest::parse_at(&current(), "mft.mft", &cms(), now())
            .unwrap();
        assert_eq!(Manifest::decode_wire(mft.encode_wire()).unwrap(), mft);

        let stale = content(now() - TimeDelta::try_seconds(1).unwrap())
            .into_bytes();
        let mft = Manifest::parse_at(&stale, "mft.mft", &cms(), now())
            .unwrap();
        assert_eq!(Manifest::decode_wire(mft.encode_wire()).unwrap(), mft);
    }

    #[test]
    fn wire_truncated_anywhere() {
        let data = Manifest::parse_at(&current(), "mft.mft", &cms(), now())
            .unwrap().encode_wire();
        for len in 0..data.len() {
            assert!(Manifest::decode_wire(data.slice(..len)).is_err());
        }
        let mut long = data.to_vec();
        long.push(0);
        assert!(Manifest::decode_wire(long.into()).is_err());
    }

    #[test]
    fn wire_rejects_bad_names() {
        let mft = Manifest::parse_at(&current(), "mft.mft", &cms(), now())
            .unwrap();
        let mut data = mft.encode_wire().to_vec();
        // The first file name starts after the flag, the source path and
        // the count and its length prefix.
        let start = 4 + 8 + mft.source_path().len() + 8 + 8;
        data[start..start + 7].copy_from_slice(b"../.roa");
        assert!(Manifest::decode_wire(data.into()).is_err());
    }

    #[test]
    fn manifest_number_encoding() {
        for (number, content) in [
            (ManifestNumber::from(0u64), &b"\x02\x01\x00"[..]),
            (ManifestNumber::from(0x7fu64), &b"\x02\x01\x7f"[..]),
            (ManifestNumber::from(0x80u64), &b"\x02\x02\x00\x80"[..]),
        ] {
            assert_eq!(
                number.encode().to_captured(Mode::Der).as_slice(), content
            );
        }
        let max = ManifestNumber::from_array([0xff; 20]);
        let encoded = max.encode().to_captured(Mode::Der);
        assert_eq!(encoded.as_slice().len(), 2 + 21);
    }
}
