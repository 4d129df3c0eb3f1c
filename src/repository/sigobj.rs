//! Signed objects.
//!
//! RPKI objects are wrapped in a CMS signed-data envelope (RFC 6488) that
//! also carries the EE certificate the content was signed with. Checking
//! the signature and the certificate is not done by this crate. Instead, a
//! [`CmsUnwrap`] hands over the verified content octets together with the
//! EE certificate, and the object parsers take the few certificate fields
//! they need through the [`EeCert`] trait.

use std::fmt;
use bcder::ConstOid;
use bytes::Bytes;
use super::elements::{ElementKind, ElementSeq};
use super::error::{ParseError, SemanticError, StructuralError};
use super::x509::Time;


//------------ CmsUnwrap -----------------------------------------------------

/// Opens the signed envelope of an RPKI object.
pub trait CmsUnwrap {
    /// The EE certificate type produced when unwrapping.
    type Cert: EeCert;

    /// The error returned if unwrapping fails.
    type Error: fmt::Display;

    /// Verifies the signed object in `data` and returns its content.
    ///
    /// The object’s content type must be `content_type`. The returned
    /// content is the encapsulated content octets, i.e., the DER encoded
    /// object specific content.
    fn unwrap_content(
        &self, data: &[u8], content_type: &ConstOid,
    ) -> Result<SignedContent<Self::Cert>, Self::Error>;
}

impl<T: CmsUnwrap + ?Sized> CmsUnwrap for &T {
    type Cert = T::Cert;
    type Error = T::Error;

    fn unwrap_content(
        &self, data: &[u8], content_type: &ConstOid,
    ) -> Result<SignedContent<Self::Cert>, Self::Error> {
        (**self).unwrap_content(data, content_type)
    }
}


//------------ SignedContent -------------------------------------------------

/// The verified content of a signed object and its EE certificate.
#[derive(Clone, Debug)]
pub struct SignedContent<C> {
    cert: C,
    content: Bytes,
}

impl<C> SignedContent<C> {
    pub fn new(cert: C, content: Bytes) -> Self {
        SignedContent { cert, content }
    }

    /// Returns a reference to the EE certificate.
    pub fn cert(&self) -> &C {
        &self.cert
    }

    /// Returns a reference to the content octets.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Converts the value into the certificate and content.
    pub fn into_parts(self) -> (C, Bytes) {
        (self.cert, self.content)
    }
}


//------------ EeCert --------------------------------------------------------

/// Access to the EE certificate fields needed by the object parsers.
///
/// Key identifiers are given as upper case hex strings.
pub trait EeCert {
    /// Returns the subject key identifier.
    fn subject_key_id(&self) -> Option<String>;

    /// Returns the authority key identifier.
    fn authority_key_id(&self) -> Option<String>;

    /// Returns the CA issuers URI of the authority information access.
    fn authority_info_access(&self) -> Option<String>;

    /// Returns the end of the certificate’s validity.
    fn not_after(&self) -> Time;
}

impl<T: EeCert + ?Sized> EeCert for &T {
    fn subject_key_id(&self) -> Option<String> {
        (**self).subject_key_id()
    }

    fn authority_key_id(&self) -> Option<String> {
        (**self).authority_key_id()
    }

    fn authority_info_access(&self) -> Option<String> {
        (**self).authority_info_access()
    }

    fn not_after(&self) -> Time {
        (**self).not_after()
    }
}


//------------ KeyIds --------------------------------------------------------

/// The certificate fields every parsed object keeps.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct KeyIds {
    pub ski: String,
    pub aki: String,
    pub aia: Option<String>,
}

impl KeyIds {
    /// Takes the key identifiers from a certificate.
    ///
    /// Returns the name of the missing extension if the subject or authority
    /// key identifier is absent or empty. An empty CA issuers URI is the
    /// same as none at all.
    pub fn from_cert<C: EeCert>(cert: &C) -> Result<Self, &'static str> {
        Ok(KeyIds {
            ski: cert.subject_key_id().filter(|id| !id.is_empty())
                .ok_or("SKI")?,
            aki: cert.authority_key_id().filter(|id| !id.is_empty())
                .ok_or("AKI")?,
            aia: cert.authority_info_access().filter(|uri| !uri.is_empty()),
        })
    }
}


//------------ Content Version -----------------------------------------------

/// Checks an explicitly encoded content version.
///
/// The content of manifests and ROAs starts with an optional
/// `version [0] EXPLICIT INTEGER DEFAULT 0`. Since DER forbids encoding a
/// default value and no other version has been defined yet, every version
/// that is present is rejected. The value is still decoded so that a future
/// version can be accepted here.
pub(crate) fn check_version(
    seq: &ElementSeq, pos: usize
) -> Result<(), ParseError> {
    let inner = seq.explicit0(pos).map_err(|err| err.context("version"))?;
    inner.check_len(&[1]).map_err(|err| err.context("version"))?;
    let version = i64::try_from(inner.integer(0).map_err(|err| {
        err.context("version")
    })?).map_err(|_| {
        StructuralError::bad_value(
            0, ElementKind::Integer, "version out of range"
        ).context("version")
    })?;
    Err(SemanticError::UnsupportedVersion(version).into())
}
