//! The object identifiers used in this crate.
//!
//! This module collects all the object indentifiers used at various places
//! in this crate in one central place. They are public so you can refer to
//! them should that ever become necessary.

use bcder::{ConstOid, Oid};

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `id-sha256`
///
/// Identifies the SHA-256 one-way hash function. This is the only file
/// hash algorithm allowed in manifests.
pub const SHA256: ConstOid
    = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

/// [RFC 6486](https://tools.ietf.org/html/rfc6486) `id-ct-rpkiManifest`
///
/// The content type of RPKI manifests, 1.2.840.113549.1.9.16.1.26.
pub const CT_RPKI_MANIFEST: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 1, 26]);

/// [RFC 6482](https://tools.ietf.org/html/rfc6482) `id-ct-routeOriginAuthz`
///
/// The content type of route origin authorizations,
/// 1.2.840.113549.1.9.16.1.24.
pub const ROUTE_ORIGIN_AUTHZ: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 1, 24]);


//============ Tests =========================================================
