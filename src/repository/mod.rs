//! Processing the content of RPKI repositories.
//!
//! This module contains types and procedures to parse and validate the
//! content of the signed objects found in an RPKI repository, to check the
//! files listed on a manifest, and to send parsed objects to another process.

//--- Re-exports
//
pub use self::error::{
    ParseError, SemanticError, StructuralError, TransportError
};
pub use self::manifest::{
    FileAndHash, HashMismatch, Manifest, ManifestContent, ManifestHash,
    ManifestNumber,
};
pub use self::roa::{Roa, RoaIpAddress};
pub use self::sigobj::{CmsUnwrap, EeCert, SignedContent};
pub use self::x509::{Time, ValidityOutcome, ValidityWindow};


//--- Modules
//
pub mod elements;
pub mod error;
pub mod manifest;
pub mod roa;
pub mod sigobj;
pub mod wire;
pub mod x509;

