//! Cryptographic primitives used by the object parsers.
//!
//! Signature verification happens outside of this crate. All that is left
//! here are the digests needed to check the files listed on a manifest.

pub use self::digest::{Context, Digest, DigestAlgorithm, FileDigest};

pub mod digest;
