//! RPKI manifests and route origin authorizations.
//!
//! The _Resource Public Key Infrastructure_ (RPKI) is an application of
//! PKI to Internet routing security. A CA publishes the objects it issued
//! in a directory and lists all of them together with their hashes on a
//! manifest, itself a signed object.
//!
//! This crate parses and validates the content of manifests and of route
//! origin authorizations (ROAs), checks the files listed on a manifest
//! against their hashes, and provides a compact transfer encoding for
//! handing parsed objects to another process. Unwrapping the signed
//! envelope of an object is left to the caller through the
//! [`repository::CmsUnwrap`] trait.
//!
//! The crate logs through the `log` facade and never installs a logger.
//!
//! The `serde` feature adds serialization of the parsed objects.

pub mod crypto;
pub mod oid;
pub mod repository;
pub mod util;
