//! Digest algorithm and operations.

use std::{fs, io};
use std::path::Path;
use ring::digest;

// Re-export the things from ring for actual digest generation.
pub use ring::digest::Digest;


//------------ DigestAlgorithm -----------------------------------------------

/// The digest algorithms used by RPKI.
///
/// These are the algorithms used for the file hashes of manifests. For use
/// in RPKI, [RFC 7935] limits them to exactly one, SHA-256. Because of
/// that, this type is currently a zero-sized struct. If additional
/// algorithms are ever introduced in the future, it will change into an enum.
///
/// [RFC 7935]: https://tools.ietf.org/html/rfc7935
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DigestAlgorithm(());

impl DigestAlgorithm {
    /// The length of a digest value in octets.
    pub const DIGEST_LEN: usize = 32;

    /// Returns the digest of `data` using this algorithm.
    pub fn digest(self, data: &[u8]) -> Digest {
        digest::digest(&digest::SHA256, data)
    }

    /// Returns a digest context for multi-step calculation of the digest.
    pub fn start(self) -> Context {
        Context(digest::Context::new(&digest::SHA256))
    }

    /// Returns the digest over everything that can be read from `reader`.
    pub fn digest_reader<R: io::Read>(
        self, reader: &mut R
    ) -> Result<Digest, io::Error> {
        let mut context = self.start();
        io::copy(reader, &mut context)?;
        Ok(context.finish())
    }

    /// Returns the digest of the content of the file at `path`.
    pub fn digest_file(self, path: &Path) -> Result<Digest, io::Error> {
        let mut file = fs::File::open(path)?;
        self.digest_reader(&mut file)
    }
}


//------------ FileDigest ----------------------------------------------------

/// Something that can determine the digest of a file.
///
/// The hash check of a manifest uses this to learn the digests of the files
/// it lists. `DigestAlgorithm` implements it by reading the file from disk.
pub trait FileDigest {
    /// Returns the SHA-256 digest of the file at `path`.
    fn compute_digest(
        &self, path: &Path
    ) -> Result<[u8; DigestAlgorithm::DIGEST_LEN], io::Error>;
}

impl FileDigest for DigestAlgorithm {
    fn compute_digest(
        &self, path: &Path
    ) -> Result<[u8; DigestAlgorithm::DIGEST_LEN], io::Error> {
        let digest = self.digest_file(path)?;
        let mut res = [0u8; DigestAlgorithm::DIGEST_LEN];
        res.copy_from_slice(digest.as_ref());
        Ok(res)
    }
}

impl<T: FileDigest + ?Sized> FileDigest for &T {
    fn compute_digest(
        &self, path: &Path
    ) -> Result<[u8; DigestAlgorithm::DIGEST_LEN], io::Error> {
        (**self).compute_digest(path)
    }
}


//------------ Context -------------------------------------------------------

#[derive(Clone)]
pub struct Context(digest::Context);

impl Context {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    pub fn finish(self) -> Digest {
        self.0.finish()
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}


//============ Tests =========================================================
