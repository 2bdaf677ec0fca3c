// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O helpers: compression dispatch and content digests. */

use {
    crate::error::{RepositoryError, Result},
    digest::Digest,
    std::io::{Read, Write},
};

/// Compression format used by Debian primitives.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Compression {
    /// No compression (no extension).
    None,

    /// Gzip compression (.gz extension).
    Gzip,

    /// Bzip2 compression (.bz2 extension).
    Bzip2,

    /// XZ compression (.xz extension).
    Xz,

    /// Legacy LZMA compression (.lzma extension).
    Lzma,
}

impl Compression {
    /// Filename extension for files compressed in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
            Self::Lzma => ".lzma",
        }
    }

    /// Resolve the compression format of an archive member from its name.
    ///
    /// Dispatch is on the final extension only: `control.tar` is
    /// uncompressed, `control.tar.xz` is XZ, etc.
    pub fn from_member_name(name: &str) -> Result<Self> {
        let extension = match name.rfind('.') {
            Some(pos) => &name[pos..],
            None => "",
        };

        match extension {
            ".tar" => Ok(Self::None),
            ".gz" => Ok(Self::Gzip),
            ".bz2" => Ok(Self::Bzip2),
            ".xz" => Ok(Self::Xz),
            ".lzma" => Ok(Self::Lzma),
            _ => Err(RepositoryError::UnknownCompression(extension.to_string())),
        }
    }

    /// Wrap a reader with transparent decompression.
    pub fn decode<'a>(&self, reader: impl Read + 'a) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Self::Lzma => {
                let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|e| RepositoryError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
                Box::new(xz2::read::XzDecoder::new_stream(reader, stream))
            }
        })
    }
}

/// Compress data with gzip at the default level.
pub fn gzip_encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Compress data with xz at the default level.
pub fn xz_encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data)?;
    encoder.finish()
}

/// Digest algorithms computed over repository content.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumType {
    /// Emit all variants, weakest first.
    pub fn all() -> impl Iterator<Item = ChecksumType> {
        [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512].into_iter()
    }

    /// Name of the field holding this digest in `Packages` paragraphs.
    pub fn packages_field_name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Name of the field holding this digest in `Release` paragraphs.
    pub fn release_field_name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5Sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

/// Represents a content digest.
#[derive(Clone, Eq, PartialEq)]
pub enum ContentDigest {
    /// An MD5 digest.
    Md5(Vec<u8>),
    /// A SHA-1 digest.
    Sha1(Vec<u8>),
    /// A SHA-256 digest.
    Sha256(Vec<u8>),
    /// A SHA-512 digest.
    Sha512(Vec<u8>),
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5(data) => write!(f, "Md5({})", hex::encode(data)),
            Self::Sha1(data) => write!(f, "Sha1({})", hex::encode(data)),
            Self::Sha256(data) => write!(f, "Sha256({})", hex::encode(data)),
            Self::Sha512(data) => write!(f, "Sha512({})", hex::encode(data)),
        }
    }
}

impl ContentDigest {
    /// Obtain the digest bytes for this content digest.
    pub fn digest_bytes(&self) -> &[u8] {
        match self {
            Self::Md5(x) => x,
            Self::Sha1(x) => x,
            Self::Sha256(x) => x,
            Self::Sha512(x) => x,
        }
    }

    /// Obtain the lowercase hex encoded content digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest_bytes())
    }

    /// Obtain the [ChecksumType] for this digest.
    pub fn checksum_type(&self) -> ChecksumType {
        match self {
            Self::Md5(_) => ChecksumType::Md5,
            Self::Sha1(_) => ChecksumType::Sha1,
            Self::Sha256(_) => ChecksumType::Sha256,
            Self::Sha512(_) => ChecksumType::Sha512,
        }
    }
}

/// Holds all digest flavors computed over a single piece of content.
#[derive(Clone, Debug)]
pub struct MultiContentDigest {
    pub md5: ContentDigest,
    pub sha1: ContentDigest,
    pub sha256: ContentDigest,
    pub sha512: ContentDigest,
}

impl MultiContentDigest {
    /// Obtain the [ContentDigest] for a given [ChecksumType].
    pub fn digest(&self, checksum: ChecksumType) -> &ContentDigest {
        match checksum {
            ChecksumType::Md5 => &self.md5,
            ChecksumType::Sha1 => &self.sha1,
            ChecksumType::Sha256 => &self.sha256,
            ChecksumType::Sha512 => &self.sha512,
        }
    }

    /// Obtain an iterator of [ContentDigest] in this instance.
    pub fn iter_digests(&self) -> impl Iterator<Item = &ContentDigest> + '_ {
        [&self.md5, &self.sha1, &self.sha256, &self.sha512].into_iter()
    }
}

/// A content digester that simultaneously computes multiple digest types.
///
/// The digester implements [Write], so `std::io::copy` can stream a source
/// through it. Every input byte is fed to each hash exactly once; the source
/// is read a single time regardless of how many digest flavors are wanted.
pub struct MultiDigester {
    md5: md5::Md5,
    sha1: sha1::Sha1,
    sha256: sha2::Sha256,
    sha512: sha2::Sha512,
}

impl Default for MultiDigester {
    fn default() -> Self {
        Self {
            md5: md5::Md5::new(),
            sha1: sha1::Sha1::new(),
            sha256: sha2::Sha256::new(),
            sha512: sha2::Sha512::new(),
        }
    }
}

impl MultiDigester {
    /// Write content into the digesters.
    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
    }

    /// Finish digesting content.
    ///
    /// Consumes the instance and returns a [MultiContentDigest] holding all
    /// the digests.
    pub fn finish(self) -> MultiContentDigest {
        MultiContentDigest {
            md5: ContentDigest::Md5(self.md5.finalize().to_vec()),
            sha1: ContentDigest::Sha1(self.sha1.finalize().to_vec()),
            sha256: ContentDigest::Sha256(self.sha256.finalize().to_vec()),
            sha512: ContentDigest::Sha512(self.sha512.finalize().to_vec()),
        }
    }
}

impl Write for MultiDigester {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Digest the full content of a reader in a single streaming pass.
pub fn digest_reader<R: Read>(reader: &mut R) -> std::io::Result<MultiContentDigest> {
    let mut digester = MultiDigester::default();
    std::io::copy(reader, &mut digester)?;
    Ok(digester.finish())
}

/// Digest an in-memory buffer.
pub fn digest_data(data: &[u8]) -> MultiContentDigest {
    let mut digester = MultiDigester::default();
    digester.update(data);
    digester.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_match_reference_vectors() {
        let digests = digest_data(b"abc");

        assert_eq!(digests.md5.digest_hex(), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            digests.sha1.digest_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            digests.sha256.digest_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            digests.sha512.digest_hex(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn streaming_and_buffered_digests_agree() -> std::io::Result<()> {
        let data = vec![7u8; 70000];
        let streamed = digest_reader(&mut std::io::Cursor::new(&data))?;
        let buffered = digest_data(&data);

        assert_eq!(streamed.sha256.digest_hex(), buffered.sha256.digest_hex());
        assert_eq!(streamed.md5.digest_hex(), buffered.md5.digest_hex());

        Ok(())
    }

    #[test]
    fn member_name_dispatch() {
        assert_eq!(
            Compression::from_member_name("control.tar").unwrap(),
            Compression::None
        );
        assert_eq!(
            Compression::from_member_name("control.tar.gz").unwrap(),
            Compression::Gzip
        );
        assert_eq!(
            Compression::from_member_name("data.tar.bz2").unwrap(),
            Compression::Bzip2
        );
        assert_eq!(
            Compression::from_member_name("data.tar.xz").unwrap(),
            Compression::Xz
        );
        assert_eq!(
            Compression::from_member_name("data.tar.lzma").unwrap(),
            Compression::Lzma
        );

        assert!(matches!(
            Compression::from_member_name("data.tar.zst"),
            Err(RepositoryError::UnknownCompression(ext)) if ext == ".zst"
        ));
    }

    #[test]
    fn gzip_round_trip() -> crate::error::Result<()> {
        let compressed = gzip_encode(b"hello repository")?;
        let mut decoded = Vec::new();
        Compression::Gzip
            .decode(std::io::Cursor::new(compressed))?
            .read_to_end(&mut decoded)?;
        assert_eq!(decoded, b"hello repository");

        Ok(())
    }
}
