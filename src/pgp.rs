// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! OpenPGP signature emission.

Two signature renditions are produced over repository metadata:

* Detached, ASCII armored signatures (`Release.gpg`).
* The cleartext signature framework defined by
  [RFC 4880 Section 7](https://datatracker.ietf.org/doc/html/rfc4880.html#section-7)
  (`InRelease`), where the signed text and the armored signature live in one
  document.
*/

use {
    chrono::SubsecRound,
    pgp::{
        crypto::HashAlgorithm,
        packet::{Packet, SignatureConfig, SignatureType, Subpacket},
        types::{KeyVersion, SecretKeyTrait},
    },
    smallvec::SmallVec,
    std::io::Cursor,
};

const CLEARTEXT_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";

fn signature_config(
    key: &impl SecretKeyTrait,
    typ: SignatureType,
    hash_algorithm: HashAlgorithm,
) -> SignatureConfig {
    let hashed_subpackets = vec![
        Subpacket::IssuerFingerprint(KeyVersion::V4, SmallVec::from_slice(&key.fingerprint())),
        Subpacket::SignatureCreationTime(chrono::Utc::now().trunc_subsecs(0)),
    ];
    let unhashed_subpackets = vec![Subpacket::Issuer(key.key_id())];

    SignatureConfig::new_v4(
        Default::default(),
        typ,
        key.algorithm(),
        hash_algorithm,
        hashed_subpackets,
        unhashed_subpackets,
    )
}

fn armor_signature(signature: pgp::Signature) -> pgp::errors::Result<String> {
    let packet = Packet::Signature(signature);
    let mut writer = Cursor::new(Vec::<u8>::new());
    pgp::armor::write(&packet, pgp::armor::BlockType::Signature, &mut writer, None)?;

    String::from_utf8(writer.into_inner()).map_err(|e| pgp::errors::Error::Utf8Error(e.utf8_error()))
}

fn hash_header_name(hash_algorithm: HashAlgorithm) -> pgp::errors::Result<&'static str> {
    match hash_algorithm {
        HashAlgorithm::MD5 => Ok("MD5"),
        HashAlgorithm::SHA1 => Ok("SHA1"),
        HashAlgorithm::SHA2_256 => Ok("SHA256"),
        HashAlgorithm::SHA2_384 => Ok("SHA384"),
        HashAlgorithm::SHA2_512 => Ok("SHA512"),
        _ => Err(pgp::errors::Error::Unsupported(
            "hash algorithm unsupported for cleartext signatures".to_string(),
        )),
    }
}

/// Produce an armored detached signature over data.
///
/// The returned string is a `-----BEGIN PGP SIGNATURE-----` block suitable
/// for storage next to the signed payload.
pub fn detached_sign<PW>(
    key: &impl SecretKeyTrait,
    key_pw: PW,
    hash_algorithm: HashAlgorithm,
    data: &[u8],
) -> pgp::errors::Result<String>
where
    PW: FnOnce() -> String,
{
    let config = signature_config(key, SignatureType::Binary, hash_algorithm);
    let signature = config.sign(key, key_pw, Cursor::new(data))?;

    armor_signature(signature)
}

/// Produce a cleartext signature over text.
///
/// The returned value is a multiline string with LF line endings containing
/// the cleartext framework encoded text and signature. Per RFC 4880 the
/// signature is computed over the text with trailing whitespace removed and
/// CRLF line endings; the emitted document carries the dash-escaped
/// rendition of the text.
pub fn cleartext_sign<PW>(
    key: &impl SecretKeyTrait,
    key_pw: PW,
    hash_algorithm: HashAlgorithm,
    text: &str,
) -> pgp::errors::Result<String>
where
    PW: FnOnce() -> String,
{
    let hash_name = hash_header_name(hash_algorithm)?;

    let mut escaped_lines = Vec::new();
    let mut canonical_lines = Vec::new();

    for line in text.lines() {
        // Trailing whitespace is removed when the signature is generated.
        let line = line.trim_end();

        // Lines commencing in a dash must be dash-escaped; lines commencing
        // "From " should be.
        if line.starts_with('-') || line.starts_with("From ") {
            escaped_lines.push(format!("- {}", line));
        } else {
            escaped_lines.push(line.to_string());
        }

        canonical_lines.push(line);
    }

    let canonical = canonical_lines.join("\r\n").into_bytes();

    let config = signature_config(key, SignatureType::Text, hash_algorithm);
    let signature = config.sign(key, key_pw, Cursor::new(canonical))?;
    let signature_armor = armor_signature(signature)?;

    let mut document = String::new();
    document.push_str(CLEARTEXT_HEADER);
    document.push('\n');
    document.push_str("Hash: ");
    document.push_str(hash_name);
    document.push_str("\n\n");
    for line in escaped_lines {
        document.push_str(&line);
        document.push('\n');
    }
    document.push_str(&signature_armor);

    Ok(document)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::signing_key::{create_self_signed_key, signing_secret_key_params_builder},
        pgp::{types::KeyTrait, Deserializable, KeyType, StandaloneSignature},
    };

    fn test_key() -> (pgp::SignedSecretKey, pgp::SignedPublicKey) {
        let params = signing_secret_key_params_builder("Test <test@example.com>")
            .key_type(KeyType::EdDSA)
            .build()
            .unwrap();

        create_self_signed_key(params, String::new).unwrap()
    }

    #[test]
    fn detached_signature_verifies() -> pgp::errors::Result<()> {
        let (secret, public) = test_key();
        let data = b"payload to sign\n";

        let armor = detached_sign(&secret, String::new, HashAlgorithm::SHA2_256, data)?;
        assert!(armor.starts_with("-----BEGIN PGP SIGNATURE-----"));

        let (signature, _) = StandaloneSignature::from_armor_single(Cursor::new(armor.as_bytes()))?;
        signature.signature.verify(&public, Cursor::new(data))?;

        Ok(())
    }

    #[test]
    fn cleartext_document_structure() -> pgp::errors::Result<()> {
        let (secret, public) = test_key();
        let text = "Suite: stable\nCodename: stable\n-----dashed line\n";

        let document = cleartext_sign(&secret, String::new, HashAlgorithm::SHA2_256, text)?;

        assert!(document.starts_with("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\n"));
        assert!(document.contains("\nSuite: stable\n"));
        // Dash-prefixed lines are escaped.
        assert!(document.contains("\n- -----dashed line\n"));
        assert!(document.contains("-----BEGIN PGP SIGNATURE-----"));

        // The signature verifies over the CRLF canonicalized source text.
        let sig_start = document.find("-----BEGIN PGP SIGNATURE-----").unwrap();
        let (signature, _) =
            StandaloneSignature::from_armor_single(Cursor::new(document[sig_start..].as_bytes()))?;

        let canonical = text
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\r\n");
        signature
            .signature
            .verify(&public, Cursor::new(canonical.into_bytes()))?;

        assert_eq!(
            signature.signature.issuer(),
            Some(&public.key_id()),
        );

        Ok(())
    }
}
