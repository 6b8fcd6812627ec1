//! Detached PGP signature verification, importing keys from a KEYS URL
//! or a public keyserver.

use std::io::Cursor;

use pgp::composed::signed_key::SignedPublicKey;
use pgp::composed::StandaloneSignature;
use pgp::Deserializable;

use crate::error::{Error, Result};

const DEFAULT_KEYSERVER: &str = "https://keys.openpgp.org";

fn client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent("potions/0.1")
        .build()?)
}

/// Import a keyring either from a `KEYS` URL (preferred, may contain
/// multiple concatenated armored keys) or by id from a public keyserver.
pub fn import_keys(gpg_keys_url: Option<&str>, gpg_key_ids: &[String]) -> Result<Vec<SignedPublicKey>> {
    if let Some(url) = gpg_keys_url {
        let body = client()?
            .get(url)
            .send()
            .map_err(|e| Error::SigFailed(e.to_string()))?
            .text()
            .map_err(|e| Error::SigFailed(e.to_string()))?;
        return parse_armored_keyring(&body);
    }

    if gpg_key_ids.is_empty() {
        return Err(Error::SigNoKeys);
    }

    let mut keys = Vec::new();
    for id in gpg_key_ids {
        let url = format!("{DEFAULT_KEYSERVER}/vks/v1/by-fingerprint/{id}");
        let body = client()?
            .get(&url)
            .send()
            .map_err(|e| Error::SigFailed(e.to_string()))?
            .text()
            .map_err(|e| Error::SigFailed(e.to_string()))?;
        keys.extend(parse_armored_keyring(&body)?);
    }

    if keys.is_empty() {
        return Err(Error::SigNoKeys);
    }
    Ok(keys)
}

/// A `KEYS` file may contain multiple concatenated armored public keys.
fn parse_armored_keyring(armored: &str) -> Result<Vec<SignedPublicKey>> {
    let mut keys = Vec::new();
    for block in split_armored_blocks(armored) {
        let (key, _) = SignedPublicKey::from_armor_single(Cursor::new(block.as_bytes()))
            .map_err(|e| Error::SigFailed(e.to_string()))?;
        key.verify().map_err(|e| Error::SigFailed(e.to_string()))?;
        keys.push(key);
    }
    if keys.is_empty() {
        return Err(Error::SigNoKeys);
    }
    Ok(keys)
}

fn split_armored_blocks(armored: &str) -> Vec<String> {
    const BEGIN: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
    const END: &str = "-----END PGP PUBLIC KEY BLOCK-----";
    let mut blocks = Vec::new();
    let mut rest = armored;
    while let Some(start) = rest.find(BEGIN) {
        let Some(end_rel) = rest[start..].find(END) else {
            break;
        };
        let end = start + end_rel + END.len();
        blocks.push(rest[start..end].to_string());
        rest = &rest[end..];
    }
    blocks
}

/// Verify a detached signature's bytes against the original downloaded
/// `payload` bytes, accepting if any key in the keyring verifies it.
pub fn verify_detached(keyring: &[SignedPublicKey], payload: &[u8], signature: &[u8]) -> Result<()> {
    let (sig, _) = StandaloneSignature::from_armor_single(Cursor::new(signature))
        .or_else(|_| StandaloneSignature::from_bytes(Cursor::new(signature)))
        .map_err(|e| Error::SigFailed(format!("parsing detached signature: {e}")))?;

    if keyring
        .iter()
        .any(|key| sig.verify(key, payload).is_ok())
    {
        return Ok(());
    }

    Err(Error::SigFailed("no matching key verified the signature".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_concatenated_armored_blocks() {
        let armored = "-----BEGIN PGP PUBLIC KEY BLOCK-----\nAAA\n-----END PGP PUBLIC KEY BLOCK-----\n-----BEGIN PGP PUBLIC KEY BLOCK-----\nBBB\n-----END PGP PUBLIC KEY BLOCK-----\n";
        let blocks = split_armored_blocks(armored);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("AAA"));
        assert!(blocks[1].contains("BBB"));
    }

    #[test]
    fn import_without_url_or_ids_fails_with_no_keys() {
        let err = import_keys(None, &[]).unwrap_err();
        assert!(matches!(err, Error::SigNoKeys));
    }
}
