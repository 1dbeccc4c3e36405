//! SASL response construction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};

use crate::error::{Error, Result};
use crate::types::Reply;

type HmacMd5 = Hmac<md5::Md5>;

/// Builds the PLAIN response: authorization identity left empty.
pub(crate) fn plain_response(username: &str, password: &str) -> String {
    format!("\0{username}\0{password}")
}

/// Builds the CRAM-MD5 response (RFC 2195) for a `334` challenge.
///
/// The challenge is the Base64 text of the reply; the answer is the
/// username, a space, and the hex HMAC-MD5 of the challenge keyed with the
/// password.
pub(crate) fn cram_md5_response(username: &str, password: &str, challenge: &Reply) -> Result<String> {
    let encoded = challenge.text.first().map_or("", |line| line.trim());
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| Error::UndecodableChallenge)?;

    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| Error::InvalidState(format!("HMAC key rejected: {e}")))?;
    mac.update(&decoded);
    let digest = hex::encode(mac.finalize().into_bytes());

    Ok(format!("{username} {digest}"))
}
