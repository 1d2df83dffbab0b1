//! Stateless signed tokens for capabilities and leases.
//!
//! A token is `base64url(payload) "." base64url(mac)` where `payload` is the
//! JSON claim and `mac` is HMAC-SHA256 over the kind's salt and the encoded
//! payload. The service keeps no table of issued tokens: a capability token
//! names a resource, a lock token proves a lease until its embedded expiry.
//!
//! Capability and lock tokens are signed under different salts, so one kind
//! never verifies as the other even though both share the server secret.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::clock::Timestamp;

type HmacSha256 = Hmac<Sha256>;

const CAPABILITY_SALT: &[u8] = b"devlab.capability-token";
const LOCK_SALT: &[u8] = b"devlab.lock-token";

/// A token failed to decode.
///
/// Bad encoding, bad JSON and a bad signature are deliberately the same error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("token is malformed or was not issued by this service")]
pub struct InvalidToken;

/// Resource named by a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaim {
	pub endpoint_url: String,
	pub device_id: String,
}

/// Lease proven by a lock token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockClaim {
	pub endpoint_url: String,
	pub device_id: String,
	pub expires_at: Timestamp,
}

/// Signs and verifies capability and lock tokens with one server secret.
#[derive(Clone)]
pub struct TokenCodec {
	secret: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenCodec").finish_non_exhaustive()
	}
}

impl TokenCodec {
	pub fn new(secret: impl AsRef<[u8]>) -> Self {
		Self {
			secret: secret.as_ref().to_vec(),
		}
	}

	pub fn encode_capability(&self, endpoint_url: &str, device_id: &str) -> String {
		let claim = CapabilityClaim {
			endpoint_url: endpoint_url.to_string(),
			device_id: device_id.to_string(),
		};
		self.sign(CAPABILITY_SALT, &claim)
	}

	pub fn decode_capability(&self, token: &str) -> Result<CapabilityClaim, InvalidToken> {
		self.verify(CAPABILITY_SALT, token)
	}

	pub fn encode_lock(&self, endpoint_url: &str, device_id: &str, expires_at: Timestamp) -> String {
		let claim = LockClaim {
			endpoint_url: endpoint_url.to_string(),
			device_id: device_id.to_string(),
			expires_at,
		};
		self.sign(LOCK_SALT, &claim)
	}

	/// Verifies a lock token. Expiry is not checked here; callers compare
	/// [`LockClaim::expires_at`] against their clock.
	pub fn decode_lock(&self, token: &str) -> Result<LockClaim, InvalidToken> {
		self.verify(LOCK_SALT, token)
	}

	fn sign<T: Serialize>(&self, salt: &[u8], claim: &T) -> String {
		let payload = serde_json::to_vec(claim).expect("claims are plain strings and integers");
		let payload = URL_SAFE_NO_PAD.encode(payload);
		let signature = URL_SAFE_NO_PAD.encode(self.mac(salt, payload.as_bytes()).finalize().into_bytes());
		format!("{payload}.{signature}")
	}

	fn verify<T: DeserializeOwned>(&self, salt: &[u8], token: &str) -> Result<T, InvalidToken> {
		let (payload, signature) = token.split_once('.').ok_or(InvalidToken)?;
		let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| InvalidToken)?;
		self.mac(salt, payload.as_bytes())
			.verify_slice(&signature)
			.map_err(|_| InvalidToken)?;

		let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| InvalidToken)?;
		serde_json::from_slice(&payload).map_err(|_| InvalidToken)
	}

	fn mac(&self, salt: &[u8], payload: &[u8]) -> HmacSha256 {
		let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret).expect("HMAC can take key of any size");
		mac.update(salt);
		mac.update(b".");
		mac.update(payload);
		mac
	}
}
