//! SCRAM-SHA-256 SASL mechanism (RFC 7677), gated behind the `scram`
//! feature (`sha2`/`hmac`/`pbkdf2`/`getrandom`).
//!
//! # SCRAM Protocol Flow
//!
//! 1. Client sends `client-first-message`: `n,,n=user,r=nonce`
//! 2. Server sends `server-first-message`: `r=nonce+server,s=salt,i=iterations`
//! 3. Client sends `client-final-message`: `c=biws,r=nonce+server,p=proof`
//! 4. Server sends `server-final-message`: `v=verifier`
//!
//! # Reference
//! - RFC 7677: <https://tools.ietf.org/html/rfc7677>
//! - RFC 5802 (SCRAM): <https://tools.ietf.org/html/rfc5802>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::decode_base64;

type HmacSha256 = Hmac<Sha256>;

/// SCRAM-SHA-256 client state machine.
///
/// # Example
///
/// ```
/// use ircaster::sasl::ScramClient;
///
/// let mut client = ScramClient::new("username", "password");
/// let first_message = client.client_first_message();
/// // Send first_message to server via AUTHENTICATE
/// ```
#[derive(Clone, Debug)]
pub struct ScramClient {
    username: String,
    password: String,
    client_nonce: String,
    client_first_bare: String,
    state: ScramState,
}

/// Internal state of SCRAM authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramState {
    /// Initial state.
    Initial,
    /// Sent client-first, awaiting server-first.
    ClientFirstSent,
    /// Sent client-final, awaiting server-final (`v=...`).
    ClientFinalSent {
        /// Expected `ServerSignature`, base64-encoded, to verify against
        /// the server's `v=` message.
        expected_signature: String,
    },
    /// Authentication complete and server verified.
    Complete,
    /// Authentication failed.
    Failed(String),
}

impl ScramClient {
    /// Create a new SCRAM client with the given credentials.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            client_nonce: generate_nonce(),
            client_first_bare: String::new(),
            state: ScramState::Initial,
        }
    }

    /// Get the current SCRAM state.
    #[must_use]
    pub fn state(&self) -> &ScramState {
        &self.state
    }

    /// Generate the client-first-message.
    ///
    /// This is the first message sent to the server after
    /// `AUTHENTICATE SCRAM-SHA-256`. Returns a base64-encoded message
    /// ready for transmission.
    #[must_use]
    pub fn client_first_message(&mut self) -> String {
        self.client_first_bare = format!("n={},r={}", saslprep(&self.username), self.client_nonce);
        let full = format!("n,,{}", self.client_first_bare);
        self.state = ScramState::ClientFirstSent;
        BASE64.encode(full.as_bytes())
    }

    /// Process the server-first-message and generate client-final-message.
    ///
    /// # Arguments
    ///
    /// * `server_first` - The base64-encoded server-first-message.
    ///
    /// # Returns
    ///
    /// The base64-encoded client-final-message, or an error.
    pub fn process_server_first(&mut self, server_first: &str) -> Result<String, ScramError> {
        if !matches!(self.state, ScramState::ClientFirstSent) {
            return Err(ScramError::UnexpectedMessage);
        }

        let decoded = decode_base64(server_first).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in message.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(decode_base64(value).map_err(|_| ScramError::InvalidEncoding)?);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(value.parse().map_err(|_| ScramError::InvalidIterations)?);
            }
        }

        let nonce = nonce.ok_or(ScramError::MissingNonce)?;
        let salt = salt.ok_or(ScramError::MissingSalt)?;
        let iterations: u32 = iterations.ok_or(ScramError::MissingIterations)?;

        if !nonce.starts_with(&self.client_nonce) {
            return Err(ScramError::NonceMismatch);
        }

        let salted_password = salt_password(self.password.as_bytes(), &salt, iterations);
        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);

        let channel_binding = BASE64.encode("n,,".as_bytes());
        let client_final_no_proof = format!("c={},r={}", channel_binding, nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, message, client_final_no_proof
        );

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        let server_key = hmac_sha256(&salted_password, b"Server Key");
        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes());

        let client_final = format!(
            "{},p={}",
            client_final_no_proof,
            BASE64.encode(&client_proof)
        );

        self.state = ScramState::ClientFinalSent {
            expected_signature: BASE64.encode(server_signature),
        };

        Ok(BASE64.encode(client_final.as_bytes()))
    }

    /// Verify the server-final-message (`v=<ServerSignature>`).
    pub fn verify_server_final(&mut self, server_final: &str) -> Result<(), ScramError> {
        let expected = match &self.state {
            ScramState::ClientFinalSent { expected_signature } => expected_signature.clone(),
            _ => return Err(ScramError::UnexpectedMessage),
        };

        let decoded = decode_base64(server_final).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;
        let verifier = message
            .strip_prefix("v=")
            .ok_or(ScramError::MissingNonce)?;

        if verifier == expected {
            self.state = ScramState::Complete;
            Ok(())
        } else {
            self.state = ScramState::Failed("server signature mismatch".to_string());
            Err(ScramError::ServerVerificationFailed)
        }
    }
}

fn salt_password(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut output = [0u8; 32];
    // Generic `Mac`-parameterized form: always available, unlike the
    // `pbkdf2_hmac` convenience wrapper which is feature-gated.
    pbkdf2::pbkdf2::<HmacSha256>(password, salt, iterations, &mut output);
    output.to_vec()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Errors that can occur during SCRAM authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramError {
    /// Base64 decoding failed.
    InvalidEncoding,
    /// Server nonce doesn't match client nonce prefix.
    NonceMismatch,
    /// Missing nonce in server message.
    MissingNonce,
    /// Missing salt in server message.
    MissingSalt,
    /// Missing iteration count in server message.
    MissingIterations,
    /// Invalid iteration count.
    InvalidIterations,
    /// Server verification failed.
    ServerVerificationFailed,
    /// A message arrived out of the expected client/server-first/final order.
    UnexpectedMessage,
}

impl std::fmt::Display for ScramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "invalid base64 encoding"),
            Self::NonceMismatch => write!(f, "server nonce doesn't match client nonce"),
            Self::MissingNonce => write!(f, "missing nonce in server message"),
            Self::MissingSalt => write!(f, "missing salt in server message"),
            Self::MissingIterations => write!(f, "missing iteration count"),
            Self::InvalidIterations => write!(f, "invalid iteration count"),
            Self::ServerVerificationFailed => write!(f, "server verification failed"),
            Self::UnexpectedMessage => write!(f, "SCRAM message arrived out of order"),
        }
    }
}

impl std::error::Error for ScramError {}

/// Generate a cryptographically random nonce for SCRAM, base64-encoded.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 18];
    getrandom::getrandom(&mut bytes).expect("system RNG must be available");
    BASE64.encode(bytes)
}

/// SASLprep normalization (RFC 4013), restricted to the subset needed for
/// typical usernames: reject embedded commas/NUL (which would corrupt the
/// SCRAM attribute grammar) and leave the rest as-is. Full Unicode
/// normalization (stringprep profile) is not implemented.
fn saslprep(s: &str) -> String {
    s.replace(',', "=2C").replace('=', "=3D")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_message_well_formed() {
        let mut client = ScramClient::new("user", "pencil");
        let msg = client.client_first_message();
        let decoded = BASE64.decode(&msg).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("n,,n=user,r="));
        assert_eq!(*client.state(), ScramState::ClientFirstSent);
    }

    #[test]
    fn full_exchange_round_trips_and_verifies() {
        // Fixture from RFC 5802 §5 (adapted for SHA-256 test vectors is
        // out of scope here; this exercises internal consistency: a
        // server using the same password/salt/iterations must derive
        // the same ServerSignature we expect).
        let password = "pencil";
        let salt = b"QSXCR+Q6sek8bf92".to_vec();
        let iterations = 4096u32;

        let mut client = ScramClient::new("user", password);
        let first = client.client_first_message();
        let first_decoded = String::from_utf8(BASE64.decode(&first).unwrap()).unwrap();
        let client_nonce = first_decoded.rsplit("r=").next().unwrap().to_string();

        let server_nonce = format!("{}SERVERPART", client_nonce);
        let server_first = format!(
            "r={},s={},i={}",
            server_nonce,
            BASE64.encode(&salt),
            iterations
        );
        let server_first_b64 = BASE64.encode(server_first.as_bytes());

        let client_final = client.process_server_first(&server_first_b64).unwrap();
        let client_final_decoded =
            String::from_utf8(BASE64.decode(&client_final).unwrap()).unwrap();
        assert!(client_final_decoded.contains(&format!("r={}", server_nonce)));
        assert!(client_final_decoded.contains("p="));

        // Recompute the expected ServerSignature exactly as a server
        // would, and confirm our stored `expected_signature` agrees.
        let salted = salt_password(password.as_bytes(), &salt, iterations);
        let server_key = hmac_sha256(&salted, b"Server Key");
        let client_first_bare = format!("n=user,r={}", client_nonce);
        let client_final_no_proof = client_final_decoded.split(",p=").next().unwrap();
        let auth_message = format!(
            "{},{},{}",
            client_first_bare, server_first, client_final_no_proof
        );
        let expected_sig = BASE64.encode(hmac_sha256(&server_key, auth_message.as_bytes()));

        let server_final = format!("v={}", expected_sig);
        let server_final_b64 = BASE64.encode(server_final.as_bytes());
        assert!(client.verify_server_final(&server_final_b64).is_ok());
        assert_eq!(*client.state(), ScramState::Complete);
    }

    #[test]
    fn mismatched_server_nonce_rejected() {
        let mut client = ScramClient::new("user", "pencil");
        client.client_first_message();
        let bogus_first = BASE64.encode(b"r=totallywrongnonce,s=AAAA,i=4096");
        assert_eq!(
            client.process_server_first(&bogus_first),
            Err(ScramError::NonceMismatch)
        );
    }

    #[test]
    fn bad_server_final_signature_rejected() {
        let mut client = ScramClient::new("user", "pencil");
        let first = client.client_first_message();
        let first_decoded = String::from_utf8(BASE64.decode(&first).unwrap()).unwrap();
        let client_nonce = first_decoded.rsplit("r=").next().unwrap().to_string();
        let server_first = format!(
            "r={}X,s={},i=4096",
            client_nonce,
            BASE64.encode(b"salt1234")
        );
        client
            .process_server_first(&BASE64.encode(server_first.as_bytes()))
            .unwrap();

        let bad_final = BASE64.encode(b"v=not-the-right-signature");
        assert_eq!(
            client.verify_server_final(&bad_final),
            Err(ScramError::ServerVerificationFailed)
        );
        assert!(matches!(client.state(), ScramState::Failed(_)));
    }
}
