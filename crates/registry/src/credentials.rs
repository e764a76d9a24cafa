//! Node credential issuance.
//!
//! Approving a deployment issues, exactly once:
//! - a node id `node_<32 hex>`
//! - a fresh secp256k1 node key; its private half is the secret key
//! - a 32-byte API key
//! - a TOML setup package bundling the above for the operator
//!
//! Only [`IssuedCredentials`] is retained: the public key plus one-way
//! digests of the API key and secret key.

use std::fmt;

use l2core_crypto::{keccak256_concat, secret_digest, PrivateKey};
use l2core_types::{DeploymentId, ValidatorId, H256};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::types::DeploymentRequest;

/// Prefix of generated node ids
pub const NODE_ID_PREFIX: &str = "node_";

/// Credentials handed to the operator once, on approval
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct NodeCredentials {
    /// Node identifier
    pub node_id: String,
    /// Compressed secp256k1 public key, hex
    pub public_key: String,
    /// API key, 32 bytes hex
    pub api_key: String,
    /// Node private key, 32 bytes hex
    pub secret_key: String,
    /// Human-readable TOML bundle of all of the above
    pub setup_package: String,
}

impl fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("node_id", &self.node_id)
            .field("public_key", &self.public_key)
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// What the registry keeps after issuing credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredentials {
    /// Deployment the credentials were issued for
    pub deployment_id: DeploymentId,
    /// Validator they authenticate
    pub validator_id: ValidatorId,
    /// Node identifier
    pub node_id: String,
    /// Compressed public key, hex
    pub public_key: String,
    /// Digest of the API key
    pub api_key_hash: H256,
    /// Digest of the secret key
    pub secret_key_hash: H256,
    /// Unix milliseconds
    pub issued_at: u64,
    /// Unix milliseconds of the last successful authentication
    #[serde(default)]
    pub last_seen: Option<u64>,
}

impl IssuedCredentials {
    /// Hash recorded on the deployment request
    pub fn binding_hash(&self) -> H256 {
        keccak256_concat(&[
            &self.deployment_id.0.to_be_bytes(),
            self.validator_id.as_bytes(),
            self.node_id.as_bytes(),
            self.public_key.as_bytes(),
            self.api_key_hash.as_bytes(),
            self.secret_key_hash.as_bytes(),
        ])
    }
}

/// Generates node credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialIssuer;

impl CredentialIssuer {
    /// Create an issuer
    pub fn new() -> Self {
        Self
    }

    /// Issue fresh credentials for an approved request.
    pub fn issue(&self, request: &DeploymentRequest) -> (NodeCredentials, IssuedCredentials) {
        let node_id = format!("{}{}", NODE_ID_PREFIX, random_hex::<16>());
        let node_key = PrivateKey::random();
        let public_key = node_key.public_key().to_hex_compressed();
        let secret_key = node_key.to_hex();
        let api_key = Zeroizing::new(random_hex::<32>());

        let issued = IssuedCredentials {
            deployment_id: request.id,
            validator_id: request.validator_id.clone(),
            node_id: node_id.clone(),
            public_key: public_key.clone(),
            api_key_hash: secret_digest(api_key.as_bytes()),
            secret_key_hash: secret_digest(secret_key.as_bytes()),
            issued_at: crate::registry::unix_millis(),
            last_seen: None,
        };

        let setup_package = setup_package(&issued, &api_key, &secret_key);
        let credentials = NodeCredentials {
            node_id,
            public_key,
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            setup_package,
        };

        (credentials, issued)
    }
}

/// `N` random bytes from the OS, hex encoded
pub(crate) fn random_hex<const N: usize>() -> String {
    let mut bytes = Zeroizing::new([0u8; N]);
    OsRng.fill_bytes(&mut bytes[..]);
    hex::encode(&bytes[..])
}

fn setup_package(issued: &IssuedCredentials, api_key: &str, secret_key: &str) -> String {
    format!(
        r#"# L2 Core validator node setup
# Shown once. The api_key and secret_key cannot be recovered from the network.

[node]
node_id = "{node_id}"
validator_id = "{validator_id}"
deployment_id = {deployment_id}
public_key = "{public_key}"

[auth]
api_key = "{api_key}"
secret_key = "{secret_key}"

[instructions]
steps = [
    "Install the l2core binary on the validator host",
    "Store this file with owner-only permissions (chmod 600)",
    "Import secret_key into an encrypted keystore and delete the plaintext copy",
    "Start the node with: l2core start --config l2core.toml",
    "Authenticate to the network with node_id and api_key",
]
security = [
    "Never share secret_key or api_key",
    "Lost keys cannot be reissued; request a new deployment instead",
    "Contact an administrator immediately if this file is exposed",
]
"#,
        node_id = issued.node_id,
        validator_id = issued.validator_id,
        deployment_id = issued.deployment_id,
        public_key = issued.public_key,
        api_key = api_key,
        secret_key = secret_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeploymentConfig, DeploymentStatus};
    use l2core_crypto::digest_eq;
    use l2core_types::AccountId;

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            id: DeploymentId(7),
            account: AccountId::new([1; 20]),
            validator_id: ValidatorId::new("alpha").unwrap(),
            config: DeploymentConfig::default(),
            status: DeploymentStatus::Pending,
            credentials_hash: None,
            created_at: 0,
            decided_at: None,
            decided_by: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn test_issue_shapes() {
        let (creds, issued) = CredentialIssuer::new().issue(&request());

        assert!(creds.node_id.starts_with(NODE_ID_PREFIX));
        assert_eq!(creds.node_id.len(), NODE_ID_PREFIX.len() + 32);
        assert_eq!(creds.api_key.len(), 64);
        assert_eq!(creds.secret_key.len(), 64);
        assert_eq!(creds.public_key.len(), 66);
        assert_eq!(issued.node_id, creds.node_id);
        assert_eq!(issued.deployment_id, DeploymentId(7));
    }

    #[test]
    fn test_retained_record_has_digests_only() {
        let (creds, issued) = CredentialIssuer::new().issue(&request());

        assert!(digest_eq(&issued.api_key_hash, &secret_digest(creds.api_key.as_bytes())));
        assert!(digest_eq(
            &issued.secret_key_hash,
            &secret_digest(creds.secret_key.as_bytes())
        ));

        let json = serde_json::to_string(&issued).unwrap();
        assert!(!json.contains(&creds.api_key));
        assert!(!json.contains(&creds.secret_key));
    }

    #[test]
    fn test_secret_key_matches_public_key() {
        let (creds, _) = CredentialIssuer::new().issue(&request());
        let key = PrivateKey::from_hex(&creds.secret_key).unwrap();
        assert_eq!(key.public_key().to_hex_compressed(), creds.public_key);
    }

    #[test]
    fn test_each_issue_is_fresh() {
        let issuer = CredentialIssuer::new();
        let (a, _) = issuer.issue(&request());
        let (b, _) = issuer.issue(&request());
        assert_ne!(a.node_id, b.node_id);
        assert_ne!(a.api_key, b.api_key);
        assert_ne!(a.secret_key, b.secret_key);
    }

    #[test]
    fn test_setup_package_is_toml() {
        let (creds, _) = CredentialIssuer::new().issue(&request());
        let parsed: toml::Value = toml::from_str(&creds.setup_package).unwrap();

        assert_eq!(parsed["node"]["node_id"].as_str(), Some(creds.node_id.as_str()));
        assert_eq!(parsed["node"]["validator_id"].as_str(), Some("alpha"));
        assert_eq!(parsed["auth"]["api_key"].as_str(), Some(creds.api_key.as_str()));
        assert!(parsed["instructions"]["steps"].as_array().unwrap().len() >= 3);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let (creds, _) = CredentialIssuer::new().issue(&request());
        let debug = format!("{:?}", creds);
        assert!(!debug.contains(&creds.api_key));
        assert!(!debug.contains(&creds.secret_key));
    }
}
