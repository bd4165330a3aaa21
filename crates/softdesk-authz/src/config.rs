//! Authorization configuration.

use softdesk_core::repository::Pagination;
use softdesk_core::validation::MIN_AGE_YEARS;

/// Configuration shared by the authorization services and the principal
/// token adapter.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Minimum age in whole years required at sign-up and on profile
    /// updates that change the birth date (default: 15).
    pub min_age_years: u32,
    /// Page size used when a list call does not supply one (default: 50).
    pub default_page_size: u64,
    /// PEM-encoded Ed25519 private key for principal token signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for principal token verification.
    pub jwt_public_key_pem: String,
    /// Principal token lifetime in seconds (default: 900 = 15 minutes).
    pub token_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
}

impl AuthzConfig {
    /// First page with the configured default size.
    pub fn first_page(&self) -> Pagination {
        Pagination {
            offset: 0,
            limit: self.default_page_size,
        }
    }
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            min_age_years: MIN_AGE_YEARS,
            default_page_size: 50,
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            token_lifetime_secs: 900,
            jwt_issuer: "softdesk".into(),
        }
    }
}
