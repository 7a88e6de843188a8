//! When an authorization request needs the user's consent.

use crate::token::OPENID_SCOPE;
use std::collections::BTreeSet;

/// Scopes a principal already granted to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConsent {
    pub client_id: String,
    pub principal_name: String,
    pub scopes: BTreeSet<String>,
}

/// Whether the user must consent to `requested_scopes`.
///
/// Not required when the client does not demand consent, when no scopes
/// are requested, when `openid` is the only one, or when `prior` already
/// covers every requested scope.
pub fn consent_required(
    client_requires_consent: bool,
    requested_scopes: &BTreeSet<String>,
    prior: Option<&AuthorizationConsent>,
) -> bool {
    if !client_requires_consent || requested_scopes.is_empty() {
        return false;
    }
    if requested_scopes.len() == 1 && requested_scopes.contains(OPENID_SCOPE) {
        return false;
    }
    !prior.is_some_and(|consent| consent.scopes.is_superset(requested_scopes))
}
