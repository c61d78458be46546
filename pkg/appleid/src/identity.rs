use crate::models::{AccountDetails, Claims, IdentityName, IdentityRecord};

/// Builds the identity record of a verified user.
///
/// The id and expiry come from the verified claims. Names only come from
/// the client-supplied account details since the token carries none. The
/// email is taken from the claims when present, else from the account
/// details.
#[must_use]
pub fn resolve(
    claims: &Claims,
    account_details: Option<&AccountDetails>,
    provider: &str,
) -> IdentityRecord {
    let details = account_details.cloned().unwrap_or_default();

    let email = claims
        .email
        .clone()
        .filter(|email| !email.is_empty())
        .or(details.email.filter(|email| !email.is_empty()));

    IdentityRecord {
        id: claims.subject.clone(),
        display_name: details.full_name.unwrap_or_default(),
        name: IdentityName {
            family_name: details.last_name.unwrap_or_default(),
            given_name: details.first_name.unwrap_or_default(),
        },
        emails: email.into_iter().collect(),
        provider: provider.to_string(),
        expires_at: claims.expiry(),
    }
}
