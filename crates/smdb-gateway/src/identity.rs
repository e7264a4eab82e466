//! Identity provider boundary: bearer tokens in, user records out.
//!
//! Tokens are issued elsewhere; this side only checks the signature and
//! expiry with the shared secret.

use jsonwebtoken::{DecodingKey, Validation, decode};

use smdb_types::api::Claims;
use smdb_types::models::User;

/// The token part of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn decode_claims(token: &str, secret: &str) -> jsonwebtoken::errors::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Resolve a token to the user it was issued for.
pub fn resolve_user(token: &str, secret: &str) -> Option<User> {
    decode_claims(token, secret).ok().map(Claims::into_user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn issue(secret: &str, exp_offset: chrono::Duration) -> (Uuid, String) {
        let sub = Uuid::new_v4();
        let claims = Claims {
            sub,
            username: "gill".into(),
            discriminator: "0420".into(),
            avatar: None,
            is_admin: true,
            is_reviewer: false,
            exp: (chrono::Utc::now() + exp_offset).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        (sub, token)
    }

    #[test]
    fn valid_token_resolves_user_with_roles() {
        let (sub, token) = issue("s3cret", chrono::Duration::hours(1));
        let user = resolve_user(&token, "s3cret").unwrap();
        assert_eq!(user.id, sub);
        assert!(user.is_admin);
        assert!(!user.is_reviewer);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let (_, token) = issue("s3cret", chrono::Duration::hours(1));
        assert!(resolve_user(&token, "other").is_none());

        let (_, expired) = issue("s3cret", chrono::Duration::hours(-2));
        assert!(resolve_user(&expired, "s3cret").is_none());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
