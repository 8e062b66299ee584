use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::model::User;
use crate::models::Claims;

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

/// Signs an access token for `user`. The returned claims carry the session id.
pub fn generate_access_token(user: &User, secret: &str, ttl: usize) -> Result<(String, Claims), Error> {
    let issued = now();
    let claims = Claims {
        user_id: user.id.to_string(),
        sub: user.name.clone(),
        role: user.role,
        exp: issued + ttl,
        iat: issued,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
