use axum::extract::FromRef;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

#[derive(Clone)]
pub struct JwtKeys {
    #[cfg(test)]
    encoding: jsonwebtoken::EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            #[cfg(test)]
            encoding: jsonwebtoken::EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    /// Verifies `token` and requires it to be an access token.
    pub fn verify_access(&self, token: &str) -> anyhow::Result<Uuid> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims.sub)
    }
}

/// Tokens are minted by the identity provider; signing exists for tests.
#[cfg(test)]
impl JwtKeys {
    /// Issues a token the way the identity provider does.
    pub fn sign(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: time::Duration,
    ) -> anyhow::Result<String> {
        let now = time::OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    #[test]
    fn access_token_roundtrip() {
        let keys = keys("dev-secret", "nutrilens", "nutrilens-users");
        let user_id = Uuid::new_v4();
        let token = keys
            .sign(user_id, TokenKind::Access, Duration::minutes(5))
            .unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "nutrilens");
        assert_eq!(keys.verify_access(&token).unwrap(), user_id);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let keys = keys("dev-secret", "iss", "aud");
        let token = keys
            .sign(Uuid::new_v4(), TokenKind::Refresh, Duration::minutes(5))
            .unwrap();
        let err = keys.verify_access(&token).unwrap_err();
        assert!(err.to_string().contains("not an access token"));
    }

    #[test]
    fn wrong_issuer_audience_or_expiry_is_rejected() {
        let good = keys("same-secret", "good-iss", "good-aud");
        let bad = keys("same-secret", "bad-iss", "bad-aud");
        let token = good
            .sign(Uuid::new_v4(), TokenKind::Access, Duration::minutes(5))
            .unwrap();
        assert!(bad.verify(&token).is_err());

        let expired = good
            .sign(Uuid::new_v4(), TokenKind::Access, Duration::hours(-1))
            .unwrap();
        assert!(good.verify(&expired).is_err());
    }
}
