use argon2::password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHash};
use chrono::{TimeDelta, Utc};
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::models::{Profile, StaffRole, User};
use crate::{schema, Config, ServiceError};

const MIN_PASSPHRASE_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    exp: usize,
    iat: usize,
    sub: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires: TimeDelta,
}

impl AuthService {
    pub fn new(secret_key: &str, access_token_expires: TimeDelta) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_ref()),
            decoding_key: DecodingKey::from_secret(secret_key.as_ref()),
            access_token_expires,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.secret_key, config.access_token_expires)
    }

    /// Signs up a user. Every new account starts out as an owner without a
    /// restaurant; the restaurant is created on first use.
    pub async fn create_user(
        &self,
        conn: &mut AsyncPgConnection,
        username: &str,
        passphrase: &str,
        full_name: Option<String>,
    ) -> Result<(User, Profile), ServiceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::invalid("username must not be empty"));
        }
        if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(ServiceError::invalid(format!(
                "passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let passphrase_hash = Argon2::default()
            .hash_password(passphrase.as_bytes(), &salt)
            .map_err(|e| ServiceError::Internal(format!("cannot hash passphrase: {e}")))?
            .to_string();

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            passphrase_hash,
            created_at: Utc::now(),
        };
        let profile = Profile {
            user_id: user.id,
            full_name: full_name.filter(|n| !n.trim().is_empty()),
            role: StaffRole::Owner,
            restaurant_id: None,
        };

        let (new_user, new_profile) = (&user, &profile);
        conn.transaction::<_, ServiceError, _>(|conn| {
            async move {
                diesel::insert_into(schema::users::table)
                    .values(new_user)
                    .execute(conn)
                    .await?;
                diesel::insert_into(schema::profiles::table)
                    .values(new_profile)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await?;

        info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok((user, profile))
    }

    pub async fn issue_token(
        &self,
        conn: &mut AsyncPgConnection,
        username: &str,
        passphrase: &str,
    ) -> Result<TokenResponse, ServiceError> {
        let user = schema::users::table
            .select(User::as_select())
            .filter(schema::users::username.eq(username.trim()))
            .first::<User>(conn)
            .await
            .optional()?
            .ok_or(ServiceError::Unauthenticated)?;

        let verified = PasswordHash::new(&user.passphrase_hash)
            .map(|hash| {
                Argon2::default()
                    .verify_password(passphrase.as_bytes(), &hash)
                    .is_ok()
            })
            .unwrap_or(false);
        if !verified {
            return Err(ServiceError::Unauthenticated);
        }

        self.issue_token_for(user.id)
    }

    pub fn issue_token_for(&self, user_id: Uuid) -> Result<TokenResponse, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            exp: (now + self.access_token_expires).timestamp() as usize,
            iat: now.timestamp() as usize,
            sub: user_id.to_string(),
        };
        let access_token =
            jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding_key)
                .map_err(|e| ServiceError::Internal(format!("cannot issue token: {e}")))?;
        Ok(TokenResponse {
            token_type: "bearer".to_string(),
            access_token,
            expires_in: self.access_token_expires.num_seconds(),
        })
    }

    /// Returns the user id the token was issued for.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, ServiceError> {
        let token = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding_key,
            &jsonwebtoken::Validation::default(),
        )
        .map_err(|_| ServiceError::Unauthenticated)?;
        token
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ServiceError::Unauthenticated)
    }
}

pub async fn get_user(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<User, ServiceError> {
    schema::users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound("user"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let service = AuthService::new("test-secret", TimeDelta::hours(8));
        let user_id = Uuid::new_v4();

        let token = service.issue_token_for(user_id).unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 8 * 60 * 60);
        assert_eq!(service.verify_token(&token.access_token).unwrap(), user_id);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = AuthService::new("one-secret", TimeDelta::hours(1));
        let verifier = AuthService::new("another-secret", TimeDelta::hours(1));
        let token = issuer.issue_token_for(Uuid::new_v4()).unwrap();

        assert!(matches!(
            verifier.verify_token(&token.access_token),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            verifier.verify_token("garbage"),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = AuthService::new("test-secret", TimeDelta::hours(-2));
        let token = service.issue_token_for(Uuid::new_v4()).unwrap();
        assert!(service.verify_token(&token.access_token).is_err());
    }
}
