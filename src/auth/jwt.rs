use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::{Claims, TokenAuthenticator};

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::default();

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

impl TokenAuthenticator for JwtValidator {
    fn authenticate(&self, token: &str) -> Result<String, AppError> {
        let claims = self.validate(token)?;
        claims
            .user_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::Auth("Token carries no user id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: None,
            audience: None,
        }
    }

    fn create_test_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(user_id: Option<&str>, exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            user_id: user_id.map(str::to_string),
            sub: None,
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_valid_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let token = create_test_token(&claims_for(Some("user-123"), 3600), &config.secret);
        let user_id = validator.authenticate(&token).unwrap();

        assert_eq!(user_id, "user-123");
    }

    #[test]
    fn test_invalid_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        assert!(matches!(
            validator.authenticate("invalid-token"),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let validator = JwtValidator::new(&create_test_config());
        let token = create_test_token(&claims_for(Some("user-123"), 3600), "other-secret");

        assert!(validator.authenticate(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);
        // Well past the default leeway
        let token = create_test_token(&claims_for(Some("user-123"), -3600), &config.secret);

        assert!(validator.authenticate(&token).is_err());
    }

    #[test]
    fn test_token_without_user_id() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);
        let token = create_test_token(&claims_for(None, 3600), &config.secret);

        assert!(validator.validate(&token).is_ok());
        assert!(validator.authenticate(&token).is_err());
    }
}
