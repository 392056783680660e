use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies the bearer token of every dish request. Lives in app data.
pub struct AuthGate {
    key: DecodingKey,
    validation: Validation,
}

impl AuthGate {
    pub fn new(secret: &str) -> Self {
        AuthGate {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| AppError::Unauthorized("invalid JWT token"))?;
        Ok(AuthenticatedUser {
            id: data.claims.sub,
        })
    }
}

/// The caller behind a verified token. Taking it as a handler argument is
/// what puts a route behind the gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let gate = req.app_data::<web::Data<AuthGate>>().ok_or_else(|| {
        log::error!("no AuthGate registered, rejecting request");
        AppError::Unauthorized("JWT token not provided")
    })?;
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized("JWT token not provided"))?;
    gate.verify(token.trim())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use actix_web::test::TestRequest;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: u64,
    }

    fn token(secret: &str, exp_offset: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = TestClaims {
            sub: "42".to_string(),
            exp: (now + exp_offset) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_valid_token() {
        let gate = AuthGate::new("secret");
        let user = gate.verify(&token("secret", 3600)).unwrap();
        assert_eq!(user.id, "42");
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let gate = AuthGate::new("secret");
        assert!(gate.verify(&token("other", 3600)).is_err());
        assert!(gate.verify(&token("secret", -3600)).is_err());
        assert!(gate.verify("not-a-jwt").is_err());
    }

    #[test]
    fn reads_the_bearer_header() {
        let req = TestRequest::default()
            .app_data(web::Data::new(AuthGate::new("secret")))
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token("secret", 60))))
            .to_http_request();
        assert_eq!(authenticate(&req).unwrap().id, "42");

        let req = TestRequest::default()
            .app_data(web::Data::new(AuthGate::new("secret")))
            .to_http_request();
        assert!(matches!(
            authenticate(&req),
            Err(AppError::Unauthorized(_))
        ));
    }
}
