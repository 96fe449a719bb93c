use actix_web::HttpRequest;

use super::jwt::validate_token;
use super::model::Claims;
use crate::editor::AccessProvider;

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
}

/// Access capability of one request: present when it carries a valid
/// access token.
#[derive(Debug, Clone, Default)]
pub struct ActorAccess {
    claims: Option<Claims>,
}

impl ActorAccess {
    pub fn from_request(req: &HttpRequest, secret: &str) -> Self {
        let Some(token) = extract_token(req) else {
            return Self::default();
        };

        let claims = match validate_token(secret, token) {
            Ok(claims) if claims.token_type == "access" => Some(claims),
            Ok(claims) => {
                log::warn!("Rejected token of type '{}'", claims.token_type);
                None
            }
            Err(e) => {
                log::warn!("Token validation failed: {:?}", e);
                None
            }
        };
        Self { claims }
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.sub.as_str())
    }
}

impl AccessProvider for ActorAccess {
    fn has_actor(&self) -> bool {
        self.claims.is_some()
    }
}
