use actix_web::HttpRequest;

use crate::errors::AppError;
use crate::utils::jwt::{self, Claims};

pub const ADMIN_ROLES: &[&str] = &["Admin"];

pub const ACCESS_DENIED_MESSAGE: &str = "Only Admin can Access User Details.";

// Allow the request through only if the caller holds at least one of the
// required role tokens. An absent or invalid caller is always denied.
pub fn require_any_role(req: &HttpRequest, required: &[&str]) -> Result<Claims, AppError> {
    let token = req.headers().get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.split_whitespace().nth(1));

    if let Some(token) = token {
        let claims = jwt::validate_token(token)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

        if has_any_role(&claims.role, required) {
            Ok(claims)
        } else {
            Err(AppError::Forbidden(ACCESS_DENIED_MESSAGE.to_string()))
        }
    } else {
        Err(AppError::Unauthorized("Missing token".to_string()))
    }
}

pub fn has_any_role(role: &str, required: &[&str]) -> bool {
    role.split_whitespace().any(|token| required.contains(&token))
}
