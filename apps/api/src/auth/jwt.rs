// JWT token creation and verification
// Identity tokens are short-lived (60 minutes) and refreshed by clients

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::league::UserSummary;

/// Lifetime of an identity token
pub const TOKEN_LIFETIME_MINUTES: i64 = 60;

/// JWT claims structure
///
/// # Fields
/// * `sub` - Subject (user_id)
/// * `exp` - Expiry time (seconds since epoch)
/// * `name` / `avatar_url` - Display fields denormalized onto members
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Claims {
    /// The user summary this token vouches for
    pub fn user(&self) -> UserSummary {
        UserSummary {
            id: self.sub,
            display_name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// Seconds until expiry, zero if already expired
    pub fn seconds_remaining(&self) -> u64 {
        let now = Utc::now().timestamp().max(0) as u64;
        (self.exp as u64).saturating_sub(now)
    }
}

/// Creates a JWT token for a user
///
/// # Token Properties
/// - Expires after [`TOKEN_LIFETIME_MINUTES`]
/// - Signed with HS256 algorithm
/// - Contains user_id in 'sub' claim
///
/// # Example
/// ```
/// use chefleague_api::auth::jwt::create_token;
/// use chefleague_api::domain::league::UserSummary;
/// use uuid::Uuid;
///
/// let user = UserSummary::new(Uuid::new_v4());
/// let token = create_token(&user, "your-secret-key").expect("valid token");
/// ```
pub fn create_token(user: &UserSummary, secret: &str) -> Result<String, String> {
    create_token_with_lifetime(user, secret, Duration::minutes(TOKEN_LIFETIME_MINUTES))
}

pub fn create_token_with_lifetime(
    user: &UserSummary,
    secret: &str,
    lifetime: Duration,
) -> Result<String, String> {
    let expiry = Utc::now() + lifetime;
    let claims = Claims {
        sub: user.id,
        exp: expiry.timestamp().max(0) as usize,
        name: user.display_name.clone(),
        avatar_url: user.avatar_url.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| e.to_string())
}

/// Verifies and decodes a JWT token
///
/// # Returns
/// * `Ok(Claims)` - The decoded claims if token is valid
/// * `Err(String)` - If token is invalid or expired
///
/// # Example
/// ```
/// use chefleague_api::auth::jwt::{create_token, verify_token};
/// use chefleague_api::domain::league::UserSummary;
/// use uuid::Uuid;
///
/// let user = UserSummary::new(Uuid::new_v4());
/// let token = create_token(&user, "your-secret-key").unwrap();
///
/// let claims = verify_token(&token, "your-secret-key").expect("valid token");
/// assert_eq!(claims.sub, user.id);
/// ```
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    // No leeway: a live socket is closed exactly at `exp`
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
