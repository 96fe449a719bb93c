use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // actor id
    pub name: String,
    pub exp: usize,         // expiration time
    pub iat: usize,         // issued at
    pub token_type: String, // only "access" tokens open the gate
}
