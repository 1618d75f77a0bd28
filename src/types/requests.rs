use serde::Deserialize;

/// Body of `POST /register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /classify`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub url: String,
}

/// Body of `POST /refill`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefillRequest {
    pub username: String,
    pub admin_pw: String,
    pub amount: i64,
}
