use serde::{Deserialize, Serialize};

use super::repo_types::Admin;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub admin_key: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminAuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub token: String,
    pub admin: Admin,
}
