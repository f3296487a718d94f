use serde::{Deserialize, Serialize};

/// Body of the personal access-token exchange.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest {
    pub secret: String,
    pub validity_in_minutes: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}
