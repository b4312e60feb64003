use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(rename = "originalUrl")]
    pub original_url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortenResponse {
    pub short_url: String,
}
