use crate::registry::Error;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct BearerToken {
    token: Option<String>,
    access_token: Option<String>,
    #[serde(default = "BearerToken::default_expires_in")]
    expires_in: u64,
}

impl BearerToken {
    fn default_expires_in() -> u64 {
        60
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(slice)?)
    }

    pub fn ttl(&self) -> u64 {
        self.expires_in
    }

    pub fn token(mut self) -> Result<String, Error> {
        self.token.take().or(self.access_token.take()).ok_or_else(|| {
            Error::Unauthorized("Missing token in authentication response".to_string())
        })
    }
}
