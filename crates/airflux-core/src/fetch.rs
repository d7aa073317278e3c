use crate::error::{AirfluxError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpFetcher {
    /// GET `url`. Non-2xx statuses are returned, not raised; transport
    /// failures are errors.
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Blocking reqwest client.
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("airflux/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AirfluxError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        tracing::debug!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| AirfluxError::Http(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| AirfluxError::Http(e.to_string()))?
            .to_vec();
        tracing::debug!(status, bytes = body.len(), "response");
        Ok(HttpResponse { status, body })
    }
}
