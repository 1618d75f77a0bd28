use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::error::GateError;

/// Retrieves the raw bytes of an image from a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Bytes, GateError>;
}

/// reqwest-backed fetcher with bounded time and body size.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, GateError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.timeout())
            .redirect(reqwest::redirect::Policy::limited(5));
        // only an explicitly configured proxy is used
        builder = match cfg.proxy.as_ref() {
            Some(proxy_url) => builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?),
            None => builder.no_proxy(),
        };
        Ok(Self {
            client: builder.build()?,
            max_bytes: cfg.max_image_bytes,
        })
    }

    fn too_large(&self) -> GateError {
        GateError::FetchFailed(format!("image larger than {} bytes", self.max_bytes))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, GateError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| GateError::FetchFailed(describe(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, %status, "image host returned non-success status");
            return Err(GateError::FetchFailed(format!("upstream status {status}")));
        }
        if resp
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large());
        }

        let mut body = BytesMut::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GateError::FetchFailed(describe(&e)))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        let format = image::guess_format(&body)
            .map_err(|_| GateError::FetchFailed("response is not an image".to_string()))?;
        debug!(%url, bytes = body.len(), ?format, "image fetched");
        Ok(body)
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}
