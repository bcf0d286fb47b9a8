//! Page retrieval.
//!
//! [`Fetch`] is the seam between the crawl and the network: the scheduler and
//! the pagination walker only ever see a `Fetch` implementation, which lets
//! tests drive a whole crawl from memory. [`HttpFetcher`] is the production
//! implementation on top of `reqwest`.
//!
//! There is no retry and no timeout here. A failed fetch is terminal for its
//! URL in the current run.

use crate::errors::FetchError;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use std::future::Future;
use tracing::{debug, instrument};

/// Retrieve the HTML body of a page.
pub trait Fetch: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetch `url` and parse it into a traversable document.
pub async fn fetch_document<F: Fetch>(fetcher: &F, url: &str) -> Result<Html, FetchError> {
    let body = fetcher.get(url).await?;
    Ok(Html::parse_document(&body))
}

/// [`Fetch`] over HTTP GET with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Servers that omit the header are given the benefit of the doubt.
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("html") {
                return Err(FetchError::NotHtml {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        // Undecodable bytes are replaced rather than rejected.
        let body = response.text().await.map_err(transport)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}
