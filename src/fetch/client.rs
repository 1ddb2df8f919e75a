//! Shared HTTP client used by every adapter.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::FetchError;
use super::xml::XmlDocument;
use crate::config::HttpConfig;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A decoded body together with the response metadata adapters care about.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub body: T,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Performs requests and decodes JSON, XML, HTML and raw text bodies.
///
/// Every failure (transport, timeout, non-2xx, decode) is returned to the
/// caller. Deciding whether to degrade is the adapter's job.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build http client");

        Self { client }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.send(url).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get_xml(&self, url: &str) -> Result<Fetched<XmlDocument>, FetchError> {
        let response = self.send(url).await?;
        let last_modified = last_modified(&response);
        let text = response.text().await?;
        let body = XmlDocument::parse_xml(&text)?;

        Ok(Fetched {
            body,
            last_modified,
        })
    }

    pub async fn get_html(&self, url: &str) -> Result<XmlDocument, FetchError> {
        let text = self.get_raw(url).await?;
        Ok(XmlDocument::parse_html(&text))
    }

    /// Body as text, gunzipped first when it is gzip-framed.
    pub async fn get_raw(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send(url).await?;
        let bytes = response.bytes().await?;
        decode_text(&bytes)
    }

    async fn send(&self, url: &str) -> Result<Response, FetchError> {
        debug!(url = %url, "fetching");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}

fn last_modified(response: &Response) -> Option<DateTime<Utc>> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode a body as UTF-8 text, decompressing gzip-framed content.
pub fn decode_text(bytes: &[u8]) -> Result<String, FetchError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        return Ok(String::from_utf8_lossy(&raw).into_owned());
    }

    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fetcher() -> Fetcher {
        Fetcher::new(&HttpConfig::default())
    }

    #[test]
    fn test_decode_plain_text() {
        assert_eq!(decode_text(b"Package: bash").unwrap(), "Package: bash");
    }

    #[test]
    fn test_decode_gzip_text() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Package: bash\n").unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(decode_text(&gz).unwrap(), "Package: bash\n");
    }

    #[tokio::test]
    async fn test_not_found_is_observable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .get_raw(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher()
            .get_json::<serde_json::Value>(&format!("{}/boom", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_get_xml_reads_last_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.pom"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
                    .set_body_string("<project><groupId>g</groupId></project>"),
            )
            .mount(&server)
            .await;

        let fetched = fetcher()
            .get_xml(&format!("{}/a.pom", server.uri()))
            .await
            .unwrap();
        assert_eq!(
            fetched.body.root_element().unwrap().text_at("groupId"),
            Some("g")
        );
        assert_eq!(
            fetched.last_modified.unwrap().to_rfc3339(),
            "2015-10-21T07:28:00+00:00"
        );
    }
}
