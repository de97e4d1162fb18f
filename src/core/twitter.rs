use crate::config::{TwitterConfig, TwitterCredentials};
use crate::core::{Publisher, RenderedImage};
use crate::utils::error::{BotError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use sha1::Sha1;
use std::time::Duration;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay as-is, everything else is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn oauth_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Signs requests with OAuth 1.0a HMAC-SHA1 user context.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: TwitterCredentials,
}

impl OAuthSigner {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self { credentials }
    }

    pub fn authorization_header(&self, method: &str, url: &Url, form_params: &[(&str, &str)]) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_header_with(method, url, form_params, &nonce, timestamp)
    }

    /// Deterministic variant used by `authorization_header`.
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        form_params: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        let timestamp = timestamp.to_string();
        let oauth_params = [
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut signed: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        signed.extend(form_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        signed.extend(oauth_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base = signature_base_string(method, url, &signed);
        let signature = self.sign(&base)?;

        let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
        header_params.push(("oauth_signature", signature.as_str()));
        header_params.sort();

        let fields: Vec<String> = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", oauth_encode(k), oauth_encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn sign(&self, base: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            oauth_encode(&self.credentials.consumer_secret),
            oauth_encode(&self.credentials.access_token_secret)
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| BotError::ConfigError {
            message: format!("Invalid OAuth signing key: {}", e),
        })?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD&encoded-base-url&encoded-sorted-params`.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut base_url = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base_url.push_str(&format!(":{}", port));
    }
    base_url.push_str(url.path());

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (oauth_encode(k), oauth_encode(v)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        oauth_encode(&base_url),
        oauth_encode(&param_string)
    )
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

/// Uploads media through the v1.1 endpoint and posts through v2.
pub struct TwitterPublisher {
    signer: OAuthSigner,
    upload_endpoint: Url,
    tweet_endpoint: Url,
    client: Client,
}

impl TwitterPublisher {
    pub fn new(config: &TwitterConfig, credentials: TwitterCredentials) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            Url::parse(value).map_err(|e| BotError::InvalidConfigValueError {
                field: field.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            signer: OAuthSigner::new(credentials),
            upload_endpoint: parse("twitter.upload_endpoint", &config.upload_endpoint)?,
            tweet_endpoint: parse("twitter.tweet_endpoint", &config.tweet_endpoint)?,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()?,
        })
    }

    async fn upload_media(&self, image: &RenderedImage) -> Result<String> {
        let bytes = tokio::fs::read(image.path()).await?;
        tracing::debug!("Uploading {} byte widget image", bytes.len());

        let part = Part::bytes(bytes)
            .file_name("weather_widget.png")
            .mime_str("image/png")?;
        let form = Form::new().part("media", part);
        let auth = self
            .signer
            .authorization_header("POST", &self.upload_endpoint, &[])?;

        let response = self
            .client
            .post(self.upload_endpoint.clone())
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await?;
        let uploaded: MediaUploadResponse = check_status(response).await?.json().await?;

        tracing::debug!("Media uploaded with id {}", uploaded.media_id_string);
        Ok(uploaded.media_id_string)
    }

    async fn create_tweet(&self, text: &str, media_id: &str) -> Result<String> {
        let body = serde_json::json!({
            "text": text,
            "media": { "media_ids": [media_id] },
        });
        // JSON bodies are not part of the OAuth signature.
        let auth = self
            .signer
            .authorization_header("POST", &self.tweet_endpoint, &[])?;

        let response = self
            .client
            .post(self.tweet_endpoint.clone())
            .header(AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await?;
        let created: CreateTweetResponse = check_status(response).await?.json().await?;
        Ok(created.data.id)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Rate limit exceeded. Will not retry.");
        return Err(BotError::RateLimited);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BotError::TwitterError {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

#[async_trait::async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, text: &str, image: &RenderedImage) -> Result<String> {
        let media_id = self.upload_media(image).await?;
        let tweet_id = self.create_tweet(text, &media_id).await?;
        tracing::info!("🐦 Tweet posted successfully with image (id {})", tweet_id);
        Ok(tweet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference request from Twitter's "Creating a signature" guide.
    fn reference_signer() -> OAuthSigner {
        OAuthSigner::new(TwitterCredentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        })
    }

    const REFERENCE_STATUS: &str = "Hello Ladies + Gentlemen, a signed OAuth request!";
    const REFERENCE_NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const REFERENCE_TIMESTAMP: i64 = 1318622958;

    #[test]
    fn test_oauth_encode() {
        assert_eq!(oauth_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(oauth_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(oauth_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(oauth_encode("☃"), "%E2%98%83");
        assert_eq!(oauth_encode("a-b.c_d~e"), "a-b.c_d~e");
    }

    #[test]
    fn test_signature_base_string_matches_reference() {
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true").unwrap();
        let params = vec![
            ("include_entities".to_string(), "true".to_string()),
            ("status".to_string(), REFERENCE_STATUS.to_string()),
            ("oauth_consumer_key".to_string(), "xvz1evFS4wEEPTGEFPHBog".to_string()),
            ("oauth_nonce".to_string(), REFERENCE_NONCE.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), REFERENCE_TIMESTAMP.to_string()),
            (
                "oauth_token".to_string(),
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            ),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let base = signature_base_string("post", &url, &params);
        assert!(base.starts_with(
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog"
        ));
        assert!(base.ends_with(
            "oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        ));
    }

    #[test]
    fn test_authorization_header_matches_reference_signature() {
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true").unwrap();
        let header = reference_signer()
            .authorization_header_with(
                "POST",
                &url,
                &[("status", REFERENCE_STATUS)],
                REFERENCE_NONCE,
                REFERENCE_TIMESTAMP,
            )
            .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
    }

    #[test]
    fn test_base_url_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8089/2/tweets").unwrap();
        let base = signature_base_string("POST", &url, &[]);
        assert_eq!(base, "POST&http%3A%2F%2F127.0.0.1%3A8089%2F2%2Ftweets&");
    }

    #[test]
    fn test_fresh_headers_use_unique_nonces() {
        let url = Url::parse("https://api.twitter.com/2/tweets").unwrap();
        let signer = reference_signer();
        let a = signer.authorization_header("POST", &url, &[]).unwrap();
        let b = signer.authorization_header("POST", &url, &[]).unwrap();
        assert_ne!(a, b);
    }
}
