use core::time::Duration;

use reqwest::{
    Client, Response, StatusCode, Url,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::activity::Activity;
use crate::error::ResolveError;

pub const DEFAULT_BASE_URL: &str = "https://api.trakt.tv";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const API_VERSION: &str = "2";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct TraktConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl TraktConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for the public Trakt API.
///
/// Every lookup is a fresh pair of requests; nothing is cached.
#[derive(Debug, Clone)]
pub struct TraktClient {
    http: Client,
    base_url: Url,
    api_key: HeaderValue,
}

impl TraktClient {
    pub fn new(config: TraktConfig) -> Result<Self, ResolveError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ResolveError::Setup(format!("invalid base URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ResolveError::Setup(format!(
                "base URL {} cannot carry a path",
                config.base_url
            )));
        }

        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| ResolveError::Setup(format!("invalid API key: {e}")))?;
        api_key.set_sensitive(true);

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResolveError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Describe what `user` is watching right now, or failing that, what they
    /// watched last.
    ///
    /// A missing or private profile is a normal answer, not an error.
    pub async fn resolve(&self, user: &str) -> Result<String, ResolveError> {
        let url = self.user_url(user, "watching");
        let resp = self.fetch(&url).await?;
        let status = resp.status();
        debug!(%user, %status, "Trakt watching response");

        // 204 means nothing is playing; any non-2xx also falls through to history
        if status.is_success() && status != StatusCode::NO_CONTENT {
            let activity: Activity = decode(&url, resp).await?;
            return Ok(format!("{user} is watching: {activity}"));
        }

        let url = self.user_url(user, "history");
        let resp = self.fetch(&url).await?;
        let status = resp.status();
        debug!(%user, %status, "Trakt history response");
        if status != StatusCode::OK {
            return Ok(format!("User {user} not found"));
        }

        let history: Vec<Activity> = decode(&url, resp).await?;
        Ok(history.first().map_or_else(
            || format!("{user} has not watched anything"),
            |latest| format!("{user} last watched: {latest}"),
        ))
    }

    fn user_url(&self, user: &str, feed: &str) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects bases that cannot take path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["users", user, feed]);
        }
        url
    }

    async fn fetch(&self, url: &Url) -> Result<Response, ResolveError> {
        self.http
            .get(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("trakt-api-version", API_VERSION)
            .header("trakt-api-key", self.api_key.clone())
            .send()
            .await
            .map_err(|source| ResolveError::Network {
                url: url.to_string(),
                source,
            })
    }
}

async fn decode<T: DeserializeOwned>(url: &Url, resp: Response) -> Result<T, ResolveError> {
    let body = resp.bytes().await.map_err(|source| ResolveError::Network {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&body).map_err(|source| ResolveError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTrakt, TEST_KEY};

    const MOVIE: &str = r#"{"type":"movie","movie":{"title":"Up","year":2009}}"#;
    const MOVIE_HISTORY: &str = r#"[{"type":"movie","movie":{"title":"Up","year":2009}}]"#;
    const EPISODE: &str =
        r#"{"type":"episode","show":{"title":"X"},"episode":{"season":1,"number":3,"title":"Y"}}"#;

    fn client(base_url: &str) -> TraktClient {
        TraktClient::new(TraktConfig {
            base_url: base_url.to_owned(),
            ..TraktConfig::new(TEST_KEY)
        })
        .unwrap()
    }

    #[tokio::test]
    async fn watching_episode() {
        let mock = MockTrakt::start((200, EPISODE), (200, "[]")).await;
        let out = client(&mock.base_url).resolve("sean").await.unwrap();
        assert_eq!(out, "sean is watching: X 01x03 - Y");
    }

    #[tokio::test]
    async fn nothing_playing_and_empty_history() {
        let mock = MockTrakt::start((204, ""), (200, "[]")).await;
        let out = client(&mock.base_url).resolve("sean").await.unwrap();
        assert_eq!(out, "sean has not watched anything");
    }

    #[tokio::test]
    async fn nothing_playing_falls_back_to_history() {
        let mock = MockTrakt::start((204, ""), (200, MOVIE_HISTORY)).await;
        let out = client(&mock.base_url).resolve("sean").await.unwrap();
        assert_eq!(out, "sean last watched: Up (2009)");
    }

    #[tokio::test]
    async fn history_takes_first_entry() {
        let history = format!("[{EPISODE},{MOVIE}]");
        let mock = MockTrakt::start((204, ""), (200, &history)).await;
        let out = client(&mock.base_url).resolve("sean").await.unwrap();
        assert_eq!(out, "sean last watched: X 01x03 - Y");
    }

    #[tokio::test]
    async fn missing_user_is_not_an_error() {
        let mock = MockTrakt::start((404, ""), (404, "")).await;
        let out = client(&mock.base_url).resolve("nobody").await.unwrap();
        assert_eq!(out, "User nobody not found");
    }

    #[tokio::test]
    async fn watching_error_status_falls_back_to_history() {
        let mock = MockTrakt::start((401, "not json"), (200, MOVIE_HISTORY)).await;
        let out = client(&mock.base_url).resolve("sean").await.unwrap();
        assert_eq!(out, "sean last watched: Up (2009)");
    }

    #[tokio::test]
    async fn malformed_watching_body_is_decode_error() {
        let mock = MockTrakt::start((200, "{not json"), (200, "[]")).await;
        let err = client(&mock.base_url).resolve("sean").await.unwrap_err();
        assert!(matches!(err, ResolveError::Decode { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_history_body_is_decode_error() {
        let mock = MockTrakt::start((204, ""), (200, r#"{"type":"movie"}"#)).await;
        let err = client(&mock.base_url).resolve("sean").await.unwrap_err();
        assert!(matches!(err, ResolveError::Decode { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn sends_api_headers() {
        let mock = MockTrakt::start((200, EPISODE), (200, MOVIE_HISTORY)).await;
        let wrong_key = TraktClient::new(TraktConfig {
            base_url: mock.base_url.clone(),
            ..TraktConfig::new("wrong-key")
        })
        .unwrap();
        // the mock answers 401 on both feeds without the right key
        let out = wrong_key.resolve("sean").await.unwrap();
        assert_eq!(out, "User sean not found");
    }

    #[tokio::test]
    async fn unreachable_api_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"))
            .resolve("sean")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Network { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn silent_api_times_out_as_network_error() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = TraktClient::new(TraktConfig {
            base_url: format!("http://{addr}"),
            timeout: Duration::from_millis(200),
            ..TraktConfig::new(TEST_KEY)
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = client.resolve("sean").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        let ResolveError::Network { source, .. } = &err else {
            panic!("expected a network error, got {err:?}");
        };
        assert!(source.is_timeout(), "{source:?}");
        server.abort();
    }

    #[test]
    fn default_timeout_is_set() {
        assert_eq!(TraktConfig::new(TEST_KEY).timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn user_url_encodes_the_name() {
        let c = client("https://api.trakt.tv");
        assert_eq!(
            c.user_url("sean", "history").as_str(),
            "https://api.trakt.tv/users/sean/history"
        );
        assert_eq!(
            c.user_url("a b/c", "watching").as_str(),
            "https://api.trakt.tv/users/a%20b%2Fc/watching"
        );

        let prefixed = client("http://localhost:8080/trakt/");
        assert_eq!(
            prefixed.user_url("sean", "watching").as_str(),
            "http://localhost:8080/trakt/users/sean/watching"
        );
    }

    #[test]
    fn rejects_bad_setup() {
        assert!(matches!(
            TraktClient::new(TraktConfig {
                base_url: "not a url".to_owned(),
                ..TraktConfig::new(TEST_KEY)
            }),
            Err(ResolveError::Setup(_))
        ));
        assert!(matches!(
            TraktClient::new(TraktConfig::new("bad\nkey")),
            Err(ResolveError::Setup(_))
        ));
    }
}
