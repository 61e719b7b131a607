//! A throw-away stand-in for the Trakt API, bound to an ephemeral local port.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
};

pub const TEST_KEY: &str = "test-key";

type Canned = (StatusCode, String);

#[derive(Debug)]
struct Feeds {
    watching: Canned,
    history: Canned,
}

#[derive(Debug)]
pub struct MockTrakt {
    pub base_url: String,
    server: tokio::task::JoinHandle<()>,
}

impl MockTrakt {
    /// Serve the given `(status, body)` pairs for every user's watching and
    /// history feeds. Requests without the expected API headers get a 401.
    pub async fn start(watching: (u16, &str), history: (u16, &str)) -> Self {
        let feeds = Arc::new(Feeds {
            watching: canned(watching),
            history: canned(history),
        });
        let app = Router::new()
            .route("/users/{user}/watching", get(watching_feed))
            .route("/users/{user}/history", get(history_feed))
            .with_state(feeds);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            server,
        }
    }
}

impl Drop for MockTrakt {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn canned((status, body): (u16, &str)) -> Canned {
    (StatusCode::from_u16(status).unwrap(), body.to_owned())
}

async fn watching_feed(State(feeds): State<Arc<Feeds>>, headers: HeaderMap) -> Canned {
    respond(&headers, &feeds.watching)
}

async fn history_feed(State(feeds): State<Arc<Feeds>>, headers: HeaderMap) -> Canned {
    respond(&headers, &feeds.history)
}

fn respond(headers: &HeaderMap, canned: &Canned) -> Canned {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let authorized = header("trakt-api-key") == Some(TEST_KEY)
        && header("trakt-api-version") == Some("2")
        && header("content-type") == Some("application/json");
    if authorized {
        canned.clone()
    } else {
        (StatusCode::UNAUTHORIZED, String::new())
    }
}
