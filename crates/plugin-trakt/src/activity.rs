use core::fmt;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::{Map, Value};

/// One entry of a user's watching/history feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Episode {
        show: String,
        season: i32,
        number: i32,
        title: String,
    },
    Movie {
        title: String,
        year: i32,
    },
    /// The entry was `null`, or its `type` was neither `episode` nor `movie`.
    Unknown,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Episode {
                show,
                season,
                number,
                title,
            } => write!(f, "{show} {season:02}x{number:02} - {title}"),
            Self::Movie { title, year } => write!(f, "{title} ({year})"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Deserialize)]
struct Tagged {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

// Trakt sends `null` for titles and years it does not know yet.

#[derive(Deserialize)]
struct EpisodePayload {
    show: Option<ShowDetail>,
    episode: Option<EpisodeDetail>,
}

#[derive(Deserialize)]
struct ShowDetail {
    title: Option<String>,
}

#[derive(Deserialize)]
struct EpisodeDetail {
    season: Option<i32>,
    number: Option<i32>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct MoviePayload {
    movie: Option<MovieDetail>,
}

#[derive(Deserialize)]
struct MovieDetail {
    title: Option<String>,
    year: Option<i32>,
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(Tagged { kind, payload }) = Option::<Tagged>::deserialize(deserializer)? else {
            return Ok(Self::Unknown);
        };
        let payload = Value::Object(payload);

        match kind.as_deref() {
            Some("episode") => {
                let EpisodePayload { show, episode } =
                    serde_json::from_value(payload).map_err(D::Error::custom)?;
                let episode = episode.unwrap_or(EpisodeDetail {
                    season: None,
                    number: None,
                    title: None,
                });
                Ok(Self::Episode {
                    show: show.and_then(|s| s.title).unwrap_or_default(),
                    season: episode.season.unwrap_or_default(),
                    number: episode.number.unwrap_or_default(),
                    title: episode.title.unwrap_or_default(),
                })
            }
            Some("movie") => {
                let MoviePayload { movie } =
                    serde_json::from_value(payload).map_err(D::Error::custom)?;
                let (title, year) = movie.map_or((None, None), |m| (m.title, m.year));
                Ok(Self::Movie {
                    title: title.unwrap_or_default(),
                    year: year.unwrap_or_default(),
                })
            }
            Some(_) | None => Ok(Self::Unknown),
        }
    }
}
