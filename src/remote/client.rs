//! Queries against the league statistics service.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use crate::config::ApiConfig;
use crate::error::StatsApiError;
use crate::events::{EventKind, GameEvent};

const PLAY_BY_PLAY_SET: &str = "PlayByPlay";

const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Rendition of a highlight clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    #[default]
    Large,
    Medium,
    Small,
}

impl VideoQuality {
    /// Key of this rendition inside a `videoUrls` entry
    fn url_key(&self) -> &'static str {
        match self {
            VideoQuality::Large => "lurl",
            VideoQuality::Medium => "murl",
            VideoQuality::Small => "surl",
        }
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoQuality::Large => "large",
            VideoQuality::Medium => "medium",
            VideoQuality::Small => "small",
        };
        f.write_str(name)
    }
}

impl FromStr for VideoQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "large" | "l" => Ok(VideoQuality::Large),
            "medium" | "m" => Ok(VideoQuality::Medium),
            "small" | "s" => Ok(VideoQuality::Small),
            other => Err(format!("unknown video quality '{}'", other)),
        }
    }
}

/// Highlight clip metadata for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipAsset {
    pub description: Option<String>,
    pub video_url: Option<String>,
}

/// Source of play-by-play tables and clip metadata
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn play_by_play(&self, game_id: &str) -> Result<Vec<GameEvent>, StatsApiError>;
    async fn clip_asset(&self, game_id: &str, event_num: u32) -> Result<ClipAsset, StatsApiError>;
}

/// HTTP client for the stats service.
///
/// Every attempt runs inside a slot of the shared [`RateLimiter`] and every
/// call is wrapped in the [`RetryPolicy`].
pub struct StatsClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    quality: VideoQuality,
}

impl StatsClient {
    pub fn new(config: &ApiConfig) -> Result<Self, StatsApiError> {
        Self::with_limiter(config, Arc::new(RateLimiter::new(config.cooldown())))
    }

    /// Build a client that shares `limiter` with other callers
    pub fn with_limiter(config: &ApiConfig, limiter: Arc<RateLimiter>) -> Result<Self, StatsApiError> {
        let http = reqwest::Client::builder()
            .default_headers(stats_headers())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
            retry: config.retry_policy(),
            quality: config.video_quality,
        })
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, StatsApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let url = url.as_str();

        self.retry
            .run(endpoint, || async move {
                let _slot = self.limiter.acquire().await;
                debug!("GET {} {:?}", url, query);

                let response = self.http.get(url).query(query).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(StatsApiError::Http {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                Ok(serde_json::from_str::<Value>(&body)?)
            })
            .await
    }
}

fn stats_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
    headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
    headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));
    headers
}

#[async_trait]
impl StatsSource for StatsClient {
    async fn play_by_play(&self, game_id: &str) -> Result<Vec<GameEvent>, StatsApiError> {
        let payload = self
            .get_json(
                "playbyplayv2",
                &[
                    ("GameID", game_id.to_string()),
                    ("StartPeriod", "0".to_string()),
                    ("EndPeriod", "0".to_string()),
                ],
            )
            .await?;

        let events = parse_play_by_play(&payload)?;
        info!("📋 Fetched {} play-by-play events for game {}", events.len(), game_id);
        Ok(events)
    }

    async fn clip_asset(&self, game_id: &str, event_num: u32) -> Result<ClipAsset, StatsApiError> {
        let payload = self
            .get_json(
                "videoeventsasset",
                &[
                    ("GameEventID", event_num.to_string()),
                    ("GameID", game_id.to_string()),
                ],
            )
            .await?;

        parse_clip_asset(&payload, self.quality)
    }
}

/// Parse the `PlayByPlay` result set, addressing columns by header name.
pub fn parse_play_by_play(payload: &Value) -> Result<Vec<GameEvent>, StatsApiError> {
    let set = payload
        .get("resultSets")
        .and_then(Value::as_array)
        .and_then(|sets| {
            sets.iter()
                .find(|set| set.get("name").and_then(Value::as_str) == Some(PLAY_BY_PLAY_SET))
        })
        .ok_or_else(|| StatsApiError::schema("no PlayByPlay result set"))?;

    let headers: HashMap<&str, usize> = set
        .get("headers")
        .and_then(Value::as_array)
        .ok_or_else(|| StatsApiError::schema("PlayByPlay result set has no headers"))?
        .iter()
        .enumerate()
        .filter_map(|(index, header)| header.as_str().map(|name| (name, index)))
        .collect();

    let rows = set
        .get("rowSet")
        .and_then(Value::as_array)
        .ok_or_else(|| StatsApiError::schema("PlayByPlay result set has no rowSet"))?;

    rows.iter()
        .map(|row| {
            let row = Row::new(&headers, row)?;
            Ok(GameEvent {
                game_id: row.string("GAME_ID")?,
                event_num: row.number("EVENTNUM")?,
                kind: EventKind::from_code(row.number("EVENTMSGTYPE")?),
                action_type: row.number("EVENTMSGACTIONTYPE")?,
                period: row.number("PERIOD")?,
                clock: row.string("PCTIMESTRING")?,
                home_description: row.optional_string("HOMEDESCRIPTION")?,
                neutral_description: row.optional_string("NEUTRALDESCRIPTION")?,
                visitor_description: row.optional_string("VISITORDESCRIPTION")?,
                video_available: row.number("VIDEO_AVAILABLE_FLAG")? == 1,
            })
        })
        .collect()
}

/// Read the playlist description and the requested rendition URL.
pub fn parse_clip_asset(payload: &Value, quality: VideoQuality) -> Result<ClipAsset, StatsApiError> {
    let sets = payload
        .get("resultSets")
        .filter(|sets| sets.is_object())
        .ok_or_else(|| StatsApiError::schema("videoeventsasset response has no resultSets"))?;

    let video_url = sets
        .pointer("/Meta/videoUrls/0")
        .and_then(|urls| urls.get(quality.url_key()))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let description = sets
        .pointer("/playlist/0/dsc")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ClipAsset {
        description,
        video_url,
    })
}

struct Row<'a> {
    headers: &'a HashMap<&'a str, usize>,
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    fn new(headers: &'a HashMap<&'a str, usize>, row: &'a Value) -> Result<Self, StatsApiError> {
        let cells = row
            .as_array()
            .ok_or_else(|| StatsApiError::schema("PlayByPlay row is not an array"))?;
        Ok(Self { headers, cells })
    }

    fn cell(&self, column: &str) -> Result<&'a Value, StatsApiError> {
        let index = self
            .headers
            .get(column)
            .ok_or_else(|| StatsApiError::schema(format!("missing column {}", column)))?;
        self.cells
            .get(*index)
            .ok_or_else(|| StatsApiError::schema(format!("row too short for column {}", column)))
    }

    fn string(&self, column: &str) -> Result<String, StatsApiError> {
        self.optional_string(column)?
            .ok_or_else(|| StatsApiError::schema(format!("column {} is empty", column)))
    }

    fn optional_string(&self, column: &str) -> Result<Option<String>, StatsApiError> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(StatsApiError::schema(format!(
                "column {} has unexpected value {}",
                column, other
            ))),
        }
    }

    fn number(&self, column: &str) -> Result<u32, StatsApiError> {
        let cell = self.cell(column)?;
        let parsed = match cell {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            StatsApiError::schema(format!("column {} is not a number: {}", column, cell))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn play_by_play_payload() -> Value {
        json!({
            "resource": "playbyplay",
            "resultSets": [
                {
                    "name": "PlayByPlay",
                    "headers": [
                        "GAME_ID", "EVENTNUM", "EVENTMSGTYPE", "EVENTMSGACTIONTYPE", "PERIOD",
                        "WCTIMESTRING", "PCTIMESTRING", "HOMEDESCRIPTION", "NEUTRALDESCRIPTION",
                        "VISITORDESCRIPTION", "SCORE", "VIDEO_AVAILABLE_FLAG"
                    ],
                    "rowSet": [
                        ["0022300001", 2, 12, 0, 1, "7:40 PM", "12:00", null, "Start of 1st Period", null, null, 0],
                        ["0022300001", 7, 1, 42, 1, "7:41 PM", "11:38", "James  Driving Layup (2 PTS)", null, null, "0 - 2", 1]
                    ]
                },
                { "name": "AvailableVideo", "headers": ["VIDEO_AVAILABLE_FLAG"], "rowSet": [[1]] }
            ]
        })
    }

    #[test]
    fn test_parse_play_by_play() {
        let events = parse_play_by_play(&play_by_play_payload()).unwrap();
        assert_eq!(events.len(), 2);

        let layup = &events[1];
        assert_eq!(layup.game_id, "0022300001");
        assert_eq!(layup.event_num, 7);
        assert_eq!(layup.kind, EventKind::MadeShot);
        assert_eq!(layup.action_type, 42);
        assert_eq!(layup.clock, "11:38");
        assert_eq!(layup.home_description.as_deref(), Some("James  Driving Layup (2 PTS)"));
        assert_eq!(layup.visitor_description, None);
        assert!(layup.video_available);
        assert!(!events[0].video_available);
    }

    #[test]
    fn test_parse_play_by_play_missing_set() {
        let err = parse_play_by_play(&json!({ "resultSets": [] })).unwrap_err();
        assert!(matches!(err, StatsApiError::Schema(_)));
    }

    #[test]
    fn test_parse_play_by_play_missing_column() {
        let payload = json!({
            "resultSets": [{ "name": "PlayByPlay", "headers": ["GAME_ID"], "rowSet": [["1"]] }]
        });
        let err = parse_play_by_play(&payload).unwrap_err();
        assert!(err.to_string().contains("EVENTNUM"));
    }

    #[test]
    fn test_parse_clip_asset_by_quality() {
        let payload = json!({
            "resultSets": {
                "Meta": { "videoUrls": [{
                    "uuid": "abc",
                    "lurl": "https://videos.test/large.mp4",
                    "murl": "https://videos.test/medium.mp4",
                    "surl": "https://videos.test/small.mp4"
                }]},
                "playlist": [{ "gi": "0022300001", "ei": 7, "dsc": "James 1' Driving Layup (2 PTS)" }]
            }
        });

        let large = parse_clip_asset(&payload, VideoQuality::Large).unwrap();
        assert_eq!(large.video_url.as_deref(), Some("https://videos.test/large.mp4"));
        assert_eq!(large.description.as_deref(), Some("James 1' Driving Layup (2 PTS)"));

        let small = parse_clip_asset(&payload, VideoQuality::Small).unwrap();
        assert_eq!(small.video_url.as_deref(), Some("https://videos.test/small.mp4"));
    }

    #[test]
    fn test_parse_clip_asset_without_video() {
        let payload = json!({ "resultSets": { "Meta": { "videoUrls": [] }, "playlist": [] } });
        let asset = parse_clip_asset(&payload, VideoQuality::Large).unwrap();
        assert_eq!(asset.video_url, None);
        assert_eq!(asset.description, None);
    }

    #[test]
    fn test_video_quality_from_str() {
        assert_eq!("Medium".parse::<VideoQuality>().unwrap(), VideoQuality::Medium);
        assert_eq!("s".parse::<VideoQuality>().unwrap(), VideoQuality::Small);
        assert!("huge".parse::<VideoQuality>().is_err());
    }
}
