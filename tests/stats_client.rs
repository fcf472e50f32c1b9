use serde_json::{json, Value};
use shot_clips::config::ConfigBuilder;
use shot_clips::error::StatsApiError;
use shot_clips::events::EventKind;
use shot_clips::remote::{StatsClient, StatsSource, VideoQuality};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GAME_ID: &str = "0022300001";

fn client(server: &MockServer) -> StatsClient {
    let config = ConfigBuilder::new()
        .with_base_url(server.uri())
        .with_retry(5, 1, 2)
        .with_cooldown_ms(0)
        .build();
    StatsClient::new(&config.api).unwrap()
}

fn play_by_play() -> Value {
    json!({
        "resultSets": [{
            "name": "PlayByPlay",
            "headers": [
                "GAME_ID", "EVENTNUM", "EVENTMSGTYPE", "EVENTMSGACTIONTYPE", "PERIOD",
                "PCTIMESTRING", "HOMEDESCRIPTION", "NEUTRALDESCRIPTION", "VISITORDESCRIPTION",
                "VIDEO_AVAILABLE_FLAG"
            ],
            "rowSet": [
                [GAME_ID, 1, 12, 0, 1, "12:00", null, "Start of 1st Period", null, 0],
                [GAME_ID, 4, 2, 1, 1, "11:42", null, null, "MISS Tatum 26' 3PT Jump Shot", 1],
                [GAME_ID, 5, 4, 0, 1, "11:40", "Davis REBOUND (Off:0 Def:1)", null, null, 1]
            ]
        }]
    })
}

#[tokio::test]
async fn fetches_play_by_play_with_stats_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .and(query_param("GameID", GAME_ID))
        .and(query_param("StartPeriod", "0"))
        .and(header("x-nba-stats-origin", "stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(play_by_play()))
        .expect(1)
        .mount(&server)
        .await;

    let events = client(&server).play_by_play(GAME_ID).await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[1].kind, EventKind::MissedShot);
    assert_eq!(events[1].visitor_description.as_deref(), Some("MISS Tatum 26' 3PT Jump Shot"));
    assert_eq!(events[2].kind, EventKind::Rebound);
}

#[tokio::test]
async fn retries_server_errors_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(play_by_play()))
        .expect(1)
        .mount(&server)
        .await;

    let events = client(&server).play_by_play(GAME_ID).await.unwrap();
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn retries_undecodable_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(play_by_play()))
        .mount(&server)
        .await;

    assert!(client(&server).play_by_play(GAME_ID).await.is_ok());
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let err = client(&server).play_by_play(GAME_ID).await.unwrap_err();
    assert!(matches!(err, StatsApiError::Http { status: 503, .. }));
}

#[tokio::test]
async fn schema_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playbyplayv2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSets": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).play_by_play(GAME_ID).await.unwrap_err();
    assert!(matches!(err, StatsApiError::Schema(_)));
}

#[tokio::test]
async fn fetches_clip_asset_for_configured_quality() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videoeventsasset"))
        .and(query_param("GameEventID", "4"))
        .and(query_param("GameID", GAME_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultSets": {
                "Meta": { "videoUrls": [{
                    "lurl": "https://videos.test/4_large.mp4",
                    "murl": "https://videos.test/4_medium.mp4",
                    "surl": "https://videos.test/4_small.mp4"
                }]},
                "playlist": [{ "dsc": "MISS Tatum 26' 3PT Jump Shot" }]
            }
        })))
        .mount(&server)
        .await;

    let mut config = ConfigBuilder::new()
        .with_base_url(server.uri())
        .with_cooldown_ms(0)
        .build();
    config.api.video_quality = VideoQuality::Medium;
    let client = StatsClient::new(&config.api).unwrap();

    let asset = client.clip_asset(GAME_ID, 4).await.unwrap();
    assert_eq!(asset.video_url.as_deref(), Some("https://videos.test/4_medium.mp4"));
    assert_eq!(asset.description.as_deref(), Some("MISS Tatum 26' 3PT Jump Shot"));
}
