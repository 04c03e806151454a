//! API integration tests.
//!
//! The router is exercised in-process with `tower::ServiceExt::oneshot`
//! against an in-memory directory and a recording mailer, so these cover the
//! full handler path: token checks, record reshaping, feed encoding, and the
//! exact wire responses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration as TokenTtl, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use greenroom::config::Config;
use greenroom::email::Mailer;
use greenroom::rate_limit::{MemoryStore, RateLimiter};
use greenroom::routes;
use greenroom::state::AppState;
use greenroom::store::{Directory, SessionFilter, SessionRecord, SpeakerRecord};
use greenroom_core::{FeedBuilder, TokenSigner};

const TEST_SECRET: &[u8] = b"integration-test-secret";
const TEST_API_KEY: &str = "integration-test-api-key";

struct FakeDirectory {
    sessions: Vec<SessionRecord>,
    speakers: Vec<SpeakerRecord>,
    sessions_by_speaker: HashMap<String, Vec<String>>,
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<SessionRecord>> {
        let sessions = match &filter.speaker_name {
            None => self.sessions.clone(),
            Some(name) => {
                let ids = self.sessions_by_speaker.get(name).cloned().unwrap_or_default();
                self.sessions
                    .iter()
                    .filter(|session| ids.contains(&session.id))
                    .cloned()
                    .collect()
            }
        };
        Ok(sessions)
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn get_speaker(&self, id: &str) -> Result<Option<SpeakerRecord>> {
        Ok(self.speakers.iter().find(|s| s.id == id).cloned())
    }

    async fn find_speakers_by_email(&self, email: &str) -> Result<Vec<SpeakerRecord>> {
        let needle = email.to_lowercase();
        Ok(self
            .speakers
            .iter()
            .filter(|speaker| {
                speaker
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase() == needle)
                    || speaker
                        .assistant_email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase() == needle)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_login_link(&self, to: &str, link: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), link.to_string()));
        Ok(())
    }
}

fn session(id: &str, name: &str, start: Option<&str>, end: Option<&str>) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        name: Some(name.to_string()),
        description: None,
        start_time: start.map(str::to_string),
        end_time: end.map(str::to_string),
        stage: Some("Stage A".to_string()),
    }
}

fn fixture_directory() -> FakeDirectory {
    let sessions = vec![
        session(
            "s1",
            "Keynote",
            Some("2025-12-11T09:00:00Z"),
            Some("2025-12-11T09:30:00Z"),
        ),
        session(
            "s2",
            "Rust Workshop",
            Some("2025-12-11T10:00:00Z"),
            Some("2025-12-11T11:00:00Z"),
        ),
        // Not yet scheduled: excluded from feeds, 400 when fetched directly.
        session("s3", "TBD Panel", Some("2025-12-12T09:00:00Z"), None),
    ];

    let speakers = vec![SpeakerRecord {
        id: "spk1".to_string(),
        name: "Ada Lovelace".to_string(),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        assistant_email: None,
        job_title: Some("Engineer".to_string()),
        company: None,
    }];

    let mut sessions_by_speaker = HashMap::new();
    sessions_by_speaker.insert("Ada Lovelace".to_string(), vec!["s1".to_string()]);

    FakeDirectory {
        sessions,
        speakers,
        sessions_by_speaker,
    }
}

struct TestApp {
    router: Router,
    signer: TokenSigner,
    mailer: Arc<RecordingMailer>,
}

fn test_app() -> TestApp {
    test_app_with(fixture_directory())
}

fn test_app_with(directory: FakeDirectory) -> TestApp {
    let mut config = Config::default();
    config.secrets.site_secret = String::from_utf8(TEST_SECRET.to_vec()).unwrap();
    config.secrets.api_key = TEST_API_KEY.to_string();
    config.feed.title_prefix = Some("DevConf 2025".to_string());

    let signer = TokenSigner::new(TEST_SECRET).unwrap();
    let feed = FeedBuilder {
        uid_domain: config.feed.uid_domain.clone(),
        product_id: config.feed.product_id.clone(),
        title_prefix: config.feed.title_prefix.clone(),
        default_location: config.feed.default_location.clone(),
    };
    let mailer = Arc::new(RecordingMailer::default());
    // Wide window so a test never straddles a window boundary.
    let limiter = RateLimiter::new(
        Box::new(MemoryStore::default()),
        2,
        Duration::from_secs(3600),
    );

    let state = AppState {
        config: Arc::new(config),
        signer: Arc::new(signer.clone()),
        feed: Arc::new(feed),
        directory: Arc::new(directory),
        mailer: mailer.clone(),
        limiter: Arc::new(limiter),
    };

    TestApp {
        router: routes::router(state),
        signer,
        mailer,
    }
}

impl TestApp {
    fn token(&self, scope: &str, subject: Option<&str>) -> String {
        self.signer
            .issue(Utc::now() + TokenTtl::hours(1), scope, subject)
            .unwrap()
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        into_parts(response).await
    }

    async fn get_full(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(
        &self,
        uri: &str,
        api_key: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        into_parts(response).await
    }

    async fn post_form(&self, uri: &str, form: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        into_parts(response).await
    }
}

async fn into_parts(response: axum::response::Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn missing_key_is_generic_401() {
    let app = test_app();
    let (status, body) = app.get("/api/sessions").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid key"}"#);
}

#[tokio::test]
async fn auth_token_lists_sessions() {
    let app = test_app();
    let key = app.token("auth", None);
    let (status, body) = app.get(&format!("/api/sessions?key={key}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("Keynote"));
    assert!(body.contains("Rust Workshop"));
}

#[tokio::test]
async fn wrong_scope_is_indistinguishable_from_bad_key() {
    let app = test_app();
    let ics_key = app.token("ics", None);
    let (status, body) = app.get(&format!("/api/sessions?key={ics_key}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid key"}"#);

    let auth_key = app.token("auth", None);
    let (status, body) = app.get(&format!("/api/ics/event?key={auth_key}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid key"}"#);
}

#[tokio::test]
async fn expired_token_rejected() {
    let app = test_app();
    let expired = app
        .signer
        .issue(Utc::now() - TokenTtl::seconds(2), "auth", None)
        .unwrap();
    let (status, _) = app.get(&format!("/api/sessions?key={expired}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_token_rejected() {
    let app = test_app();
    let mut key = app.token("auth", None);
    // Flip the last character of the signature.
    let last = key.pop().unwrap();
    key.push(if last == 'A' { 'B' } else { 'A' });
    let (status, _) = app.get(&format!("/api/sessions?key={key}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_detail_and_unknown_session() {
    let app = test_app();
    let key = app.token("auth", None);

    let (status, body) = app.get(&format!("/api/sessions/s1?key={key}")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["name"], "Keynote");
    assert_eq!(json["startTime"], "2025-12-11T09:00:00Z");

    // The detail view links a working single-session feed.
    let subscribe_url = json["subscribeUrl"].as_str().unwrap();
    let path = subscribe_url
        .split_once("/api/")
        .map(|(_, rest)| format!("/api/{rest}"))
        .unwrap();
    let (status, feed) = app.get(&path).await;
    assert_eq!(status, StatusCode::OK, "{feed}");
    assert!(feed.contains("UID:session-s1@speakers.example.com"));

    let (status, _) = app.get(&format!("/api/sessions/nope?key={key}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn speaker_view_enforces_subject_and_links_feed() {
    let app = test_app();

    // A token bound to another speaker must not open this page.
    let foreign = app.token("auth", Some("spk2"));
    let (status, body) = app.get(&format!("/api/speakers/spk1?key={foreign}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid key"}"#);

    let own = app.token("auth", Some("spk1"));
    let (status, body) = app.get(&format!("/api/speakers/spk1?key={own}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["name"], "Ada Lovelace");
    let calendar_url = json["calendarUrl"].as_str().unwrap();
    assert!(calendar_url.contains("/api/ics/speaker/spk1?key="));
    assert!(json["webcalUrl"].as_str().unwrap().starts_with("webcal://"));

    // The embedded link actually works against the feed endpoint.
    let path = calendar_url
        .split_once("/api/")
        .map(|(_, rest)| format!("/api/{rest}"))
        .unwrap();
    let (status, feed) = app.get(&path).await;
    assert_eq!(status, StatusCode::OK, "{feed}");
    assert!(feed.contains("BEGIN:VEVENT"));
}

#[tokio::test]
async fn schedule_feed_headers_and_content() {
    let app = test_app();
    let key = app.token("ics", None);

    let response = app.get_full(&format!("/api/ics/event?key={key}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/calendar; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600, s-maxage=3600"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let feed = String::from_utf8_lossy(&bytes);
    assert!(feed.starts_with("BEGIN:VCALENDAR"));
    assert!(feed.contains("UID:session-s1@speakers.example.com"));
    assert!(feed.contains("UID:session-s2@speakers.example.com"));
    // The unscheduled session is filtered out, not an error.
    assert!(!feed.contains("session-s3@"));
}

#[tokio::test]
async fn schedule_feed_session_filter() {
    let app = test_app();
    let key = app.token("ics", None);

    let (status, feed) = app
        .get(&format!("/api/ics/event?key={key}&sessions=s2"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed.contains("session-s2@"));
    assert!(!feed.contains("session-s1@"));

    // Filter matching nothing means an empty result set, reported as 404.
    let (status, _) = app
        .get(&format!("/api/ics/event?key={key}&sessions=zzz"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unparseable_session_times_are_a_generic_500() {
    // A session with both times set but unparseable slips past the
    // scheduled-session filter and fails feed generation. That is a data
    // fault in the directory, reported as a bare 500 with no record detail.
    let mut directory = fixture_directory();
    directory
        .sessions
        .push(session("s4", "Broken", Some("next tuesday"), Some("later")));
    let app = test_app_with(directory);
    let key = app.token("ics", None);

    let (status, body) = app.get(&format!("/api/ics/event?key={key}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"Internal server error"}"#);
}

#[tokio::test]
async fn single_session_feed() {
    let app = test_app();
    let key = app.token("ics", None);

    let (status, feed) = app.get(&format!("/api/ics/session/s1?key={key}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed.contains("SUMMARY:DevConf 2025 - Keynote"));
    assert!(feed.contains("DTSTART:20251211T090000Z"));

    let (status, _) = app.get(&format!("/api/ics/session/nope?key={key}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // s3 has no end time.
    let (status, body) = app.get(&format!("/api/ics/session/s3?key={key}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("missing start or end time"));
}

#[tokio::test]
async fn speaker_feed_requires_matching_subject() {
    let app = test_app();

    // ics scope but no subject binding: rejected.
    let unbound = app.token("ics", None);
    let (status, _) = app.get(&format!("/api/ics/speaker/spk1?key={unbound}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bound = app.token("ics", Some("spk1"));
    let (status, feed) = app.get(&format!("/api/ics/speaker/spk1?key={bound}")).await;
    assert_eq!(status, StatusCode::OK, "{feed}");
    // Personalized title, only Ada's session.
    assert!(feed.contains("SUMMARY:DevConf 2025 - Keynote - Ada Lovelace"));
    assert!(!feed.contains("session-s2@"));
}

#[tokio::test]
async fn token_issuance_requires_api_key() {
    let app = test_app();

    let (status, _) = app
        .post_json(
            "/api/auth/request",
            Some("wrong-key"),
            serde_json::json!({"speakerId": "spk1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post_json(
            "/api/auth/request",
            Some(TEST_API_KEY),
            serde_json::json!({"speakerId": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post_json(
            "/api/auth/request",
            Some(TEST_API_KEY),
            serde_json::json!({"speakerId": "spk1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["speakerId"], "spk1");
    assert_eq!(json["slug"], "auth");

    // The issued token actually opens the speaker's own page.
    let token = json["token"].as_str().unwrap();
    let (status, _) = app.get(&format!("/api/speakers/spk1?key={token}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_link_flow() {
    let app = test_app();

    // Honeypot filled: fake success, nothing sent.
    let (status, body) = app
        .post_form(
            "/api/auth/request-link",
            "email=bot%40example.com&website=spam",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"ok\":true"));
    assert!(app.mailer.sent.lock().unwrap().is_empty());

    // Unknown address.
    let (status, _) = app
        .post_form("/api/auth/request-link", "email=nobody%40example.com&website=")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Known address: link goes out and carries a usable key.
    let (status, body) = app
        .post_form("/api/auth/request-link", "email=Ada%40example.com&website=")
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let sent = app.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let (to, link) = &sent[0];
    assert_eq!(to, "ada@example.com");
    let key = link.split_once("/s?key=").unwrap().1.to_string();
    drop(sent);

    let (status, _) = app.get(&format!("/api/speakers/spk1?key={key}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_link_rate_limited_per_email() {
    let app = test_app();

    // Limit is 2 per window in the test state. The unknown address still
    // counts: lookups are also worth limiting.
    for _ in 0..2 {
        let (status, _) = app
            .post_form("/api/auth/request-link", "email=ada%40example.com&website=")
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .post_form("/api/auth/request-link", "email=ada%40example.com&website=")
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body.contains("\"ok\":false"));

    // Other addresses are unaffected.
    let (status, _) = app
        .post_form("/api/auth/request-link", "email=other%40example.com&website=")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
