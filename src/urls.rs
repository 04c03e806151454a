//! Calendar subscription URL builders.
//!
//! Tokens are base64url segments joined by dots, so they can be embedded in
//! a query string without further escaping.

/// `webcal://` variant of an http(s) URL, for calendar apps that register
/// the scheme.
pub fn webcal(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    format!("webcal://{stripped}")
}

pub fn session_calendar_url(base_url: &str, session_id: &str, key: &str) -> String {
    format!(
        "{}/api/ics/session/{session_id}?key={key}",
        base_url.trim_end_matches('/')
    )
}

pub fn speaker_calendar_url(base_url: &str, speaker_id: &str, key: &str) -> String {
    format!(
        "{}/api/ics/speaker/{speaker_id}?key={key}",
        base_url.trim_end_matches('/')
    )
}

pub fn login_link(base_url: &str, key: &str) -> String {
    format!("{}/s?key={key}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcal_strips_scheme() {
        assert_eq!(
            webcal("https://portal.example.com/api/ics/event?key=k"),
            "webcal://portal.example.com/api/ics/event?key=k"
        );
        assert_eq!(webcal("http://localhost:4810/x"), "webcal://localhost:4810/x");
    }

    #[test]
    fn test_trailing_slash_normalized() {
        assert_eq!(
            speaker_calendar_url("https://portal.example.com/", "spk_1", "k"),
            "https://portal.example.com/api/ics/speaker/spk_1?key=k"
        );
    }
}
