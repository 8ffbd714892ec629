fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use chunkwise_protocol::{
        AccessPolicy, AuthorizationRequest, AuthorizationResponse, MediaPolicy, SessionState,
        SubtitleDirective,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_authorization_request() {
        let request: AuthorizationRequest = roundtrip_test("authorization_request.json");
        assert_eq!(request.cors_origin, "*");
        let subtitles = request.push_media_settings.create_subtitles.unwrap();
        assert_eq!(subtitles.language_code, "en-us");
        assert_eq!(subtitles.metadata.get("key1").map(String::as_str), Some("value1"));
    }

    #[test]
    fn authorization_request_built_in_code_matches_fixture() {
        let policy = MediaPolicy {
            create_subtitles: Some(SubtitleDirective {
                name: "name".into(),
                metadata: BTreeMap::from([("key1".to_string(), "value1".to_string())]),
                language_code: "en-us".into(),
            }),
            ..MediaPolicy::default()
        };
        let built = serde_json::to_value(AuthorizationRequest::new(policy)).unwrap();
        assert_eq!(built, load_fixture("authorization_request.json"));
    }

    #[test]
    fn fixture_authorization_response_success() {
        let response: AuthorizationResponse =
            roundtrip_test("authorization_response_success.json");
        let destination = response.destination().unwrap();
        assert!(destination.as_str().starts_with("https://storage.googleapis.com/"));
    }

    #[test]
    fn fixture_authorization_response_failure() {
        let response: AuthorizationResponse =
            roundtrip_test("authorization_response_failure.json");
        assert!(!response.success);
        assert!(response.destination().is_none());
    }

    #[test]
    fn fixture_media_policy_without_subtitles() {
        let policy: MediaPolicy = roundtrip_test("media_policy_private.json");
        assert_eq!(policy.access_policy, AccessPolicy::Private);
        assert!(policy.create_subtitles.is_none());
    }

    #[test]
    fn session_state_names() {
        let names: Vec<String> = [
            SessionState::Idle,
            SessionState::AwaitingAuthorization,
            SessionState::Uploading,
            SessionState::Paused,
            SessionState::Aborted,
            SessionState::Failed,
            SessionState::Completed,
        ]
        .iter()
        .map(|s| serde_json::to_value(s).unwrap().as_str().unwrap().to_string())
        .collect();
        assert_eq!(
            names,
            [
                "idle",
                "awaiting_authorization",
                "uploading",
                "paused",
                "aborted",
                "failed",
                "completed"
            ]
        );
    }
}
