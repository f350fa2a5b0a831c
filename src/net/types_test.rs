use super::*;

// =============================================================
// Profile -> identity
// =============================================================

#[test]
fn profile_image_becomes_avatar() {
    let profile: ProfileResponse = serde_json::from_value(serde_json::json!({
        "email": "a@x.com",
        "username": "alice",
        "image": "a.png",
        "bio": "ignored",
        "followers_count": 3
    }))
    .unwrap();

    let user = User::from(profile);
    assert_eq!(
        user,
        User { email: "a@x.com".to_owned(), username: "alice".to_owned(), avatar: Some("a.png".to_owned()) }
    );
}

#[test]
fn profile_without_image_has_no_avatar() {
    let profile: ProfileResponse =
        serde_json::from_value(serde_json::json!({ "email": "b@x.com", "username": "bob" })).unwrap();
    assert_eq!(User::from(profile).avatar, None);
}

#[test]
fn profile_null_image_has_no_avatar() {
    let profile: ProfileResponse =
        serde_json::from_value(serde_json::json!({ "email": "b@x.com", "username": "bob", "image": null })).unwrap();
    assert_eq!(User::from(profile).avatar, None);
}

#[test]
fn profile_missing_username_is_rejected() {
    let result = serde_json::from_value::<ProfileResponse>(serde_json::json!({ "email": "b@x.com" }));
    assert!(result.is_err());
}

#[test]
fn user_serializes_without_missing_avatar() {
    let user = User { email: "a@x.com".to_owned(), username: "alice".to_owned(), avatar: None };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json, serde_json::json!({ "email": "a@x.com", "username": "alice" }));
}

// =============================================================
// Redaction
// =============================================================

#[test]
fn credential_pair_debug_hides_tokens() {
    let pair = CredentialPair::new("secret-access", "secret-refresh");
    let debug = format!("{pair:?}");
    assert!(!debug.contains("secret-access"));
    assert!(!debug.contains("secret-refresh"));
    assert!(debug.contains("<redacted>"));
}

#[test]
fn login_payload_debug_hides_password() {
    let payload = LoginPayload { username_or_email: "alice".to_owned(), password: "hunter2".to_owned() };
    let debug = format!("{payload:?}");
    assert!(debug.contains("alice"));
    assert!(!debug.contains("hunter2"));
}

// =============================================================
// Auth payloads
// =============================================================

#[test]
fn register_payload_omits_absent_optionals() {
    let payload = RegisterPayload {
        username: "alice".to_owned(),
        password: "pw".to_owned(),
        confirm_password: "pw".to_owned(),
        email: None,
        full_name: None,
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json, serde_json::json!({ "username": "alice", "password": "pw", "confirm_password": "pw" }));
}

#[test]
fn registered_user_reads_nested_token() {
    let user: RegisteredUser = serde_json::from_value(serde_json::json!({
        "username": "alice",
        "email": "a@x.com",
        "token": { "access": "A", "refresh": "R" }
    }))
    .unwrap();
    assert_eq!(user.token, Some(CredentialPair::new("A", "R")));
}

#[test]
fn token_obtain_response_ignores_user_block() {
    let pair: CredentialPair = serde_json::from_value(serde_json::json!({
        "access": "A",
        "refresh": "R",
        "user": { "id": 1, "username": "alice", "email": "a@x.com" }
    }))
    .unwrap();
    assert_eq!(pair, CredentialPair::new("A", "R"));
}

#[test]
fn refreshed_token_without_rotation() {
    let token: RefreshedToken = serde_json::from_value(serde_json::json!({ "access": "A2" })).unwrap();
    assert_eq!(token, RefreshedToken { access: "A2".to_owned(), refresh: None });
}
