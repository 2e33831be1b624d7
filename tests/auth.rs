mod common;

use actix_web::cookie::Cookie;
use actix_web::{dev::Payload, test, FromRequest};
use common::*;
use tortuga::auth::{AuthError, AuthUser};
use tortuga::config::AdminSeed;
use tortuga::repo::UserRepo;

#[actix_web::test]
async fn authenticate_then_token_roundtrip() {
    let env = test_env();
    let (admin, _) = seed_admin(&env).await;

    let user = env.state.auth.authenticate(&env.repo, ADMIN_USER, ADMIN_PASS).await.expect("valid credentials");
    assert_eq!(user.id, admin.id);
    let token = env.state.auth.issue_token(user.id).expect("token");
    assert_eq!(env.state.auth.verify_token(&token).expect("verify"), admin.id);
}

#[actix_web::test]
async fn wrong_password_and_unknown_user_are_rejected() {
    let env = test_env();
    seed_admin(&env).await;
    let err = env.state.auth.authenticate(&env.repo, ADMIN_USER, "nope").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let err = env.state.auth.authenticate(&env.repo, "ghost", ADMIN_PASS).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[actix_web::test]
async fn password_is_stored_salted() {
    let env = test_env();
    let (admin, _) = seed_admin(&env).await;
    assert_ne!(admin.password_hash, ADMIN_PASS);
    assert!(admin.password_hash.starts_with("$2"));
    // same password, different salt
    let again = env.state.auth.hash_password(ADMIN_PASS).await.unwrap();
    assert_ne!(again, admin.password_hash);
}

#[actix_web::test]
async fn ensure_admin_is_idempotent() {
    let env = test_env();
    let seed = AdminSeed { username: "boss".into(), password: "pw".into() };
    assert!(env.state.auth.ensure_admin(&env.repo, &seed).await.unwrap());
    let first = env.repo.get_user_by_username("boss").await.unwrap();
    assert!(!env.state.auth.ensure_admin(&env.repo, &seed).await.unwrap());
    let second = env.repo.get_user_by_username("boss").await.unwrap();
    assert_eq!(first.id, second.id);
}

#[actix_web::test]
async fn expired_token_is_unauthorized() {
    let env = test_env();
    let (admin, _) = seed_admin(&env).await;
    let stale = auth_service(chrono::Duration::seconds(-5)).issue_token(admin.id).unwrap();
    assert!(matches!(env.state.auth.verify_token(&stale), Err(AuthError::InvalidToken)));

    let req = test::TestRequest::default()
        .app_data(env.state.clone())
        .insert_header(bearer(&stale))
        .to_http_request();
    let err = AuthUser::from_request(&req, &mut Payload::None).await.err().expect("rejected");
    assert_eq!(actix_web::ResponseError::status_code(&err), 401);
}

#[actix_web::test]
async fn extractor_accepts_header_or_cookie() {
    let env = test_env();
    let (admin, token) = seed_admin(&env).await;

    let req = test::TestRequest::default()
        .app_data(env.state.clone())
        .insert_header(bearer(&token))
        .to_http_request();
    let AuthUser(user) = AuthUser::from_request(&req, &mut Payload::None).await.ok().expect("header");
    assert_eq!(user.id, admin.id);

    let req = test::TestRequest::default()
        .app_data(env.state.clone())
        .cookie(Cookie::new("token", token.clone()))
        .to_http_request();
    let AuthUser(user) = AuthUser::from_request(&req, &mut Payload::None).await.ok().expect("cookie");
    assert_eq!(user.id, admin.id);
}

#[actix_web::test]
async fn header_wins_over_cookie() {
    let env = test_env();
    let (_, token) = seed_admin(&env).await;
    let req = test::TestRequest::default()
        .app_data(env.state.clone())
        .insert_header(bearer("notatoken"))
        .cookie(Cookie::new("token", token))
        .to_http_request();
    assert!(AuthUser::from_request(&req, &mut Payload::None).await.is_err());
}

#[actix_web::test]
async fn token_for_missing_user_is_rejected() {
    let env = test_env();
    let token = env.state.auth.issue_token(uuid::Uuid::new_v4()).unwrap();
    let req = test::TestRequest::default()
        .app_data(env.state.clone())
        .insert_header(bearer(&token))
        .to_http_request();
    assert!(AuthUser::from_request(&req, &mut Payload::None).await.is_err());
}
