//! HTTP surface tests running the actix app against the in-memory
//! repository.

use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, ResponseError, http::StatusCode, http::header, test, web};
use chrono::Utc;
use serde_json::{Value, json};

use golink::config::{AuthConfig, Config, CorsConfig, DatabaseConfig, ServerConfig};
use golink::middlewares::identity::IdentityExtractor;
use golink::models::link_stats::ClickInfo;
use golink::repositories::LinkRepository;
use golink::repositories::memory::MemoryLinkRepository;
use golink::routes::init_routes;
use golink::state::app_state::AppState;
use golink::utils::jwt::create_token;

const TEST_SECRET: &str = "test-secret";

fn test_config(auth_enabled: bool) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth: AuthConfig {
            enabled: auth_enabled,
            jwt_secret: TEST_SECRET.to_string(),
        },
        cors: CorsConfig {
            origin: "http://localhost:3001".to_string(),
            max_age: 3600,
        },
        database: DatabaseConfig {
            uri: String::new(),
            name: String::new(),
        },
    }
}

async fn test_app(
    repo: Arc<dyn LinkRepository>,
    auth_enabled: bool,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    let config = test_config(auth_enabled);
    test::init_service(
        App::new()
            .wrap(IdentityExtractor::new(config.auth.clone()))
            .app_data(web::Data::new(AppState { repo }))
            .app_data(web::Data::new(config))
            .configure(init_routes),
    )
    .await
}

fn create_req(body: Value, user: &str) -> actix_http::Request {
    test::TestRequest::post()
        .uri("/api/links")
        .insert_header(("X-User-ID", user))
        .set_json(body)
        .to_request()
}

#[actix_web::test]
async fn create_and_fetch_link() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["short"], "abc");
    assert_eq!(body["created_by"], "u1");
    assert_eq!(body["access_level"], "Public");
    assert_eq!(body["expiring"], false);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/links/abc")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["url"], "https://x.com");
}

#[actix_web::test]
async fn create_rejects_bad_input() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    // Missing URL.
    let resp = test::call_service(&app, create_req(json!({"short": "abc"}), "u1")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Malformed URL.
    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "notaurl"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Short code with illegal characters.
    let resp = test::call_service(
        &app,
        create_req(json!({"short": "with space", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown access level.
    let resp = test::call_service(
        &app,
        create_req(
            json!({"short": "abc", "url": "https://x.com", "access_level": "Secret"}),
            "u1",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Expiry in the past.
    let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let resp = test::call_service(
        &app,
        create_req(
            json!({"short": "abc", "url": "https://x.com", "expires_at": past}),
            "u1",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[actix_web::test]
async fn duplicate_short_code_conflicts() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    let body = json!({"short": "abc", "url": "https://x.com"});
    let resp = test::call_service(&app, create_req(body.clone(), "u1")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, create_req(body, "u2")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "already_exists");
}

#[actix_web::test]
async fn access_levels_gate_reads() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    let resp = test::call_service(
        &app,
        create_req(
            json!({"short": "priv", "url": "https://x.com", "access_level": "Private"}),
            "u1",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(
        &app,
        create_req(
            json!({
                "short": "restr",
                "url": "https://x.com",
                "access_level": "Restricted",
                "allowed_users": ["u2"],
            }),
            "u1",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let get = |short: &str, user: &str| {
        test::TestRequest::get()
            .uri(&format!("/api/links/{}", short))
            .insert_header(("X-User-ID", user))
            .to_request()
    };

    assert_eq!(
        test::call_service(&app, get("priv", "u1")).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        test::call_service(&app, get("priv", "u2")).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        test::call_service(&app, get("restr", "u2")).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        test::call_service(&app, get("restr", "u3")).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[actix_web::test]
async fn list_is_filtered_by_access() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    for (short, user, level) in [
        ("pub-1", "u1", "Public"),
        ("priv-u1", "u1", "Private"),
        ("priv-u2", "u2", "Private"),
    ] {
        let resp = test::call_service(
            &app,
            create_req(
                json!({"short": short, "url": "https://x.com", "access_level": level}),
                user,
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/links")
            .insert_header(("X-User-ID", "u1"))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let shorts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["short"].as_str().unwrap())
        .collect();
    assert!(shorts.contains(&"pub-1"));
    assert!(shorts.contains(&"priv-u1"));
    assert!(!shorts.contains(&"priv-u2"));

    // Anonymous only sees public links.
    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/links").to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn list_intersects_access_level_and_creator_filters() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    for (short, user, level) in [
        ("pub-u1", "u1", "Public"),
        ("pub-u2", "u2", "Public"),
        ("priv-u1", "u1", "Private"),
    ] {
        let resp = test::call_service(
            &app,
            create_req(
                json!({"short": short, "url": "https://x.com", "access_level": level}),
                user,
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/links?access_level=Public&created_by=u1")
            .insert_header(("X-User-ID", "u1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let shorts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["short"].as_str().unwrap())
        .collect();
    assert_eq!(shorts, vec!["pub-u1"]);
}

#[actix_web::test]
async fn redirect_counts_clicks() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/abc").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "https://x.com"
    );

    // The click increment is detached from the request.
    let mut counted = false;
    for _ in 0..100 {
        if repo.get_by_short("abc").await.unwrap().click_count == 1 {
            counted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(counted, "click was never counted");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/no-such").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn redirect_records_click_dimensions() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/abc")
            .insert_header((
                header::USER_AGENT,
                "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
            ))
            .insert_header((header::REFERER, "https://ref.example/page"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let mut counted = false;
    for _ in 0..100 {
        if repo.get_link_stats("abc").await.unwrap().total_clicks == 1 {
            counted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(counted, "click was never counted");

    let stats = repo.get_link_stats("abc").await.unwrap();
    assert_eq!(stats.browsers.get("Firefox"), Some(&1));
    assert_eq!(stats.operating_systems.get("Linux"), Some(&1));
    assert_eq!(stats.device_types.get("Desktop"), Some(&1));
    assert_eq!(stats.referring_sites.get("https://ref.example/page"), Some(&1));
    assert_eq!(stats.clicks_by_date.values().sum::<i64>(), 1);
}

#[actix_web::test]
async fn redirect_of_expired_link_is_gone() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Backdate the expiry directly through the repository.
    let mut link = repo.get_by_short("abc").await.unwrap();
    link.set_expiry(Utc::now() - chrono::Duration::hours(1));
    repo.update(&link).await.unwrap();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/abc").to_request()).await;
    assert_eq!(resp.status(), StatusCode::GONE);

    // The sticky flag gets flushed by the read that observed the expiry.
    let mut flushed = false;
    for _ in 0..100 {
        if repo
            .get_links_by_expiry_status(true)
            .await
            .unwrap()
            .iter()
            .any(|l| l.short == "abc")
        {
            flushed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(flushed, "sticky flag never persisted");
}

#[actix_web::test]
async fn ownership_enforced_when_auth_enabled() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, true).await;

    let bearer = |user: &str| format!("Bearer {}", create_token(user, TEST_SECRET).unwrap());

    // No token on /api is unauthorized. The middleware rejects with a
    // service-level error, so the fallible call variant is needed here.
    let err = test::try_call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/links")
            .set_json(json!({"short": "abc", "url": "https://x.com"}))
            .to_request(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );

    // So is a token that does not validate.
    let err = test::try_call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/links")
            .insert_header((header::AUTHORIZATION, "Bearer not-a-jwt"))
            .set_json(json!({"short": "abc", "url": "https://x.com"}))
            .to_request(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/links")
            .insert_header((header::AUTHORIZATION, bearer("u1")))
            .set_json(json!({"short": "abc", "url": "https://x.com"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Only the creator may update.
    let update = json!({"url": "https://y.com"});
    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/links/abc")
            .insert_header((header::AUTHORIZATION, bearer("u2")))
            .set_json(update.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/links/abc")
            .insert_header((header::AUTHORIZATION, bearer("u1")))
            .set_json(update)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["url"], "https://y.com");

    // Only the creator may delete.
    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri("/api/links/abc")
            .insert_header((header::AUTHORIZATION, bearer("u2")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri("/api/links/abc")
            .insert_header((header::AUTHORIZATION, bearer("u1")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn update_clears_expiry_with_empty_string() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    let future = (Utc::now() + chrono::Duration::days(2)).to_rfc3339();
    let resp = test::call_service(
        &app,
        create_req(
            json!({"short": "abc", "url": "https://x.com", "expires_at": future}),
            "u1",
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["expiring"], true);
    assert_eq!(body["expiry_reason"], "expiring_soon");

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/links/abc")
            .insert_header(("X-User-ID", "u1"))
            .set_json(json!({"expires_at": ""}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["expiring"], false);
    assert_eq!(body["is_expired"], false);

    let link = repo.get_by_short("abc").await.unwrap();
    assert!(link.expires_at.is_none());
}

#[actix_web::test]
async fn expired_sweep_deletes_only_expired_links() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    for short in ["keep", "drop"] {
        let resp = test::call_service(
            &app,
            create_req(json!({"short": short, "url": "https://x.com"}), "u1"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let mut link = repo.get_by_short("drop").await.unwrap();
    link.set_expiry(Utc::now() - chrono::Duration::days(1));
    repo.update(&link).await.unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri("/api/links/expired")
            .insert_header(("X-User-ID", "u1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["deleted_count"], 1);

    assert!(repo.get_by_short("drop").await.unwrap_err().is_not_found());
    assert!(repo.get_by_short("keep").await.is_ok());
}

#[actix_web::test]
async fn analytics_reports_clicks() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo.clone(), false).await;

    let resp = test::call_service(
        &app,
        create_req(json!({"short": "abc", "url": "https://x.com"}), "u1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    repo.increment_click_count("abc", ClickInfo::default())
        .await
        .unwrap();
    repo.increment_click_count("abc", ClickInfo::default())
        .await
        .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/analytics/links/abc")
            .insert_header(("X-User-ID", "u1"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["click_count"], 2);
    assert_eq!(body["stats"]["total_clicks"], 2);
    assert_eq!(body["access_level"], "Public");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/analytics/top?limit=1")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["short"], "abc");
}

#[actix_web::test]
async fn health_endpoint_reports_healthy() {
    let repo: Arc<dyn LinkRepository> = Arc::new(MemoryLinkRepository::new());
    let app = test_app(repo, false).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}
