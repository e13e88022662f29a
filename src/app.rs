use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, plants, weather};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api",
              Router::new()
                  .merge(auth::router())
                  .merge(plants::router())
                  .merge(weather::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3001".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::services::fake::FakeWeather;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut b = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::get(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        b.body(Body::empty()).unwrap()
    }

    async fn register_and_login(app: &Router, email: &str) -> String {
        let (status, _) = call(
            app,
            post_json(
                "/api/auth/register",
                None,
                json!({"email": email, "password": "pw", "nome": "A"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            app,
            post_json("/api/auth/login", None, json!({"email": email, "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, get_with("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn register_login_water_end_to_end() {
        let app = build_app(AppState::fake());

        let (status, body) = call(
            &app,
            post_json(
                "/api/auth/register",
                None,
                json!({"email": "a@x.com", "password": "pw", "nome": "A"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].is_string());

        let (status, body) = call(
            &app,
            post_json("/api/auth/login", None, json!({"email": "a@x.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["nome"], "A");
        assert_eq!(body["user"]["email"], "a@x.com");

        let (status, plant) = call(&app, get_with("/api/planta", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plant["nome"], "Kalanchoe");
        assert_eq!(plant["statusRega"], "pending");
        let seeded_at = plant["ultimaRega"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            post_json("/api/regar", Some(&token), json!({"nome": "Kalanchoe"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
        assert_eq!(body["dados"]["statusRega"], "success");
        assert_eq!(body["dados"]["historico"].as_array().unwrap().len(), 1);
        let watered_at = body["dados"]["ultimaRega"].as_str().unwrap();
        let seeded = time::OffsetDateTime::parse(&seeded_at, &time::format_description::well_known::Rfc3339).unwrap();
        let watered = time::OffsetDateTime::parse(watered_at, &time::format_description::well_known::Rfc3339).unwrap();
        assert!(watered >= seeded);

        let (status, plant) = call(&app, get_with("/api/planta", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plant["statusRega"], "success");
    }

    #[tokio::test]
    async fn duplicate_registration_is_400() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "dup@x.com").await;

        let (status, body) = call(
            &app,
            post_json(
                "/api/auth/register",
                None,
                json!({"email": "dup@x.com", "password": "other", "nome": "B"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn bad_credentials_are_400_without_token() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "b@x.com").await;

        let (status, body) = call(
            &app,
            post_json("/api/auth/login", None, json!({"email": "b@x.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Incorrect password");
        assert!(body.get("token").is_none());

        let (status, body) = call(
            &app,
            post_json("/api/auth/login", None, json!({"email": "nobody@x.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let app = build_app(AppState::fake());

        for uri in ["/api/planta", "/api/plantas", "/api/me", "/api/clima?lat=1&lon=1"] {
            let (status, body) = call(&app, get_with(uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["error"].is_string());
        }

        let (status, _) = call(&app, get_with("/api/planta", Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            post_json("/api/regar", None, json!({"nome": "Kalanchoe"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn watering_is_scoped_to_the_caller() {
        let app = build_app(AppState::fake());
        let alice = register_and_login(&app, "alice@x.com").await;
        let bob = register_and_login(&app, "bob@x.com").await;

        let (_, plant) = call(&app, get_with("/api/planta", Some(&alice))).await;
        let id = plant["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, post_json("/api/regar", Some(&bob), json!({"id": id}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Plant not found");

        let (_, plant) = call(&app, get_with("/api/planta", Some(&alice))).await;
        assert_eq!(plant["statusRega"], "pending");
    }

    #[tokio::test]
    async fn water_request_needs_a_target() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "c@x.com").await;
        let (status, _) = call(&app, post_json("/api/regar", Some(&token), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weather_proxy_merges_and_fails_as_a_whole() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "d@x.com").await;
        let (status, body) = call(&app, get_with("/api/clima?lat=-23.5&lon=-46.6", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["temperatura"], 31);
        assert_eq!(body["bairro"], "Pinheiros");
        assert_eq!(body["cidade"], "São Paulo");
        assert_eq!(body["icone"], "01d");

        let (status, _) = call(&app, get_with("/api/clima?lat=abc", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let broken = build_app(AppState::fake_with_weather(FakeWeather {
            fail_geocode: true,
            ..Default::default()
        }));
        let token = register_and_login(&broken, "e@x.com").await;
        let (status, body) = call(&broken, get_with("/api/clima?lat=1&lon=1", Some(&token))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch location"}));
    }

    #[tokio::test]
    async fn create_plant_from_multipart_form() {
        let app = build_app(AppState::fake());
        let token = register_and_login(&app, "f@x.com").await;

        let boundary = "XBOUNDARYX";
        let form = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"nome\"\r\n\r\nJiboia\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"especie\"\r\n\r\nEpipremnum aureum\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"imagem\"; filename=\"j.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = Request::post("/api/plantas")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(form))
            .unwrap();

        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["nome"], "Jiboia");
        assert_eq!(body["statusRega"], "pending");
        assert!(body["imagem"].as_str().unwrap().ends_with(".png"));

        let (status, list) = call(&app, get_with("/api/plantas", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_gets_an_error_body() {
        let app = build_app(AppState::fake());
        let raw = |uri: &str, token: Option<&str>| {
            let mut b = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
            if let Some(t) = token {
                b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
            }
            b.body(Body::from("{bad")).unwrap()
        };

        let (status, body) = call(&app, raw("/api/auth/login", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));

        let (status, body) = call(&app, raw("/api/auth/register", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let token = register_and_login(&app, "g@x.com").await;
        let (status, body) = call(&app, raw("/api/regar", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn created_plant_location_resolves_for_its_owner_only() {
        let app = build_app(AppState::fake());
        let owner = register_and_login(&app, "h@x.com").await;
        let other = register_and_login(&app, "i@x.com").await;

        let boundary = "XBOUNDARYX";
        let form = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"nome\"\r\n\r\nFiló\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::post("/api/plantas")
            .header(header::AUTHORIZATION, format!("Bearer {}", owner))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(form))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();

        let (status, plant) = call(&app, get_with(&location, Some(&owner))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plant["nome"], "Filó");
        assert_eq!(plant["especie"], "");

        let (status, body) = call(&app, get_with(&location, Some(&other))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Plant not found");

        let (status, body) = call(&app, get_with("/api/plantas/not-a-uuid", Some(&owner))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
