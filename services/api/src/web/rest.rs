//! services/api/src/web/rest.rs
//!
//! Assembles the Axum router for the REST API and holds the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{chat, events, middleware::require_user, profile, protocol::*, sessions};
use crate::web::state::AppState;
use axum::{
    extract::rejection::JsonRejection,
    middleware as axum_middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::warn;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat::chat_response_handler,
        chat::simple_chat_handler,
        chat::history_handler,
        chat::conversation_handler,
        sessions::save_session_handler,
        sessions::list_sessions_handler,
        sessions::session_detail_handler,
        events::list_events_handler,
        events::create_event_handler,
        events::event_detail_handler,
        events::update_event_handler,
        events::delete_event_handler,
        events::start_session_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        health_handler,
    ),
    components(
        schemas(
            ChatRequest, ChatResponse, SimpleChatRequest, SimpleChatResponse,
            HistoryMessage, HistoryResponse, ConversationResponse,
            SessionEntryPayload, SaveSessionRequest, SaveSessionResponse, FailureResponse,
            SessionSummary, SessionListResponse, SessionEntryView, SessionDetail,
            EventPayload, EventView, ThreadView, PhaseProgress, EventDetail,
            StartSessionResponse, DeletedResponse,
            ProfilePayload, PersonalityChoice, ProfileView, HealthResponse
        )
    ),
    tags(
        (name = "Writing Coach API", description = "Guided reflective journaling with a phase-aware writing coach.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds every API route. Everything except `/health` and the chat page requires
/// the `x-user-id` header.
pub fn router(app_state: Arc<AppState>) -> Router {
    // The page is opened straight from a browser; posting to it still needs a user.
    let chat_routes = get(chat::chat_page_handler).merge(
        post(chat::simple_chat_handler).route_layer(axum_middleware::from_fn(require_user)),
    );

    let protected_routes = Router::new()
        .route("/chat/response", post(chat::chat_response_handler))
        .route("/chat/save", post(sessions::save_session_handler))
        .route("/chat/history/{event_id}/{phase}", get(chat::history_handler))
        .route("/conversation/{thread_id}", get(chat::conversation_handler))
        .route(
            "/api/sessions/{event_id}/{phase}",
            get(sessions::list_sessions_handler),
        )
        .route("/session/{session_id}", get(sessions::session_detail_handler))
        .route(
            "/events/",
            get(events::list_events_handler).post(events::create_event_handler),
        )
        .route("/events/create/", post(events::create_event_handler))
        .route("/events/{event_id}/", get(events::event_detail_handler))
        .route("/events/{event_id}/update/", post(events::update_event_handler))
        .route("/events/{event_id}/delete/", post(events::delete_event_handler))
        .route("/events/{event_id}/write/", post(events::start_session_handler))
        .route(
            "/profile/",
            get(profile::get_profile_handler).post(profile::update_profile_handler),
        )
        .route_layer(axum_middleware::from_fn(require_user));

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", chat_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

/// Unwraps a JSON body, turning any rejection into a generic 400.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::BadRequest("Invalid request body".to_string()))
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use uuid::Uuid;
    use writing_coach_core::memory::{InMemoryStore, ScriptedCompletion};

    struct TestApp {
        router: Router,
        completion: Arc<ScriptedCompletion>,
        user_id: Uuid,
    }

    fn test_app(replies: &[&str]) -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let completion = Arc::new(ScriptedCompletion::new(replies.iter().copied()));
        let state = AppState::new(
            store,
            completion.clone(),
            Arc::new(Config::for_tests()),
            CancellationToken::new(),
        );
        TestApp {
            router: router(Arc::new(state)),
            completion,
            user_id: Uuid::new_v4(),
        }
    }

    fn get_as(user_id: Uuid, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .body(Body::empty())
            .unwrap()
    }

    fn post_as(user_id: Uuid, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_event(app: &TestApp, user_id: Uuid) -> String {
        let req = post_as(
            user_id,
            "/events/",
            serde_json::json!({
                "title": "Job interview",
                "description": "Final round",
                "date_occurred": "2024-05-14"
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["current_phase"], "facts");
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_needs_no_user() {
        let app = test_app(&[]);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp.into_body()).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_user_header_is_unauthorized() {
        let app = test_app(&[]);
        let req = Request::builder().uri("/events/").body(Body::empty()).unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/profile/")
            .header("x-user-id", "not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_advances_phase_and_rotates_thread() {
        let app = test_app(&["Thanks for laying that out. [PHASE_COMPLETE:facts]"]);
        let event_id = create_event(&app, app.user_id).await;

        // An empty payload is not an event.
        let req = post_as(app.user_id, "/events/", serde_json::json!({}));
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = post_as(
            app.user_id,
            "/chat/response",
            serde_json::json!({
                "message": "I walked in and my mind went blank.",
                "event_id": event_id,
                "phase": "facts"
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        let reply = json["response"].as_str().unwrap();
        assert!(!reply.contains("PHASE_COMPLETE"));
        assert!(reply.contains("You've completed the Facts phase"));
        assert_eq!(json["phase"], "feelings");
        assert_eq!(json["advanced"], true);
        let next_thread = json["thread_id"].as_str().unwrap().to_string();

        let resp = app
            .router
            .clone()
            .oneshot(get_as(app.user_id, &format!("/events/{event_id}/")))
            .await
            .unwrap();
        let detail = body_json(resp.into_body()).await;
        assert_eq!(detail["event"]["current_phase"], "feelings");
        let threads = detail["threads"].as_array().unwrap();
        assert_eq!(threads.len(), 2);
        let open: Vec<_> = threads.iter().filter(|t| t["status"] == "open").collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0]["id"], next_thread.as_str());
        assert_eq!(open[0]["writing_phase"], "feelings");

        // The exchange lives on the superseded thread, with the marker stripped.
        let resp = app
            .router
            .clone()
            .oneshot(get_as(
                app.user_id,
                &format!("/chat/history/{event_id}/facts"),
            ))
            .await
            .unwrap();
        let history = body_json(resp.into_body()).await;
        assert_eq!(history["phase_display"], "Factual Description");
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "user");
        assert_eq!(messages[1]["type"], "assistant");
        assert!(!messages[1]["content"]
            .as_str()
            .unwrap()
            .contains("PHASE_COMPLETE"));

        assert_eq!(app.completion.received().await.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_chat_body_is_bad_request() {
        let app = test_app(&[]);
        let req = Request::builder()
            .method("POST")
            .uri("/chat/response")
            .header("x-user-id", app.user_id.to_string())
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp.into_body()).await["error"],
            "Invalid request body"
        );

        let req = post_as(
            app.user_id,
            "/chat/response",
            serde_json::json!({ "message": "hello", "phase": "thoughts" }),
        );
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(app.completion.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let app = test_app(&[]);
        let event_id = create_event(&app, app.user_id).await;
        let req = post_as(
            app.user_id,
            "/chat/response",
            serde_json::json!({ "message": "hello", "event_id": event_id }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("try again"));

        let resp = app
            .router
            .oneshot(get_as(
                app.user_id,
                &format!("/chat/history/{event_id}/facts"),
            ))
            .await
            .unwrap();
        let history = body_json(resp.into_body()).await;
        assert!(history["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simple_chat_strips_markers_without_an_event() {
        let app = test_app(&["Noted. [PHASE_COMPLETE:facts]"]);
        let req = post_as(
            app.user_id,
            "/chat",
            serde_json::json!({ "message": "Just thinking out loud" }),
        );
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp.into_body()).await["message"], "Noted.");
    }

    #[tokio::test]
    async fn test_chat_page_opens_without_a_user_header() {
        let app = test_app(&[]);
        let req = Request::builder().uri("/chat").body(Body::empty()).unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));

        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_foreign_event_is_not_found() {
        let app = test_app(&["should never be used"]);
        let event_id = create_event(&app, app.user_id).await;
        let stranger = Uuid::new_v4();

        for uri in [
            format!("/events/{event_id}/"),
            format!("/chat/history/{event_id}/facts"),
            format!("/api/sessions/{event_id}/facts"),
        ] {
            let resp = app.router.clone().oneshot(get_as(stranger, &uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        let req = post_as(
            stranger,
            "/chat/response",
            serde_json::json!({ "message": "hello", "event_id": event_id }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = post_as(stranger, &format!("/events/{event_id}/delete/"), serde_json::json!({}));
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(app.completion.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_session_validates_and_lists_newest_first() {
        let app = test_app(&[]);
        let event_id = create_event(&app, app.user_id).await;

        let req = post_as(
            app.user_id,
            "/chat/save",
            serde_json::json!({
                "event_id": event_id,
                "phase": "facts",
                "messages": [{ "content": "missing a type" }]
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());

        let long = "A".repeat(150);
        let req = post_as(
            app.user_id,
            "/chat/save",
            serde_json::json!({
                "event_id": event_id,
                "phase": "facts",
                "messages": [
                    { "type": "user", "content": long },
                    { "type": "assistant", "content": "Go on." }
                ]
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let first = body_json(resp.into_body()).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["title"], format!("{}...", "A".repeat(100)));

        let req = post_as(
            app.user_id,
            "/chat/save",
            serde_json::json!({
                "event_id": event_id,
                "phase": "facts",
                "title": "Second pass",
                "messages": [{ "type": "assistant", "content": "Welcome back." }]
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        let second = body_json(resp.into_body()).await;
        assert_eq!(second["title"], "Second pass");

        let resp = app
            .router
            .clone()
            .oneshot(get_as(
                app.user_id,
                &format!("/api/sessions/{event_id}/facts"),
            ))
            .await
            .unwrap();
        let listing = body_json(resp.into_body()).await;
        assert_eq!(listing["success"], true);
        let sessions = listing["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["title"], "Second pass");
        assert!(sessions[0]["formatted_date"].is_string());

        let session_id = first["session_id"].as_str().unwrap();
        let resp = app
            .router
            .clone()
            .oneshot(get_as(app.user_id, &format!("/session/{session_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let detail = body_json(resp.into_body()).await;
        assert_eq!(detail["messages"].as_array().unwrap().len(), 2);
        assert_eq!(detail["messages"][1]["type"], "assistant");

        let resp = app
            .router
            .oneshot(get_as(Uuid::new_v4(), &format!("/session/{session_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_update_start_session_and_delete() {
        let app = test_app(&[]);
        let event_id = create_event(&app, app.user_id).await;

        let req = post_as(
            app.user_id,
            &format!("/events/{event_id}/update/"),
            serde_json::json!({ "title": "   ", "date_occurred": "2024-05-14" }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = post_as(
            app.user_id,
            &format!("/events/{event_id}/update/"),
            serde_json::json!({ "title": "Second interview", "date_occurred": "2024-06-01" }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["title"], "Second interview");
        assert_eq!(json["description"], "");

        let req = post_as(app.user_id, &format!("/events/{event_id}/write/"), serde_json::json!({}));
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let started = body_json(resp.into_body()).await;
        assert_eq!(started["phase"], "facts");
        assert!(started["correlation_id"]
            .as_str()
            .unwrap()
            .starts_with("thread_"));

        let thread_id = started["thread_id"].as_str().unwrap();
        let resp = app
            .router
            .clone()
            .oneshot(get_as(app.user_id, &format!("/conversation/{thread_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let conversation = body_json(resp.into_body()).await;
        assert_eq!(conversation["thread"]["status"], "open");

        let req = post_as(app.user_id, &format!("/events/{event_id}/delete/"), serde_json::json!({}));
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .router
            .clone()
            .oneshot(get_as(app.user_id, "/events/"))
            .await
            .unwrap();
        assert!(body_json(resp.into_body()).await.as_array().unwrap().is_empty());

        let resp = app
            .router
            .oneshot(get_as(app.user_id, &format!("/conversation/{thread_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_defaults_and_updates() {
        let app = test_app(&[]);
        let resp = app
            .router
            .clone()
            .oneshot(get_as(app.user_id, "/profile/"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["personality_preference"], "professional");
        assert_eq!(json["personality_choices"].as_array().unwrap().len(), 4);

        let req = post_as(
            app.user_id,
            "/profile/",
            serde_json::json!({ "personality_preference": "sarcastic" }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = post_as(
            app.user_id,
            "/profile/",
            serde_json::json!({
                "personality_preference": "friendly",
                "writing_goals": "Write every morning"
            }),
        );
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["personality_preference"], "friendly");
        assert_eq!(json["personality_display"], "Friendly and Casual");
        assert_eq!(json["writing_goals"], "Write every morning");
        assert!(json["bio_context"].is_null());
    }

    #[test]
    fn test_openapi_lists_chat_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/chat/response"));
        assert!(doc.paths.paths.contains_key("/events/{event_id}/write/"));
    }
}
