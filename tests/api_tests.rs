//! HTTP surface: routing, bearer auth, status codes and error bodies

mod common;

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::Duration;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use movein_server::auth::generate_access_token;
    use movein_server::models::UserRole;
    use movein_server::routes::api_router;
    use movein_server::state::AppState;

    use crate::common::{Fixture, HOLD_DAYS};

    const SECRET: &str = "router-test-secret";

    fn app(fx: &Fixture) -> Router {
        api_router().with_state(AppState::with_store(fx.dyn_store(), SECRET, HOLD_DAYS))
    }

    fn token(user_id: Uuid, role: UserRole) -> String {
        generate_access_token(user_id, role, SECRET, 900).unwrap()
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::started(Duration::hours(1)).await;
        let (status, body) = call(&app(&fx), Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthorized() {
        let fx = Fixture::started(Duration::hours(1)).await;
        let app = app(&fx);
        let body = json!({"offerId": fx.offer_id, "title": "t", "description": "d"});

        let (status, error) =
            call(&app, Method::POST, "/move-in-issues", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["error"]["code"], "UNAUTHORIZED");

        let forged = generate_access_token(fx.tenant, UserRole::Tenant, "other-secret", 900).unwrap();
        let (status, _) =
            call(&app, Method::POST, "/move-in-issues", Some(&forged), Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_then_reuse_issue() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let app = app(&fx);
        let tenant = token(fx.tenant, UserRole::Tenant);
        let body = json!({
            "offerId": fx.offer_id,
            "title": "Broken boiler",
            "description": "No hot water since move-in",
            "evidence": []
        });

        let (status, created) =
            call(&app, Method::POST, "/move-in-issues", Some(&tenant), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["reused"], false);
        assert_eq!(created["issue"]["status"], "OPEN");

        let (status, reused) =
            call(&app, Method::POST, "/move-in-issues", Some(&tenant), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reused["reused"], true);
        assert_eq!(reused["issue"]["id"], created["issue"]["id"]);
    }

    #[tokio::test]
    async fn test_error_codes_on_the_wire() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let app = app(&fx);
        let issue_id = fx.open_issue().await;

        let outsider = token(fx.outsider, UserRole::Tenant);
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/move-in-issues/{}", issue_id),
            Some(&outsider),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let tenant = token(fx.tenant, UserRole::Tenant);
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/move-in-issues/{}", Uuid::new_v4()),
            Some(&tenant),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/move-in-issues/{}/status", issue_id),
            Some(&tenant),
            Some(json!({"status": "IN_PROGRESS"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_comment_and_thread() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let app = app(&fx);
        let issue_id = fx.open_issue().await;
        let landlord = token(fx.landlord, UserRole::Landlord);

        let (status, comment) = call(
            &app,
            Method::POST,
            &format!("/move-in-issues/{}/comments", issue_id),
            Some(&landlord),
            Some(json!({"content": "Engineer visiting tomorrow", "evidence": ["invoice.pdf"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["evidence_type"], "DOCUMENT");

        let (status, thread) = call(
            &app,
            Method::GET,
            &format!("/move-in-issues/{}", issue_id),
            Some(&landlord),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread["id"], issue_id.to_string());
        assert_eq!(thread["comments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_admin_review_without_body() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let app = app(&fx);
        let issue_id = fx.open_issue().await;
        let tenant = token(fx.tenant, UserRole::Tenant);

        let (status, comment) = call(
            &app,
            Method::POST,
            &format!("/move-in-issues/{}/request-admin-review", issue_id),
            Some(&tenant),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(comment["content"]
            .as_str()
            .unwrap()
            .starts_with("[ADMIN_REVIEW_REQUEST]"));
    }

    #[tokio::test]
    async fn test_admin_endpoints_require_admin() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let app = app(&fx);
        let issue_id = fx.open_issue().await;
        let landlord = token(fx.landlord, UserRole::Landlord);
        let admin = token(fx.admin, UserRole::Admin);
        let decision_uri = format!("/move-in-issues/{}/admin-decision", issue_id);

        let (status, _) = call(
            &app,
            Method::POST,
            &decision_uri,
            Some(&landlord),
            Some(json!({"decision": "REJECT"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/admin/move-in/issues", Some(&landlord), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, queue) = call(&app, Method::GET, "/admin/move-in/issues", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(queue["total"], 1);

        let (status, body) = call(
            &app,
            Method::POST,
            &decision_uri,
            Some(&admin),
            Some(json!({"decision": "ACCEPTED", "refundAmount": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, decided) = call(
            &app,
            Method::POST,
            &decision_uri,
            Some(&admin),
            Some(json!({"decision": "ACCEPTED", "notes": "Confirmed", "refundAmount": 1500})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decided["status"], "ADMIN_APPROVED");
        assert_eq!(decided["refund_amount"], 1500.0);

        let (status, body) = call(
            &app,
            Method::POST,
            &decision_uri,
            Some(&admin),
            Some(json!({"decision": "REJECT"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "ALREADY_DECIDED");
    }
}
