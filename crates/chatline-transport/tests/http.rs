//! Integration tests for the reqwest-backed auth API client, against a
//! `wiremock` server.

#[cfg(feature = "http")]
mod http {
    use std::sync::Arc;

    use chatline_protocol::{AuthRequest, Credential, UserId};
    use chatline_transport::{
        CookieJar, HttpApi, HttpMethod, ReqwestApi, TransportError, Url,
    };
    use reqwest::cookie::CookieStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> ReqwestApi {
        ReqwestApi::new(Url::parse(&server.uri()).unwrap()).expect("client")
    }

    #[tokio::test]
    async fn test_request_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({ "email": "a@b.com", "password": "x" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "token": "T1",
                "userData": { "_id": "U1" },
                "message": "Login successful"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = api_for(&server)
            .request(
                HttpMethod::Post,
                "/api/auth/login",
                None,
                Some(&AuthRequest::login("a@b.com", "x")),
            )
            .await
            .expect("request should succeed");

        assert!(resp.success);
        assert_eq!(resp.token.as_deref(), Some("T1"));
        assert_eq!(resp.into_identity().unwrap().id, UserId::new("U1"));
    }

    #[tokio::test]
    async fn test_request_sends_bearer_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/check"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "user": { "_id": "U1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = api_for(&server)
            .request(
                HttpMethod::Get,
                "/api/auth/check",
                Some(&Credential::new("T1")),
                None::<&()>,
            )
            .await
            .expect("request should succeed");

        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_request_error_status_with_api_body_is_ok_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "message": "Invalid credentials"
            })))
            .mount(&server)
            .await;

        let resp = api_for(&server)
            .request(
                HttpMethod::Post,
                "/api/auth/login",
                None,
                Some(&AuthRequest::login("a@b.com", "wrong")),
            )
            .await
            .expect("a backend rejection is not a transport error");

        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_request_error_status_without_api_body_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let result = api_for(&server)
            .request(HttpMethod::Get, "/api/auth/check", None, None::<&()>)
            .await;

        assert!(matches!(result, Err(TransportError::Status { status: 502 })));
    }

    #[tokio::test]
    async fn test_request_success_status_with_garbage_returns_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let result = api_for(&server)
            .request(HttpMethod::Get, "/api/auth/check", None, None::<&()>)
            .await;

        assert!(matches!(result, Err(TransportError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_request_unreachable_server_returns_request_error() {
        // Grab a free port, then release it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = ReqwestApi::new(Url::parse(&format!("http://{addr}")).unwrap()).unwrap();

        let result = api
            .request(HttpMethod::Get, "/api/auth/check", None, None::<&()>)
            .await;

        assert!(matches!(result, Err(TransportError::Request(_))));
    }

    #[tokio::test]
    async fn test_with_cookies_stores_response_cookies_in_jar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "sid=abc; Path=/")
                    .set_body_json(json!({ "success": true })),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let jar = Arc::new(CookieJar::default());
        let api = ReqwestApi::with_cookies(base.clone(), Arc::clone(&jar)).unwrap();

        api.request(HttpMethod::Post, "/api/auth/login", None, None::<&()>)
            .await
            .expect("request should succeed");

        let cookies = jar.cookies(&base).expect("jar should hold a cookie");
        assert_eq!(cookies.to_str().unwrap(), "sid=abc");
    }
}
