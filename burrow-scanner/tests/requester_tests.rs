use burrow_scanner::{ClientOptions, Requester, ScanError, build_client};
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn requester(follow_redirects: bool) -> Requester {
    let client = build_client(&ClientOptions {
        timeout: Duration::from_secs(5),
        follow_redirects,
        ..Default::default()
    })
    .unwrap();
    Requester::new(client)
}

#[tokio::test]
async fn test_request_decorations_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/target"))
        .and(header("user-agent", "burrow-test"))
        .and(header("cookie", "session=abc"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("x-api-key", "k1"))
        .and(body_string("a=1"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&mock_server)
        .await;

    let requester = requester(false)
        .with_user_agent("burrow-test")
        .with_cookies("session=abc")
        .with_basic_auth("dXNlcjpwYXNz")
        .with_body("a=1")
        .with_headers(&["X-Api-Key: k1"])
        .unwrap();

    let response = requester
        .send("POST", &format!("{}/target", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(response.method, "POST");
    assert_eq!(response.body_text(), "created");
    assert_eq!(response.content_length(), 7);
}

#[tokio::test]
async fn test_redirects_not_followed_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/old", mock_server.uri());

    let not_followed = requester(false).send("GET", &url).await.unwrap();
    assert_eq!(not_followed.status_code, 301);
    assert!(not_followed.is_redirect());
    assert_eq!(not_followed.location(), Some("/new"));

    let followed = requester(true).send("GET", &url).await.unwrap();
    assert_eq!(followed.status_code, 200);
    assert_eq!(followed.url.path(), "/new");
}

#[tokio::test]
async fn test_custom_method_and_head() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(207))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let requester = requester(false);
    let propfind = requester
        .send("PROPFIND", &format!("{}/dav", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(propfind.status_code, 207);

    let head = requester
        .send("HEAD", &format!("{}/x", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(head.status_code, 200);
    assert!(head.body.is_empty());
}

#[tokio::test]
async fn test_connection_failure_is_http_error() {
    let requester = requester(false);
    let err = requester.send("GET", "http://127.0.0.1:1/").await.unwrap_err();
    assert!(matches!(err, ScanError::HttpError(_)));
}

#[tokio::test]
async fn test_invalid_method_rejected() {
    let requester = requester(false);
    let err = requester
        .send("BAD METHOD", "http://127.0.0.1:1/")
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidMethod(_)));
}

#[tokio::test]
async fn test_vhost_overrides_host_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("host", "vhost.example"))
        .respond_with(ResponseTemplate::new(200).set_body_string("virtual"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(10)
        .mount(&mock_server)
        .await;

    let url = format!("{}/", mock_server.uri());
    let plain = requester(false).send("GET", &url).await.unwrap();
    assert_eq!(plain.status_code, 404);

    let response = requester(false)
        .with_vhost("vhost.example")
        .send("GET", &url)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body_text(), "virtual");
}
