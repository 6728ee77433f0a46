mod common;

use aqua_core::prelude::*;
use common::TestApp;

struct VerService;

impl Service for VerService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("VerService")
            .tag(r#"root:"versioning""#)
            .get("apiVersion1", r#"version:"1" url:"api""#, handler(|| async { "one" }))
            .get("apiVersion2", r#"version:"2" url:"api""#, handler(|| async { "two" }))
    }
}

struct NewVerService;

impl Service for NewVerService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("NewVerService")
            .tag(r#"root:"versioning""#)
            .get("apiVersion3", r#"version:"3" url:"api""#, handler(|| async { "three" }))
    }
}

fn ver_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(VerService);
    server.add_service(NewVerService);
    TestApp::new(server)
}

#[tokio::test]
async fn direct_unversioned_calls_are_404() {
    let app = ver_app();
    assert_eq!(app.get("/versioning/api").await.status, 404);
}

#[tokio::test]
async fn versioned_urls_are_honoured() {
    let app = ver_app();
    let resp = app.get("/v1/versioning/api").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "one");

    let resp = app.get("/v2/versioning/api").await;
    assert_eq!(resp.text(), "two");
}

#[tokio::test]
async fn vendor_style_accept_header_negotiates() {
    let app = ver_app();
    let resp = app
        .get_with_accept("/versioning/api", "application/vnd.api-v1+json")
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "one");
}

#[tokio::test]
async fn parameter_style_accept_header_negotiates() {
    let app = ver_app();
    let resp = app
        .get_with_accept("/versioning/api", "application/vnd.api+json;version=1")
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "one");
}

#[tokio::test]
async fn versions_are_independent_within_a_service() {
    let app = ver_app();
    let resp = app
        .get_with_accept("/versioning/api", "application/vnd.api-v2+json")
        .await;
    assert_eq!(resp.text(), "two");
}

#[tokio::test]
async fn versions_are_independent_across_services() {
    let app = ver_app();
    let resp = app
        .get_with_accept("/versioning/api", "application/vnd.api-v3+json")
        .await;
    assert_eq!(resp.text(), "three");
}

#[tokio::test]
async fn all_three_forms_agree() {
    let app = ver_app();
    let direct = app.get("/v1/versioning/api").await;
    let vendor = app
        .get_with_accept("/versioning/api", "application/vnd.api-v1+json")
        .await;
    let param = app
        .get_with_accept("/versioning/api", "application/vnd.api+json;version=1")
        .await;
    assert_eq!(direct.text(), vendor.text());
    assert_eq!(vendor.text(), param.text());
}

#[tokio::test]
async fn custom_vendor_token_is_respected() {
    struct VndService;
    impl Service for VndService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("VndService")
                .tag(r#"root:"v" vendor:"vnd.acme""#)
                .get("api", r#"version:"9" url:"api""#, handler(|| async { "acme" }))
        }
    }
    let mut server = RestServer::new();
    server.add_service(VndService);
    let app = TestApp::new(server);

    let resp = app
        .get_with_accept("/v/api", "application/vnd.acme-v9+json")
        .await;
    assert_eq!(resp.text(), "acme");
    // the default vendor token does not match
    assert_eq!(
        app.get_with_accept("/v/api", "application/vnd.api-v9+json")
            .await
            .status,
        404
    );
}
