mod common;

use aqua_core::http::{Request, Response, StatusCode};
use aqua_core::prelude::*;
use aqua_core::SetupError;
use common::TestApp;

#[derive(serde::Serialize, serde::Deserialize)]
struct Release {
    version: String,
}

aqua_core::api_type!(Release => "tests.Release");

// ── Built-ins ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_pongs() {
    let app = TestApp::new(RestServer::new());
    let resp = app.get("/aqua/ping").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "pong");
    assert_eq!(resp.content_type, "text/plain");
}

#[tokio::test]
async fn status_reports_runtime_info() {
    let app = TestApp::new(RestServer::new());
    let resp = app.get("/aqua/status").await;
    assert_eq!(resp.status, 200);
    let json = resp.json();
    assert!(json["mem"].get("general").is_some());
    assert!(json["mem"].get("heap").is_some());
    assert!(json.get("server-time").is_some());
    assert!(!json["rust-version"].as_str().unwrap().is_empty());
    assert!(json.get("aqua-version").is_some());
    // the status endpoint asks for pretty output
    assert!(resp.text().contains('\n'));
}

#[tokio::test]
async fn time_is_plain_text() {
    let app = TestApp::new(RestServer::new());
    let resp = app.get("/aqua/time").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "text/plain");
    assert!(!resp.text().is_empty());
}

// ── URL construction ────────────────────────────────────────────────────────

struct NamingService;

impl Service for NamingService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("NamingService")
            .tag(r#"root:"any" prefix:"day""#)
            .get("getapi", r#"version:"1.0" url:"api""#, handler(|| async { "whoa" }))
            .get("noversion", r#"url:"noversion-here""#, handler(|| async { "cool" }))
            .get("defaultUrl", "", handler(|| async { "named" }))
    }
}

#[tokio::test]
async fn urls_combine_prefix_version_root_and_url() {
    let mut server = RestServer::new();
    server.add_service(NamingService);
    let app = TestApp::new(server);

    assert_eq!(app.get("/day/v1.0/any/api").await.status, 200);
    assert_eq!(app.get("/day/any/noversion-here").await.status, 200);
    // missing url falls back to the kebab-cased field name
    assert_eq!(app.get("/day/any/default-url").await.text(), "named");
}

struct RootlessService;

impl Service for RootlessService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("RootlessService")
            .tag(r#"root:"-""#)
            .get("top", r#"url:"/top""#, handler(|| async { "top" }))
    }
}

#[tokio::test]
async fn dash_root_suppresses_the_segment() {
    let mut server = RestServer::new();
    server.add_service(RootlessService);
    let app = TestApp::new(server);
    assert_eq!(app.get("/top").await.status, 200);
}

#[tokio::test]
async fn default_root_is_service_name_without_suffix() {
    struct WidgetService;
    impl Service for WidgetService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("WidgetService")
                .get("list", "", handler(|| async { "widgets" }))
        }
    }
    let mut server = RestServer::new();
    server.add_service(WidgetService);
    let app = TestApp::new(server);
    assert_eq!(app.get("/widget/list").await.text(), "widgets");
}

// ── Output data formats ─────────────────────────────────────────────────────

struct DataService;

impl Service for DataService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("DataService")
            .tag(r#"root:"data""#)
            .get("getStruct", "", handler(|| async {
                Release {
                    version: "1.2.3".into(),
                }
            }))
            .get("getStructI", "", handler(|| async {
                Value::Struct {
                    name: "tests.Release".into(),
                    body: serde_json::json!({"version": "1.2.3.4"}),
                }
            }))
            .get("getString", "", handler(|| async { "5" }))
            .get("getStringI", "", handler(|| async { Value::Str("5.5".into()) }))
            .get("getMap", "", handler(|| async {
                let mut m = serde_json::Map::new();
                m.insert("whats".into(), serde_json::json!("up"));
                m.insert("num".into(), serde_json::json!(1234));
                m
            }))
            .get("getSlice", "", handler(|| async {
                vec![
                    Release { version: "one".into() },
                    Release { version: "two".into() },
                ]
            }))
            .get("getSac", "", handler(|| async {
                Sac::new().set("a", 1).set("b", "two")
            }))
            .get("getPtr", "", handler(|| async {
                Box::new(Release {
                    version: "9".into(),
                })
            }))
    }
}

fn data_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(DataService);
    TestApp::new(server)
}

#[tokio::test]
async fn struct_output_is_json() {
    let app = data_app();
    let resp = app.get("/data/get-struct").await;
    assert_eq!(resp.content_type, "application/json");
    assert_eq!(resp.json()["version"], "1.2.3");
}

#[tokio::test]
async fn dynamic_struct_output_is_json() {
    let app = data_app();
    let resp = app.get("/data/get-struct-i").await;
    assert_eq!(resp.json()["version"], "1.2.3.4");
}

#[tokio::test]
async fn string_outputs_are_raw() {
    let app = data_app();
    assert_eq!(app.get("/data/get-string").await.text(), "5");
    assert_eq!(app.get("/data/get-string-i").await.text(), "5.5");
}

#[tokio::test]
async fn map_output_is_json() {
    let app = data_app();
    let json = app.get("/data/get-map").await.json();
    assert_eq!(json["whats"], "up");
    assert_eq!(json["num"], 1234);
}

#[tokio::test]
async fn slice_output_is_json_array() {
    let app = data_app();
    let json = app.get("/data/get-slice").await.json();
    assert_eq!(json[0]["version"], "one");
    assert_eq!(json[1]["version"], "two");
}

#[tokio::test]
async fn sac_output_is_its_map() {
    let app = data_app();
    let json = app.get("/data/get-sac").await.json();
    assert_eq!(json["a"], 1);
    assert_eq!(json["b"], "two");
}

#[tokio::test]
async fn pointer_output_is_dereferenced() {
    let app = data_app();
    assert_eq!(app.get("/data/get-ptr").await.json()["version"], "9");
}

// ── Two-return shapes ───────────────────────────────────────────────────────

struct PairService;

impl Service for PairService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("PairService")
            .tag(r#"root:"pair""#)
            .get("fixture", "", handler(|| async {
                (
                    200i64,
                    Fixture {
                        allow: "+-".into(),
                        ..Fixture::default()
                    },
                )
            }))
            .get("teapot", "", handler(|| async { (418i64, "short and stout") }))
            .get("okOrFault", r#"url:"/ok-or-fault/{mode}""#, handler(|mode: String| async move {
                if mode == "ok" {
                    Ok("all good".to_string())
                } else {
                    Err(Fault::new("there it is", "there it is").status(410))
                }
            }))
    }
}

fn pair_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(PairService);
    TestApp::new(server)
}

#[tokio::test]
async fn int_plus_body_sets_status() {
    let app = pair_app();
    let resp = app.get("/pair/fixture").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["Allow"], "+-");

    let resp = app.get("/pair/teapot").await;
    assert_eq!(resp.status, 418);
    assert_eq!(resp.text(), "short and stout");
}

#[tokio::test]
async fn body_plus_error_picks_a_side() {
    let app = pair_app();
    let resp = app.get("/pair/ok-or-fault/ok").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "all good");

    let resp = app.get("/pair/ok-or-fault/boom").await;
    assert_eq!(resp.status, 410);
    assert_eq!(resp.json()["message"], "there it is");
    assert_eq!(resp.json()["issue"], "there it is");
}

// ── Error formats ───────────────────────────────────────────────────────────

struct ErrService;

impl Service for ErrService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("ErrService")
            .tag(r#"root:"err""#)
            .get("getErrorI", "", handler(|| async {
                Value::Error("bingo-error".into())
            }))
            .get("getFaultI", "", handler(|| async {
                Value::Fault(Fault::new("shingo-error", "there was an error"))
            }))
            .post("postErrorI", "", handler(|| async {
                Value::Fault(Fault::new("shingo-error", "there was an error"))
            }))
    }
}

fn err_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(ErrService);
    TestApp::new(server)
}

#[tokio::test]
async fn opaque_errors_wrap_as_faults() {
    let app = err_app();
    let resp = app.get("/err/get-error-i").await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.json()["message"], "Oops! An error occurred");
    assert_eq!(resp.json()["issue"], "bingo-error");
}

#[tokio::test]
async fn faults_carry_their_message() {
    let app = err_app();
    let resp = app.get("/err/get-fault-i").await;
    assert_eq!(resp.status, 404);
    assert_eq!(resp.json()["message"], "there was an error");
    assert_eq!(resp.json()["issue"], "shingo-error");
}

#[tokio::test]
async fn post_fault_defaults_to_417() {
    let app = err_app();
    let resp = app.post_json("/err/post-error-i", "{}").await;
    assert_eq!(resp.status, 417);
}

// ── Path variable coercion ──────────────────────────────────────────────────

struct ItemService;

impl Service for ItemService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("ItemService")
            .tag(r#"root:"shop""#)
            .get("item", r#"url:"/items/{id}""#, handler(|id: i64| async move {
                format!("item #{id}")
            }))
            .get("pick", r#"url:"/pick/{n}/{tag}""#, handler(|n: u64, tag: String| async move {
                format!("{n}-{tag}")
            }))
            .get("strict", r#"url:"/strict/{code:[0-9]+}""#, handler(|code: i64| async move {
                format!("code {code}")
            }))
            .patch("touch", r#"url:"/items/{id}""#, handler(|id: i64| async move {
                format!("touched {id}")
            }))
            .delete("drop", r#"url:"/items/{id}""#, handler(|id: i64| async move {
                format!("dropped {id}")
            }))
    }
}

fn item_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(ItemService);
    TestApp::new(server)
}

#[tokio::test]
async fn int_path_vars_are_coerced() {
    let app = item_app();
    assert_eq!(app.get("/shop/items/42").await.text(), "item #42");
}

#[tokio::test]
async fn bad_int_is_a_client_error() {
    let app = item_app();
    let resp = app.get("/shop/items/abc").await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json()["message"], "Cannot convert [abc] to 'int'");
}

#[tokio::test]
async fn multiple_vars_keep_order() {
    let app = item_app();
    assert_eq!(app.get("/shop/pick/7/red").await.text(), "7-red");
}

#[tokio::test]
async fn patch_and_delete_markers_route_by_method() {
    let app = item_app();
    let req = Request::builder()
        .method("PATCH")
        .uri("/shop/items/3")
        .body(aqua_core::http::Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.text(), "touched 3");
    assert_eq!(app.delete("/shop/items/3").await.text(), "dropped 3");
}

#[tokio::test]
async fn regex_constraints_are_enforced() {
    let app = item_app();
    let resp = app.get("/shop/strict/123").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "code 123");
    assert_eq!(app.get("/shop/strict/12a").await.status, 404);
}

// ── Aide ────────────────────────────────────────────────────────────────────

struct AideService;

impl Service for AideService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("AideService")
            .tag(r#"root:"aide""#)
            .get("echo", "", handler(|mut j: Aide| async move {
                j.load_vars().await;
                j.query_var("abc")
            }))
            .get("echo2", "", handler(|j: Aide| async move { j.query_var("def") }))
            .post("form", "", handler(|mut j: Aide| async move {
                j.load_vars().await;
                format!("{}|{}", j.post_var("a"), j.query_var("q"))
            }))
            .post("raw", "", handler(|mut j: Aide| async move {
                j.load_vars().await;
                j.body
            }))
    }
}

fn aide_app() -> TestApp {
    let mut server = RestServer::new();
    server.add_service(AideService);
    TestApp::new(server)
}

#[tokio::test]
async fn aide_exposes_query_vars() {
    let app = aide_app();
    assert_eq!(app.get("/aide/echo?abc=whatsUp").await.text(), "whatsUp");
}

#[tokio::test]
async fn unloaded_aide_vars_are_empty() {
    let app = aide_app();
    assert_eq!(app.get("/aide/echo2?def=hello").await.text(), "");
}

#[tokio::test]
async fn form_posts_split_post_and_query_vars() {
    let app = aide_app();
    let resp = app
        .post(
            "/aide/form?q=search",
            "application/x-www-form-urlencoded",
            "a=1&a=2",
        )
        .await;
    assert_eq!(resp.text(), "1,2|search");
}

#[tokio::test]
async fn multipart_posts_populate_post_vars() {
    let app = aide_app();
    let body = concat!(
        "--boundary7\r\n",
        "Content-Disposition: form-data; name=\"a\"\r\n\r\n",
        "7\r\n",
        "--boundary7\r\n",
        "Content-Disposition: form-data; name=\"a\"\r\n\r\n",
        "8\r\n",
        "--boundary7--\r\n",
    );
    let resp = app
        .post(
            "/aide/form?q=multi",
            "multipart/form-data; boundary=boundary7",
            body,
        )
        .await;
    assert_eq!(resp.text(), "7,8|multi");
}

#[tokio::test]
async fn other_content_types_capture_the_raw_body() {
    let app = aide_app();
    let resp = app.post_json("/aide/raw", r#"{"k":"v"}"#).await;
    assert_eq!(resp.text(), r#"{"k":"v"}"#);
}

// ── Stubs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stub_serves_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("canned.json");
    std::fs::write(&path, r#"{"canned": true}"#).unwrap();

    struct StubService {
        path: String,
    }
    impl Service for StubService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("StubService")
                .tag(r#"root:"stub""#)
                .stub("mocked", &format!(r#"url:"/mocked" stub:"{}""#, self.path))
                .stub("broken", r#"url:"/broken" stub:"/no/such/file""#)
        }
    }

    let mut server = RestServer::new();
    server.add_service(StubService {
        path: path.display().to_string(),
    });
    let app = TestApp::new(server);

    let resp = app.get("/stub/mocked").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json()["canned"], true);

    let resp = app.get("/stub/broken").await;
    assert_eq!(resp.status, 400);
    assert!(resp.json()["message"]
        .as_str()
        .unwrap()
        .starts_with("Error reading stub content"));
}

// ── Standard handlers ───────────────────────────────────────────────────────

struct RawService;

impl Service for RawService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("RawService")
            .tag(r#"root:"raw""#)
            .get("direct", "", raw_handler(direct))
    }
}

async fn direct(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::ACCEPTED)
        .body("handled directly".into())
        .unwrap()
}

#[tokio::test]
async fn std_handlers_get_the_request_whole() {
    let mut server = RestServer::new();
    server.add_service(RawService);
    let app = TestApp::new(server);
    let resp = app.get("/raw/direct").await;
    assert_eq!(resp.status, 202);
    assert_eq!(resp.text(), "handled directly");
}

// ── Registration errors ─────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_routes_fail_at_startup() {
    struct DupService;
    impl Service for DupService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("DupService")
                .get("one", r#"url:"/same""#, handler(|| async { "1" }))
                .get("two", r#"url:"/same""#, handler(|| async { "2" }))
        }
    }
    let mut server = RestServer::new();
    server.add_service(DupService);
    let err = server.load_all_endpoints().unwrap_err();
    assert!(matches!(err, SetupError::DuplicateRoute { .. }));
    assert!(err.to_string().starts_with("Multiple services found:"));
}

#[tokio::test]
async fn missing_module_fails_at_startup() {
    struct ModService;
    impl Service for ModService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("ModService")
                .get("x", r#"url:"/x" modules:"audit""#, handler(|| async { "x" }))
        }
    }
    let mut server = RestServer::new();
    server.add_service(ModService);
    let err = server.load_all_endpoints().unwrap_err();
    assert_eq!(err.to_string(), "Module:audit not found");
}

#[tokio::test]
async fn input_count_mismatch_fails_at_startup() {
    struct BadService;
    impl Service for BadService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("BadService")
                .get("x", r#"url:"/x""#, handler(|id: i64| async move { id }))
        }
    }
    let mut server = RestServer::new();
    server.add_service(BadService);
    assert!(matches!(
        server.load_all_endpoints().unwrap_err(),
        SetupError::InputCountMismatch { .. }
    ));
}

// ── Modules and authorization ───────────────────────────────────────────────

#[tokio::test]
async fn modules_wrap_the_endpoint() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_module = hits.clone();
    let counter: Module = Arc::new(move |next| {
        let hits = hits_in_module.clone();
        Arc::new(move |req| {
            hits.fetch_add(1, Ordering::SeqCst);
            next.as_ref()(req)
        })
    });

    struct ModdedService;
    impl Service for ModdedService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("ModdedService")
                .tag(r#"root:"m""#)
                .get("counted", r#"url:"/counted" modules:"counter""#, handler(|| async { "ok" }))
        }
    }

    let mut server = RestServer::new();
    server.add_module("counter", counter);
    server.add_service(ModdedService);
    let app = TestApp::new(server);

    assert_eq!(app.get("/m/counted").await.status, 200);
    assert_eq!(app.get("/m/counted").await.status, 200);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

struct HeaderAuth;

impl Authorizer for HeaderAuth {
    fn authorize(&self, req: &Request, allow: &str, _deny: &str) -> bool {
        req.headers()
            .get("x-role")
            .and_then(|v| v.to_str().ok())
            .map(|role| allow.is_empty() || allow.split(',').any(|a| a == role))
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn failed_authorization_is_a_canned_401() {
    struct SecureService;
    impl Service for SecureService {
        fn descriptor(&self) -> ServiceDescriptor {
            ServiceDescriptor::new("SecureService")
                .tag(r#"root:"sec""#)
                .get("admin", r#"url:"/admin" allow:"admin""#, handler(|| async { "top secret" }))
        }
    }

    let mut server = RestServer::new();
    server.set_auth(HeaderAuth);
    server.add_service(SecureService);
    let app = TestApp::new(server);

    let resp = app.get("/sec/admin").await;
    assert_eq!(resp.status, 401);
    assert_eq!(resp.json()["message"], "Unauthorized Access");

    let req = Request::builder()
        .method("GET")
        .uri("/sec/admin")
        .header("x-role", "admin")
        .body(aqua_core::http::Body::empty())
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "top secret");
}
