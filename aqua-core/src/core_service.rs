//! Built-in service exposing `/aqua/ping`, `/aqua/status`, and `/aqua/time`.

use crate::http::{Body, Request, Response, StatusCode, CONTENT_LENGTH, CONTENT_TYPE};
use crate::invoker::{handler, raw_handler};
use crate::service::{Service, ServiceDescriptor};
use serde_json::Map as JsonMap;
use serde_json::Value as Json;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

pub struct CoreService;

impl Service for CoreService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("CoreService")
            .tag(r#"root:"/aqua/""#)
            .get("ping", r#"url:"/ping""#, handler(|| async { "pong" }))
            .get(
                "status",
                r#"url:"/status" pretty:"true""#,
                handler(|| async { status_map() }),
            )
            .get("date", r#"url:"/time""#, raw_handler(current_time))
    }
}

fn status_map() -> JsonMap<String, Json> {
    let mut out = JsonMap::new();

    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.refresh_processes();

    let mut mem = JsonMap::new();

    // machine-wide view
    let mut general = JsonMap::new();
    general.insert("used".into(), Json::from(byte_size(sys.used_memory())));
    general.insert("free".into(), Json::from(byte_size(sys.free_memory())));
    general.insert("total".into(), Json::from(byte_size(sys.total_memory())));
    mem.insert("general".into(), Json::Object(general));

    // this process's allocations
    let mut heap = JsonMap::new();
    if let Ok(pid) = sysinfo::get_current_pid() {
        if let Some(process) = sys.process(pid) {
            heap.insert("alloc".into(), Json::from(byte_size(process.memory())));
            heap.insert(
                "sys".into(),
                Json::from(byte_size(process.virtual_memory())),
            );
        }
    }
    mem.insert("heap".into(), Json::Object(heap));

    out.insert("mem".into(), Json::Object(mem));
    out.insert(
        "server-time".into(),
        Json::from(chrono::Local::now().format(TIME_FORMAT).to_string()),
    );
    out.insert(
        "rust-version".into(),
        Json::from(env!("CARGO_PKG_RUST_VERSION")),
    );
    out.insert("os".into(), Json::from(std::env::consts::OS));
    out.insert("arch".into(), Json::from(std::env::consts::ARCH));
    out.insert(
        "aqua-version".into(),
        Json::from(env!("CARGO_PKG_VERSION")),
    );
    out
}

fn byte_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

async fn current_time(_req: Request) -> Response {
    let now = chrono::Local::now().format(TIME_FORMAT).to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, now.len())
        .body(Body::from(now))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
