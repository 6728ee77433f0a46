//! A small Aqua application: a catalog service with a CRUD-backed order
//! resource, response caching, and an access-log module.

use aqua::prelude::*;

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct Order {
    id: i64,
    item: String,
    quantity: i64,
}

aqua::api_type!(Order => "demo.Order");

impl Model for Order {
    fn table_name() -> &'static str {
        "orders"
    }
}

struct CatalogService;

impl Service for CatalogService {
    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new("CatalogService")
            .tag(r#"prefix:"api" version:"1""#)
            .get("motd", r#"url:"/motd" modules:"access""#, handler(|| async {
                "all systems running"
            }))
            .get(
                "item",
                r#"url:"/items/{id}" cache:"main" ttl:"30s""#,
                handler(|id: i64| async move {
                    Order {
                        id,
                        item: format!("item-{id}"),
                        quantity: 1,
                    }
                }),
            )
            .get("echo", r#"url:"/echo""#, handler(|mut j: Aide| async move {
                j.load_vars().await;
                j.query_var("say")
            }))
            .crud("order", r#"url:"/orders""#, || {
                Crud::new("sqlite3", "file::memory:")
                    .model::<Order>()
                    .with_rows()
            })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    aqua::init_tracing();

    let mut server = RestServer::new();
    aqua::ServerConfig::from_env().apply(&mut server);

    server.add_module("access", mod_access_log());
    server.add_cache("main", InMemoryStore::new());

    let driver = MemoryDriver::new();
    driver.seed(
        "orders",
        vec![serde_json::json!({"id": 1, "item": "kettle", "quantity": 2})],
    );
    server.storage().add_driver("sqlite3", driver);

    server.add_service(CatalogService);
    server.run().await
}
