// HTTP API tests for the registry routes against the in-memory backend

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};
use wayfinder_registry::{MemoryStorage, Registry};
use wayfinder_server::api::route::{json_config, query_config, registry_routes};

macro_rules! registry_app {
    ($registry:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($registry))
                .app_data(json_config())
                .app_data(query_config())
                .service(registry_routes()),
        )
        .await
    };
}

fn memory_registry() -> Registry {
    Registry::new(Arc::new(MemoryStorage::new()))
}

fn instance_body(id: &str, name: &str, tags: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "address": "10.0.0.1",
        "port": 8080,
        "tags": tags,
        "meta": {"zone": "a"}
    })
}

fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|i| i["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[actix_web::test]
async fn test_register_and_get_instance() {
    let app = registry_app!(memory_registry());

    let req = test::TestRequest::post()
        .uri("/v1/registry/services")
        .set_json(instance_body("web-1", "web", &["v1"]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services/web-1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["name"], "web");
    assert_eq!(body["data"]["port"], 8080);
    assert_eq!(body["data"]["meta"]["zone"], "a");
    assert_eq!(body["data"]["health"]["status"], "passing");
}

#[actix_web::test]
async fn test_get_unknown_instance_is_not_found() {
    let app = registry_app!(memory_registry());

    let req = test::TestRequest::get()
        .uri("/v1/registry/services/missing")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 21003);
}

#[actix_web::test]
async fn test_register_validation() {
    let app = registry_app!(memory_registry());

    let cases = [
        json!({"id": "", "name": "web", "address": "10.0.0.1", "port": 80}),
        json!({"id": "a", "name": "", "address": "10.0.0.1", "port": 80}),
        json!({"id": "a", "name": "web", "address": "10.0.0.1", "port": 0}),
        json!({"id": "a", "name": "web", "address": "10.0.0.1", "port": 70000}),
    ];

    for body in cases {
        let req = test::TestRequest::post()
            .uri("/v1/registry/services")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

#[actix_web::test]
async fn test_malformed_body_uses_envelope() {
    let app = registry_app!(memory_registry());

    let req = test::TestRequest::post()
        .uri("/v1/registry/services")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 100004);
}

#[actix_web::test]
async fn test_deregister_twice() {
    let app = registry_app!(memory_registry());

    let req = test::TestRequest::post()
        .uri("/v1/registry/services")
        .set_json(instance_body("web-1", "web", &[]))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::delete()
        .uri("/v1/registry/services/web-1")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri("/v1/registry/services/web-1")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_list_by_name_and_tags() {
    let app = registry_app!(memory_registry());

    for (id, name, tags) in [
        ("a", "web", vec!["x", "y"]),
        ("b", "web", vec!["x"]),
        ("c", "api", vec!["x", "y"]),
    ] {
        let req = test::TestRequest::post()
            .uri("/v1/registry/services")
            .set_json(instance_body(id, name, &tags))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri("/v1/registry/services?name=web")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec!["a", "b"]);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services?name=web&tags=x,y")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec!["a"]);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services?tags=x,y")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec!["a", "c"]);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_health_update_filters_discovery() {
    let app = registry_app!(memory_registry());

    for id in ["a", "b"] {
        let req = test::TestRequest::post()
            .uri("/v1/registry/services")
            .set_json(instance_body(id, "web", &["x"]))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::put()
        .uri("/v1/registry/services/b/health")
        .set_json(json!({"status": "critical", "output": "connection refused"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/v1/registry/healthy?name=web")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec!["a"]);

    let req = test::TestRequest::get()
        .uri("/v1/registry/healthy?name=web&tags=x")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ids(&body), vec!["a"]);

    let req = test::TestRequest::put()
        .uri("/v1/registry/services/missing/health")
        .set_json(json!({"status": "passing"}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_refresh_ttl() {
    let app = registry_app!(memory_registry());

    let req = test::TestRequest::post()
        .uri("/v1/registry/services")
        .set_json(instance_body("a", "web", &[]))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::put()
        .uri("/v1/registry/services/a/ttl")
        .set_json(json!({"ttl": 45}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services/a")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["ttl"], 45);

    let req = test::TestRequest::put()
        .uri("/v1/registry/services/missing/ttl")
        .set_json(json!({"ttl": 45}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_catalog_and_summary() {
    let app = registry_app!(memory_registry());

    for (id, name) in [("a", "web"), ("b", "web"), ("c", "db")] {
        let req = test::TestRequest::post()
            .uri("/v1/registry/services")
            .set_json(instance_body(id, name, &[]))
            .to_request();
        test::call_service(&app, req).await;
    }
    let req = test::TestRequest::put()
        .uri("/v1/registry/services/a/health")
        .set_json(json!({"status": "warning"}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/v1/registry/catalog")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["web"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"]["db"].as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::get()
        .uri("/v1/registry/catalog/summary")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body["data"],
        json!([
            {"name": "db", "instanceCount": 1, "healthyInstanceCount": 1},
            {"name": "web", "instanceCount": 2, "healthyInstanceCount": 1}
        ])
    );
}

#[actix_web::test]
async fn test_closed_backend_is_service_unavailable() {
    let registry = memory_registry();
    registry.close().await.unwrap();
    let app = registry_app!(registry);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services?name=web")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 30001);
}

#[actix_web::test]
async fn test_expired_instance_disappears() {
    let registry = memory_registry();
    let app = registry_app!(registry.clone());

    let mut body = instance_body("short", "web", &[]);
    body["ttl"] = json!(1);
    let req = test::TestRequest::post()
        .uri("/v1/registry/services")
        .set_json(body)
        .to_request();
    test::call_service(&app, req).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(registry.sweep_expired().await.unwrap(), 1);

    let req = test::TestRequest::get()
        .uri("/v1/registry/services/short")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}
