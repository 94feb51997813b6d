use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use stockella_api::ApiConfig;
use stockella_auth::{JwtClaims, Role};
use stockella_core::UserId;
use stockella_infra::BootstrapAdmin;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        Self::spawn_with(ApiConfig::in_memory(jwt_secret)).await
    }

    async fn spawn_with(config: ApiConfig) -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = stockella_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, roles: &[&str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles: roles.iter().map(|r| Role::new(r.to_string())).collect(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, token: &str, body: Value) -> Value {
    let res = client
        .post(srv.url("/products"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn post_movement(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    product_id: &str,
    kind: &str,
    quantity: i64,
) -> reqwest::Response {
    client
        .post(srv.url("/movements"))
        .bearer_auth(token)
        .json(&json!({ "productId": product_id, "kind": kind, "quantity": quantity }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let foreign = mint_jwt("other-secret", &["admin"]);
    let res = client.get(srv.url("/whoami")).bearer_auth(foreign).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_roles_and_permissions() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, &["employee"]);

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "employee"));
    let perms = body["permissions"].as_array().unwrap();
    assert!(perms.iter().any(|p| p == "movements.create"));
    assert!(!perms.iter().any(|p| p == "audit.read"));
}

#[tokio::test]
async fn movement_lifecycle_updates_stock_and_raises_alert() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({ "code": "BLT-01", "name": "Hex bolt", "price": "0.35", "stock": 10, "minStock": 5 }),
    )
    .await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let res = post_movement(&client, &srv, &admin, &product_id, "Outflow", 4).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["newStock"], 6);
    assert!(receipt.get("alertId").is_none());

    let res = post_movement(&client, &srv, &admin, &product_id, "Outflow", 2).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["newStock"], 4);
    let alert_id = receipt["alertId"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["stock"], 4);

    let res = client
        .get(srv.url(&format!("/movements?productId={product_id}&kind=Outflow")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let movements: Value = res.json().await.unwrap();
    assert_eq!(movements.as_array().unwrap().len(), 2);

    let res = client
        .put(srv.url(&format!("/alerts/{alert_id}/acknowledge")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let alert: Value = res.json().await.unwrap();
    assert_eq!(alert["acknowledged"], true);

    let res = client
        .get(srv.url("/alerts?acknowledged=false"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let open: Value = res.json().await.unwrap();
    assert!(open.as_array().unwrap().is_empty());

    let res = client
        .get(srv.url("/audit?action=Update&detail=outflow"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let entries: Value = res.json().await.unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_movements_map_to_client_errors() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({ "code": "NUT-02", "name": "Wing nut", "stock": 3 }),
    )
    .await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let res = post_movement(&client, &srv, &admin, &product_id, "Outflow", 5).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    let res = post_movement(&client, &srv, &admin, &product_id, "Inflow", 0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");

    let res = post_movement(&client, &srv, &admin, &product_id, "Sideways", 1).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_kind");

    let unknown = UserId::new().to_string();
    let res = post_movement(&client, &srv, &admin, &unknown, "Inflow", 1).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["stock"], 3);
}

#[tokio::test]
async fn viewer_cannot_record_movements() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let viewer = mint_jwt(jwt_secret, &["viewer"]);
    let client = reqwest::Client::new();

    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({ "code": "WSH-03", "name": "Washer", "stock": 20 }),
    )
    .await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let res = post_movement(&client, &srv, &viewer, &product_id, "Inflow", 1).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/audit"))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/dashboard"))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["activeProducts"], 1);
    assert_eq!(summary["movementsToday"], 0);
}

#[tokio::test]
async fn product_listing_is_paged_and_searchable() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let editor = mint_jwt(jwt_secret, &["editor"]);
    let client = reqwest::Client::new();

    for (code, name) in [("A-1", "Steel bolt"), ("A-2", "Brass bolt"), ("A-3", "Rubber gasket")] {
        create_product(&client, &srv, &editor, json!({ "code": code, "name": name })).await;
    }

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&editor)
        .json(&json!({ "code": "A-1", "name": "Duplicate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(srv.url("/products?search=BOLT&limit=1"))
        .bearer_auth(&editor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 2);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
}

async fn post_raw_movement(client: &reqwest::Client, srv: &TestServer, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/movements"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let is_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    assert!(is_json, "{status} response was not JSON");
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn non_integer_quantities_are_rejected_as_invalid_quantity() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let product = create_product(&client, &srv, &admin, json!({ "code": "FRC-01", "name": "Cable", "stock": 5 })).await;
    let product_id = product["id"].as_str().unwrap().to_string();

    for quantity in [json!(1.5), json!("2"), Value::Null, json!(1e20)] {
        let (status, body) = post_raw_movement(
            &client,
            &srv,
            &admin,
            json!({ "productId": product_id, "kind": "Inflow", "quantity": quantity }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "quantity {quantity}");
        assert_eq!(body["error"], "invalid_quantity", "quantity {quantity}");
    }

    let (status, body) = post_raw_movement(&client, &srv, &admin, json!({ "productId": product_id, "kind": "Inflow" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let res = client
        .get(srv.url(&format!("/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["stock"], 5);
}

#[tokio::test]
async fn malformed_bodies_and_queries_use_the_error_envelope() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&admin)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].is_string());

    let (status, body) = post_raw_movement(&client, &srv, &admin, json!({ "kind": "Inflow", "quantity": 1 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_body");

    let res = client
        .get(srv.url("/products?page=first"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_query");
}

fn config_with_admin(jwt_secret: &str) -> ApiConfig {
    let mut config = ApiConfig::in_memory(jwt_secret);
    config.bootstrap_admin = Some(BootstrapAdmin {
        name: "Root".into(),
        email: "root@example.com".into(),
        password: "root-password".into(),
    });
    config
}

async fn login(client: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn login_issues_a_token_the_api_accepts() {
    let srv = TestServer::spawn_with(config_with_admin("test-secret")).await;
    let client = reqwest::Client::new();

    let res = login(&client, &srv, " ROOT@example.com", "root-password").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["email"], "root@example.com");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["expiresAt"].is_string());

    let res = client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user_id"], body["user"]["id"]);
    assert!(me["permissions"].as_array().unwrap().iter().any(|p| p == "users.manage"));

    for (email, password) in [("root@example.com", "wrong-password"), ("nobody@example.com", "root-password")] {
        let res = login(&client, &srv, email, password).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_credentials");
    }
}

#[tokio::test]
async fn admins_manage_users_and_others_cannot() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let editor = mint_jwt(jwt_secret, &["editor"]);
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/users")).bearer_auth(&editor).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/users"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Ana", "email": "ana@example.com", "password": "ana-password", "role": "employee" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let ana: Value = res.json().await.unwrap();
    let ana_id = ana["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/users"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Ana again", "email": "ANA@example.com", "password": "ana-password", "role": "viewer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(srv.url("/users?search=ANA@"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], ana_id.as_str());

    let res = client
        .put(srv.url(&format!("/users/{ana_id}")))
        .bearer_auth(&admin)
        .json(&json!({ "active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["active"], false);

    let res = login(&client, &srv, "ana@example.com", "ana-password").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(srv.url(&format!("/users/{ana_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/users/{ana_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn categories_filter_products_and_shape_the_dashboard() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, &["admin"]);
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/categories"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Fasteners" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let fasteners: Value = res.json().await.unwrap();
    let category_id = fasteners["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/categories"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "fasteners" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let bolt = create_product(
        &client,
        &srv,
        &admin,
        json!({ "code": "CAT-01", "name": "Bolt", "stock": 12, "categoryId": category_id }),
    )
    .await;
    create_product(&client, &srv, &admin, json!({ "code": "CAT-02", "name": "Tape", "stock": 3 })).await;

    let res = client
        .get(srv.url(&format!("/products?category={category_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], bolt["id"]);

    let res = client
        .get(srv.url("/products?category=tools"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(srv.url(&format!("/categories/{category_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let bolt_id = bolt["id"].as_str().unwrap().to_string();
    let res = post_movement(&client, &srv, &admin, &bolt_id, "Outflow", 2).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client.get(srv.url("/dashboard")).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["activeUsers"], 0);
    assert_eq!(summary["inStock"], 2);

    let by_category = summary["stockByCategory"].as_array().unwrap();
    assert_eq!(by_category.len(), 2);
    assert_eq!(by_category[0]["category"], "Fasteners");
    assert_eq!(by_category[0]["total"], 10);
    assert_eq!(by_category[1]["category"], "Uncategorized");
    assert!(by_category[1]["categoryId"].is_null());

    let week = summary["weeklyMovements"].as_array().unwrap();
    assert_eq!(week.len(), 7);
    assert_eq!(week[6]["outflow"], 2);
    assert_eq!(week[6]["inflow"], 0);
}
