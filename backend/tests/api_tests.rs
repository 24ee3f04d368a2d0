//! HTTP-level tests against a running backend.
//!
//! The server must have completed its startup sequence (fixtures loaded).
//! ```sh
//! export TEST_BASE_URL="http://127.0.0.1:8000"
//! cargo test --test api_tests -- --ignored
//! ```

mod common;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use common::fixtures::{recipe_payload, TestUser};
use common::{auth_header, base_url, test_id};

struct Session {
    client: Client,
    base_url: String,
    token: String,
    user_id: i64,
}

impl Session {
    /// Register a fresh user and log in.
    async fn register(name: &str) -> Self {
        let client = Client::new();
        let base_url = base_url();
        let user = TestUser::with_name(name);

        let resp = client
            .post(format!("{base_url}/api/users/"))
            .json(&user.registration())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = resp.json().await.unwrap();
        assert!(created.get("password").is_none());

        let resp = client
            .post(format!("{base_url}/api/auth/token/login/"))
            .json(&json!({ "email": user.email, "password": user.password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();

        Self {
            client,
            base_url,
            token: body["auth_token"].as_str().unwrap().to_string(),
            user_id: created["id"].as_i64().unwrap(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Authorization", auth_header(&self.token))
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("Authorization", auth_header(&self.token))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .header("Authorization", auth_header(&self.token))
            .send()
            .await
            .unwrap()
    }

    /// First tag and ingredient from the seeded reference data.
    async fn reference_ids(&self) -> (i64, i64) {
        let tags: Value = self.get("/api/tags/").await.json().await.unwrap();
        let ingredients: Value = self.get("/api/ingredients/").await.json().await.unwrap();
        (
            tags[0]["id"].as_i64().expect("no tags loaded"),
            ingredients[0]["id"].as_i64().expect("no ingredients loaded"),
        )
    }

    async fn create_recipe(&self, name: &str, amount: i64) -> Value {
        let (tag, ingredient) = self.reference_ids().await;
        let resp = self
            .post("/api/recipes/", recipe_payload(name, tag, ingredient, amount))
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
#[ignore]
async fn test_profile_and_token_lifecycle() {
    let session = Session::register(&test_id()).await;

    let me: Value = session.get("/api/users/me/").await.json().await.unwrap();
    assert_eq!(me["id"], session.user_id);
    assert_eq!(me["is_subscribed"], false);

    let resp = session.post("/api/auth/token/logout/", json!({})).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = session.get("/api/users/me/").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_recipe_crud_and_permissions() {
    let author = Session::register(&test_id()).await;
    let other = Session::register(&test_id()).await;

    let recipe = author.create_recipe("Pancakes", 200).await;
    let id = recipe["id"].as_i64().unwrap();
    assert_eq!(recipe["author"]["id"], author.user_id);
    assert!(recipe["image"].as_str().unwrap().starts_with("/media/recipes/"));

    let resp = other.delete(&format!("/api/recipes/{id}/")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = author.delete(&format!("/api/recipes/{id}/")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = author.get(&format!("/api/recipes/{id}/")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_recipe_validation_errors() {
    let session = Session::register(&test_id()).await;
    let (tag, ingredient) = session.reference_ids().await;

    let mut payload = recipe_payload("Soup", tag, ingredient, 1);
    payload["cooking_time"] = json!(0);
    let resp = session.post("/api/recipes/", payload).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["fields"]["cooking_time"].is_array());

    let mut payload = recipe_payload("Soup", tag, ingredient, 1);
    payload["tags"] = json!([]);
    let resp = session.post("/api/recipes/", payload).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_favorites_and_shopping_list() {
    let session = Session::register(&test_id()).await;
    let first = session.create_recipe("Omelette", 100).await;
    let second = session.create_recipe("Frittata", 50).await;

    let resp = session.get("/api/recipes/download_shopping_cart/").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for recipe in [&first, &second] {
        let id = recipe["id"].as_i64().unwrap();
        let resp = session.post(&format!("/api/recipes/{id}/shopping_cart/"), json!({})).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
    let id = first["id"].as_i64().unwrap();
    let resp = session.post(&format!("/api/recipes/{id}/shopping_cart/"), json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = session.post(&format!("/api/recipes/{id}/favorite/"), json!({})).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let short: Value = resp.json().await.unwrap();
    assert_eq!(short["name"], "Omelette");

    let page: Value = session
        .get("/api/recipes/?is_favorited=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 1);

    let resp = session.get("/api/recipes/download_shopping_cart/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("_shopping_list.txt"));
    let text = resp.text().await.unwrap();
    assert!(text.contains(" - 150"), "{text}");
}

#[tokio::test]
#[ignore]
async fn test_subscriptions() {
    let reader = Session::register(&test_id()).await;
    let author = Session::register(&test_id()).await;
    author.create_recipe("Bread", 500).await;
    author.create_recipe("Rolls", 300).await;

    let resp = reader
        .post(&format!("/api/users/{}/subscribe/", reader.user_id), json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = reader
        .post(
            &format!("/api/users/{}/subscribe/?recipes_limit=1", author.user_id),
            json!({}),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["is_subscribed"], true);
    assert_eq!(view["recipes_count"], 2);
    assert_eq!(view["recipes"].as_array().unwrap().len(), 1);

    let page: Value = reader
        .get("/api/users/subscriptions/")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 1);

    let path = format!("/api/users/{}/subscribe/", author.user_id);
    assert_eq!(reader.delete(&path).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(reader.delete(&path).await.status(), StatusCode::BAD_REQUEST);
}
