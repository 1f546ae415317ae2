//! Integration tests for the standards backend.

use std::io::Cursor;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{default_stores, Config};
use crate::db::{init_database, Repository, TaskStore};
use crate::photos::fake::FakeHost;
use crate::sync::TaskMirror;
use crate::{create_router, AppState};

const ADMIN: &str = "ADMIN-VOGUE-2025";
const VM: &str = "VM-VOGUE-2025";
const TAMPON: &str = "TAMPON-2025";
const DUPARC: &str = "DUPARC-2025";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    images: Arc<FakeHost>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database and mirror
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let store: Arc<dyn TaskStore> = Arc::new(Repository::new(pool));
        let mirror = Arc::new(
            TaskMirror::mount(store.clone())
                .await
                .expect("Failed to mount mirror"),
        );
        let images = Arc::new(FakeHost::default());

        // Create config
        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_json: false,
            image_host_url: "http://127.0.0.1:9/unused".to_string(),
            image_host_key: None,
            stores: default_stores(),
            photo_max_dimension: 1600,
            photo_max_bytes: 1024 * 1024,
        };

        let state = AppState {
            store,
            mirror,
            images: images.clone(),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            images,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, code: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("x-access-code", code)
            .send()
            .await
            .unwrap()
    }

    async fn post_json(&self, path: &str, code: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("x-access-code", code)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch_json(&self, path: &str, code: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .header("x-access-code", code)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Create a task as admin and return its id.
    async fn create_task(&self, store: &str, title: &str) -> String {
        let resp = self
            .post_json(
                "/api/tasks",
                ADMIN,
                json!({ "store": store, "title": title }),
            )
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn list(&self, query: &str, code: &str) -> Vec<Value> {
        let resp = self.get(&format!("/api/tasks{}", query), code).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["tasks"].as_array().unwrap().clone()
    }
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(32, 24, |x, y| image::Rgb([x as u8 * 8, y as u8 * 10, 128]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn photo_part() -> Part {
    Part::bytes(png_bytes())
        .file_name("photo.png")
        .mime_str("image/png")
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_missing_access_code() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/tasks"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_ACCESS_CODE");
}

#[tokio::test]
async fn test_unknown_access_code() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/tasks", "NOPE-2025").await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Code d'accès invalide");
}

#[tokio::test]
async fn test_login() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/session"))
        .json(&json!({ "code": "  LEPORT-2025 " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "store");
    assert_eq!(body["data"]["store"], "Vogue Le Port");

    let resp = fixture
        .client
        .post(fixture.url("/api/session"))
        .json(&json!({ "code": "leport-2025" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_whoami_accepts_bearer_code() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/session/me"))
        .bearer_auth(VM)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "vm");
    assert!(body["data"]["store"].is_null());
}

#[tokio::test]
async fn test_stores_list() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/stores", TAMPON).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 7);
    assert_eq!(body["data"][0], "Vogue Le Port");
}

#[tokio::test]
async fn test_create_is_visible_in_next_list() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/api/tasks",
            VM,
            json!({
                "store": "Vogue Tampon",
                "title": "Vitrine printemps",
                "deadline": "2025-01-01"
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Non conforme");
    assert_eq!(body["data"]["validation"], "Non contrôlé");
    assert_eq!(body["data"]["feedbackMagasin"], "");
    assert_eq!(body["data"]["guidePhotos"], json!([]));
    let revision = body["revisionId"].as_i64().unwrap();
    assert!(revision >= 1);

    let resp = fixture.get("/api/tasks", ADMIN).await;
    let list: Value = resp.json().await.unwrap();
    assert_eq!(list["revisionId"].as_i64().unwrap(), revision);
    let tasks = list["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Vitrine printemps");
    assert_eq!(tasks[0]["overdue"], true);
}

#[tokio::test]
async fn test_create_requires_title() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json("/api/tasks", ADMIN, json!({ "store": "Vogue Tampon" }))
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Renseignez au minimum la tâche.");
}

#[tokio::test]
async fn test_store_code_cannot_create() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/api/tasks",
            TAMPON,
            json!({ "store": "Vogue Tampon", "title": "Vitrine" }),
        )
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_store_code_only_sees_its_store() {
    let fixture = TestFixture::new().await;
    fixture.create_task("Vogue Tampon", "A").await;
    fixture.create_task("Vogue Duparc", "B").await;
    let other = fixture.create_task("Vogue Duparc", "C").await;

    let tasks = fixture.list("", TAMPON).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["store"], "Vogue Tampon");

    let tasks = fixture.list("?store=Vogue%20Duparc", TAMPON).await;
    assert!(tasks.is_empty());

    let resp = fixture.get(&format!("/api/tasks/{}", other), TAMPON).await;
    assert_eq!(resp.status(), 403);

    let resp = fixture.get(&format!("/api/tasks/{}", other), DUPARC).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_list_filters() {
    let fixture = TestFixture::new().await;
    let done = fixture.create_task("Vogue Tampon", "Rayon jeans").await;
    fixture.create_task("Vogue Duparc", "Vitrine").await;

    let resp = fixture
        .patch_json(
            &format!("/api/tasks/{}", done),
            ADMIN,
            json!({ "status": "Fait", "notes": "Mettre les JEANS brut en avant" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let tasks = fixture.list("?status=Fait", ADMIN).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], done.as_str());

    let tasks = fixture.list("?q=brut", ADMIN).await;
    assert_eq!(tasks.len(), 1);

    let tasks = fixture.list("?store=&status=&validation=&q=", ADMIN).await;
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn test_bulk_create_needs_confirmation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/api/tasks/all-stores",
            ADMIN,
            json!({ "title": "Nouvelle vitrine", "storeManager": "Julie" }),
        )
        .await;
    assert_eq!(resp.status(), 428);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFIRMATION_REQUIRED");
    assert_eq!(
        body["error"]["message"],
        "Créer cette tâche pour les 7 magasins ?"
    );
    assert_eq!(body["error"]["details"]["storeCount"], 7);
    assert!(fixture.list("", ADMIN).await.is_empty());

    let resp = fixture
        .post_json(
            "/api/tasks/all-stores",
            ADMIN,
            json!({ "title": "Nouvelle vitrine", "storeManager": "Julie", "confirm": true }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 7);

    let tasks = fixture.list("", ADMIN).await;
    assert_eq!(tasks.len(), 7);
    assert!(tasks.iter().all(|t| t["storeManager"] == ""));
    assert!(tasks.iter().all(|t| t["title"] == "Nouvelle vitrine"));
}

#[tokio::test]
async fn test_store_patch_permissions() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_task("Vogue Tampon", "Vitrine").await;

    let resp = fixture
        .patch_json(
            &format!("/api/tasks/{}", id),
            TAMPON,
            json!({ "status": "En cours", "feedbackMagasin": "Commencé ce matin" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "En cours");
    assert_eq!(body["data"]["feedbackMagasin"], "Commencé ce matin");

    let resp = fixture
        .patch_json(
            &format!("/api/tasks/{}", id),
            TAMPON,
            json!({ "validation": "Validé" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .patch_json(
            &format!("/api/tasks/{}", id),
            DUPARC,
            json!({ "status": "Fait" }),
        )
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_delete_flow() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_task("Vogue Tampon", "Vitrine").await;
    let path = format!("/api/tasks/{}", id);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("{}?confirm=true", path)))
        .header("x-access-code", VM)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .delete(fixture.url(&path))
        .header("x-access-code", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 428);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Supprimer cette tâche ?");

    let resp = fixture
        .client
        .delete(fixture.url(&format!("{}?confirm=true", path)))
        .header("x-access-code", ADMIN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture.get(&path, ADMIN).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_compliance_photo_limit() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_task("Vogue Tampon", "Vitrine").await;
    let path = format!("/api/tasks/{}/photos/compliance", id);

    let form = (0..5).fold(Form::new(), |form, _| form.part("file", photo_part()));
    let resp = fixture
        .client
        .post(fixture.url(&path))
        .header("x-access-code", TAMPON)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["compliancePhotos"].as_array().unwrap().len(), 5);
    assert_eq!(fixture.images.upload_count(), 5);

    let resp = fixture
        .client
        .post(fixture.url(&path))
        .header("x-access-code", TAMPON)
        .multipart(Form::new().part("file", photo_part()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Limite de 5 photos atteinte");
    assert_eq!(fixture.images.upload_count(), 5);
}

#[tokio::test]
async fn test_compliance_list_cannot_grow_past_five_through_json() {
    let fixture = TestFixture::new().await;
    let urls: Vec<String> = (0..6)
        .map(|i| format!("https://i.ibb.co/x/{}.jpg", i))
        .collect();

    let resp = fixture
        .post_json(
            "/api/tasks",
            ADMIN,
            json!({ "store": "Vogue Tampon", "title": "Vitrine", "compliancePhotos": urls }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    assert!(fixture.list("", ADMIN).await.is_empty());

    let id = fixture.create_task("Vogue Tampon", "Vitrine").await;
    let resp = fixture
        .patch_json(
            &format!("/api/tasks/{}", id),
            TAMPON,
            json!({ "compliancePhotos": urls }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PHOTO_LIMIT");

    let tasks = fixture.list("", TAMPON).await;
    assert_eq!(tasks[0]["compliancePhotos"], json!([]));
}

#[tokio::test]
async fn test_detach_photo() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_task("Vogue Tampon", "Vitrine").await;

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/tasks/{}/photos/guide", id)))
        .header("x-access-code", VM)
        .multipart(Form::new().part("file", photo_part()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["guidePhotos"][0].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/tasks/{}/photos/guide", id)))
        .header("x-access-code", TAMPON)
        .json(&json!({ "url": url }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/tasks/{}/photos/guide", id)))
        .header("x-access-code", VM)
        .json(&json!({ "url": url }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["guidePhotos"], json!([]));
}

#[tokio::test]
async fn test_create_with_staged_photos() {
    let fixture = TestFixture::new().await;

    let task = json!({ "store": "Vogue Duparc", "title": "Vitrine" }).to_string();
    let form = Form::new()
        .text("task", task)
        .part("photo", photo_part())
        .part("photo", photo_part());

    let resp = fixture
        .client
        .post(fixture.url("/api/tasks/with-photos"))
        .header("x-access-code", ADMIN)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let created = body["data"].as_array().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["guidePhotos"].as_array().unwrap().len(), 2);

    // A refused request uploads nothing.
    let task = json!({ "title": "Vitrine", "allStores": true }).to_string();
    let form = Form::new().text("task", task).part("photo", photo_part());
    let resp = fixture
        .client
        .post(fixture.url("/api/tasks/with-photos"))
        .header("x-access-code", ADMIN)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 428);
    assert_eq!(fixture.images.upload_count(), 2);
}

#[tokio::test]
async fn test_export_then_import() {
    let fixture = TestFixture::new().await;
    fixture.create_task("Vogue Tampon", "Vitrine").await;
    fixture.create_task("Vogue Duparc", "Rayon jeans").await;

    let resp = fixture.get("/api/tasks/export", VM).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        crate::spreadsheet::XLSX_CONTENT_TYPE
    );
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("Suivi_Taches_Vogue_"));
    let bytes = resp.bytes().await.unwrap();

    let form = Form::new().part(
        "file",
        Part::bytes(bytes.to_vec()).file_name("export.xlsx"),
    );
    let resp = fixture
        .client
        .post(fixture.url("/api/tasks/import"))
        .header("x-access-code", VM)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(
        body["data"]["message"],
        "2 tâche(s) importée(s) avec succès !"
    );

    assert_eq!(fixture.list("", ADMIN).await.len(), 4);
}

#[tokio::test]
async fn test_store_export_is_scoped() {
    let fixture = TestFixture::new().await;
    fixture.create_task("Vogue Tampon", "Vitrine").await;
    fixture.create_task("Vogue Duparc", "Rayon jeans").await;

    let resp = fixture.get("/api/tasks/export", TAMPON).await;
    let bytes = resp.bytes().await.unwrap();
    let rows = crate::spreadsheet::read_rows(&bytes).unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_sync_status_and_remount() {
    let fixture = TestFixture::new().await;
    fixture.create_task("Vogue Tampon", "Vitrine").await;

    let resp = fixture.get("/api/sync/status", VM).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["loading"], false);
    assert_eq!(body["data"]["stale"], false);
    assert_eq!(body["data"]["taskCount"], 1);

    let resp = fixture
        .post_json("/api/sync/remount", VM, json!({}))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .post_json("/api/sync/remount", ADMIN, json!({}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["taskCount"], 1);
    assert_eq!(body["data"]["stale"], false);
}
