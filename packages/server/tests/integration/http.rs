use std::sync::atomic::Ordering;

use uuid::Uuid;

use crate::common::{PDF, PNG, TEST_MAX_UPLOAD, TestApp, routes};

mod upload {
    use super::*;

    #[tokio::test]
    async fn creates_document() {
        let app = TestApp::spawn().await;
        let owner = Uuid::now_v7().to_string();

        let res = app
            .upload("employee", &owner, "BI", "Bilhete Identidade.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["owner_type"], "employee");
        assert_eq!(res.body["owner_id"], owner.as_str());
        assert_eq!(res.body["type"], "BI");
        assert_eq!(res.body["file_name"], "Bilhete_Identidade.pdf");
        assert_eq!(res.body["extension"], "pdf");
        assert_eq!(res.body["is_active"], true);
        assert!(res.body["file_url"].as_str().unwrap().contains(&owner));
        assert!(res.body["uploaded_at"].as_str().is_some());
        assert_eq!(app.object_count(), 1);
    }

    #[tokio::test]
    async fn accepts_dependent_owner_in_any_case() {
        let app = TestApp::spawn().await;
        let owner = Uuid::now_v7().to_string();

        let res = app
            .upload("Dependent", &owner, "Foto", "foto.png", PNG.to_vec())
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["owner_type"], "dependent");
        assert_eq!(res.body["type"], "Foto");
    }

    #[tokio::test]
    async fn rejects_unknown_owner_type() {
        let app = TestApp::spawn().await;

        let res = app
            .upload("company", &Uuid::now_v7().to_string(), "BI", "bi.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.object_count(), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_owner_id() {
        let app = TestApp::spawn().await;

        let res = app
            .upload("employee", "not-a-uuid", "BI", "bi.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_unknown_document_type() {
        let app = TestApp::spawn().await;

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "Passport", "p.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let app = TestApp::spawn().await;

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "Outro", "notes.txt", PDF.to_vec())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.object_count(), 0);
    }

    #[tokio::test]
    async fn rejects_empty_file() {
        let app = TestApp::spawn().await;

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "BI", "bi.pdf", Vec::new())
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let form = reqwest::multipart::Form::new()
            .text("owner_type", "employee")
            .text("owner_id", Uuid::now_v7().to_string())
            .text("type", "BI");

        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::UPLOAD))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let mut content = PDF.to_vec();
        content.resize(TEST_MAX_UPLOAD + 1, b'0');

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "BI", "bi.pdf", content)
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.object_count(), 0);
        assert_eq!(app.repo.row_count(), 0);
    }

    #[tokio::test]
    async fn file_at_the_limit_is_accepted() {
        let app = TestApp::spawn().await;
        let mut content = PDF.to_vec();
        content.resize(TEST_MAX_UPLOAD, b'0');

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "BI", "bi.pdf", content)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn metadata_failure_returns_500_and_keeps_no_object() {
        let app = TestApp::spawn().await;
        app.repo.fail_create.store(true, Ordering::SeqCst);

        let res = app
            .upload("employee", &Uuid::now_v7().to_string(), "BI", "bi.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "METADATA_ERROR");
        assert_eq!(app.object_count(), 0);
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn get_returns_metadata() {
        let app = TestApp::spawn().await;
        let id = app.create_document("bi.pdf").await;

        let res = app.get(&routes::document(&id)).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["id"], id.as_str());
        assert_eq!(res.body["file_name"], "bi.pdf");
    }

    #[tokio::test]
    async fn get_unknown_id_is_404() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::document(&Uuid::now_v7().to_string())).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_id_is_400() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::document("42")).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn download_streams_content_as_attachment() {
        let app = TestApp::spawn().await;
        let id = app.create_document("contrato.pdf").await;

        let (status, content_type, disposition, bytes) =
            app.download(&routes::download(&id)).await;

        assert_eq!(status, 200);
        assert_eq!(content_type.as_deref(), Some("application/pdf"));
        let disposition = disposition.unwrap();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains("contrato.pdf"));
        assert_eq!(bytes, PDF);
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let app = TestApp::spawn().await;

        let res = app.get("/api-docs/openapi.json").await;

        assert_eq!(res.status, 200);
        assert!(res.body["paths"]["/api/v1/documents/upload"].is_object());
        assert!(res.body["paths"]["/api/v1/documents/{id}"]["delete"].is_object());
        assert!(res.body["paths"]["/api/v1/documents/{id}/file"]["put"].is_object());
    }
}

mod replace {
    use super::*;

    #[tokio::test]
    async fn replaces_file_content() {
        let app = TestApp::spawn().await;
        let id = app.create_document("foto.pdf").await;

        let res = app.replace_file(&id, "foto.png", PNG.to_vec()).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["id"], id.as_str());
        assert_eq!(res.body["extension"], "png");
        assert_eq!(res.body["file_name"], "foto.png");
        assert_eq!(app.object_count(), 1);

        let (status, content_type, _, bytes) = app.download(&routes::download(&id)).await;
        assert_eq!(status, 200);
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert_eq!(bytes, PNG);
    }

    #[tokio::test]
    async fn unknown_document_is_404() {
        let app = TestApp::spawn().await;

        let res = app
            .replace_file(&Uuid::now_v7().to_string(), "x.pdf", PDF.to_vec())
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(app.object_count(), 0);
    }

    #[tokio::test]
    async fn metadata_failure_keeps_previous_file() {
        let app = TestApp::spawn().await;
        let id = app.create_document("bi.pdf").await;
        app.repo.fail_update.store(true, Ordering::SeqCst);

        let res = app.replace_file(&id, "novo.png", PNG.to_vec()).await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "METADATA_ERROR");
        assert_eq!(app.object_count(), 1);

        let (status, _, _, bytes) = app.download(&routes::download(&id)).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, PDF);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn removes_document_and_file() {
        let app = TestApp::spawn().await;
        let id = app.create_document("bi.pdf").await;

        let res = app.delete(&routes::document(&id)).await;

        assert_eq!(res.status, 204);
        assert_eq!(app.object_count(), 0);
        assert_eq!(app.get(&routes::document(&id)).await.status, 404);
    }

    #[tokio::test]
    async fn second_delete_is_404() {
        let app = TestApp::spawn().await;
        let id = app.create_document("bi.pdf").await;

        assert_eq!(app.delete(&routes::document(&id)).await.status, 204);
        let res = app.delete(&routes::document(&id)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn metadata_failure_keeps_document() {
        let app = TestApp::spawn().await;
        let id = app.create_document("bi.pdf").await;
        app.repo.fail_delete.store(true, Ordering::SeqCst);

        let res = app.delete(&routes::document(&id)).await;

        assert_eq!(res.status, 500);
        assert_eq!(app.object_count(), 1);
        assert_eq!(app.get(&routes::document(&id)).await.status, 200);
    }
}
