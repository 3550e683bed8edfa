mod common;

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{TestEnv, OTHER_ID, OWNER_ID};

fn upload_form(bot_id: Option<&str>, file_name: Option<&str>) -> Result<Form> {
    let mut form = Form::new();
    if let Some(bot_id) = bot_id {
        form = form.text("botId", bot_id.to_string());
    }
    if let Some(file_name) = file_name {
        let part = Part::bytes(b"# Guide\nHello".to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/markdown")?;
        form = form.part("file", part);
    }
    Ok(form)
}

async fn upload(env: &TestEnv, bot_id: Option<&str>, file_name: Option<&str>) -> Result<reqwest::Response> {
    let res = env
        .owner(Method::POST, "/api/documents/upload")
        .multipart(upload_form(bot_id, file_name)?)
        .send()
        .await?;
    Ok(res)
}

#[tokio::test]
async fn upload_stores_file_and_starts_parsing() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");

    let res = upload(&env, Some("bot-a"), Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let body = res.json::<Value>().await?;
    assert_eq!(body["file_name"], "guide.md");
    let document_id = body["document_id"].as_str().unwrap().to_string();

    let document = env.row("documents", &document_id).expect("document row stored");
    assert_eq!(document["status"], "pending");
    assert_eq!(document["file_type"], "md");
    assert_eq!(document["file_size"], 13);
    let file_path = document["file_path"].as_str().unwrap().to_string();
    assert!(file_path.starts_with("user-1/bot-a/"), "{}", file_path);
    assert!(file_path.ends_with("_guide.md"), "{}", file_path);

    let blobs = env.blobs();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].0, format!("documents/{}", file_path));
    assert_eq!(blobs[0].1, "text/markdown");
    assert_eq!(blobs[0].2, 13);

    let calls = env.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "/parser/parse");
    assert_eq!(
        calls[0].1,
        json!({
            "document_id": document_id,
            "file_path": file_path,
            "file_type": "md",
            "bot_id": "bot-a"
        })
    );
    Ok(())
}

#[tokio::test]
async fn upload_validates_form_and_ownership() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");
    env.seed_bot("bot-b", OTHER_ID, "Theirs");

    let res = upload(&env, Some("bot-a"), None).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "No file provided");

    let res = upload(&env, None, Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Bot ID is required");

    let res = upload(&env, Some("bot-b"), Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], "Bot not found or access denied");

    let res = upload(&env, Some("bot-a"), Some("setup.exe")).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await?["error"],
        "Unsupported file type. Supported types: pdf, txt, docx, md, html"
    );

    let res = env
        .owner(Method::POST, "/api/documents/upload")
        .json(&json!({ "botId": "bot-a" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(env.blobs().is_empty());
    assert!(env.rows("documents").is_empty());
    assert!(env.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn upload_requires_a_token() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");

    let res = env
        .post("/api/documents/upload")
        .multipart(upload_form(Some("bot-a"), Some("guide.md"))?)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(env.blobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_parse_marks_document_failed() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");
    env.reject_jobs();

    let res = upload(&env, Some("bot-a"), Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Failed to start parser service");
    let document = env.row("documents", body["document_id"].as_str().unwrap()).unwrap();
    assert_eq!(document["status"], "failed");
    assert_eq!(document["error"], "Failed to start parser service");
    Ok(())
}

#[tokio::test]
async fn unreachable_parser_is_service_unavailable() -> Result<()> {
    let env = TestEnv::start_with(|config| {
        config.services.parser_service_url = "http://127.0.0.1:1".to_string();
    })
    .await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");

    let res = upload(&env, Some("bot-a"), Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Parser service unavailable");
    let document = env.row("documents", body["document_id"].as_str().unwrap()).unwrap();
    assert_eq!(document["status"], "failed");
    Ok(())
}

#[tokio::test]
async fn documents_are_listed_newest_first_and_scoped() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");
    env.seed_bot("bot-b", OTHER_ID, "Theirs");
    for (id, bot_id, user_id, created_at) in [
        ("d1", "bot-a", OWNER_ID, "2024-01-01T00:00:00Z"),
        ("d2", "bot-a", OWNER_ID, "2024-03-01T00:00:00Z"),
        ("d3", "bot-b", OTHER_ID, "2024-02-01T00:00:00Z"),
    ] {
        env.seed(
            "documents",
            json!({ "id": id, "bot_id": bot_id, "user_id": user_id, "status": "processed", "created_at": created_at }),
        );
    }

    let res = env.owner(Method::GET, "/api/documents").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Bot ID is required");

    let res = env.owner(Method::GET, "/api/documents?botId=bot-a").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let ids: Vec<&str> = body["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["d2", "d1"]);

    let res = env.owner(Method::GET, "/api/documents?botId=bot-b").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = env.owner(Method::GET, "/api/documents/d1").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["document"]["bot_id"], "bot-a");

    let res = env.owner(Method::GET, "/api/documents/d3").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], "Document not found");
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_file_and_embeddings() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed_bot("bot-a", OWNER_ID, "Mine");

    let res = upload(&env, Some("bot-a"), Some("guide.md")).await?;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let document_id = res.json::<Value>().await?["document_id"].as_str().unwrap().to_string();
    assert_eq!(env.blobs().len(), 1);

    let res = env
        .owner(Method::DELETE, &format!("/api/documents/{}", document_id))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["message"], "Document deleted successfully");

    assert!(env.row("documents", &document_id).is_none());
    assert!(env.blobs().is_empty());
    let calls = env.calls();
    let (path, body) = calls.last().unwrap();
    assert_eq!(path, &format!("/embedder/documents/{}/delete", document_id));
    assert_eq!(body, &json!({ "bot_id": "bot-a" }));
    Ok(())
}

#[tokio::test]
async fn foreign_document_cannot_be_deleted() -> Result<()> {
    let env = TestEnv::start().await?;
    env.seed(
        "documents",
        json!({ "id": "d9", "bot_id": "bot-b", "user_id": OTHER_ID, "file_path": "user-2/bot-b/1_x.md" }),
    );

    let res = env.owner(Method::DELETE, "/api/documents/d9").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(env.row("documents", "d9").is_some());
    Ok(())
}
