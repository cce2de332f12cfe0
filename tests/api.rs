//! REST surface tests driven through the router with `oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use walrus_model::model::{Role, Setting};
use walrus_model::{app, AppState, Client};

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    project: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(p) = project {
        req = req.header("X-Project-ID", p);
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn offline_router() -> Router {
    app(AppState::new(common::offline_client()))
}

#[tokio::test]
async fn health_and_version_need_no_database() {
    let router = offline_router();
    let (status, body) = send(&router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&router, Method::GET, "/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "walrus-model");
}

#[tokio::test]
async fn unknown_resource_is_not_found() {
    let router = offline_router();
    let (status, body) = send(&router, Method::GET, "/v1/widgets", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn unsupported_operation_is_rejected() {
    let router = offline_router();
    let (status, body) =
        send(&router, Method::POST, "/v1/settings", None, Some(json!({"value": "x"}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "not_allowed");

    let (status, _) =
        send(&router, Method::PATCH, "/v1/module-versions/abc", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_project_header_is_bad_request() {
    let router = offline_router();
    let (status, body) = send(&router, Method::GET, "/v1/environments", Some("nope"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

async fn live_router() -> Option<(Router, common::TestDb)> {
    let db = common::client().await?;
    Some((app(AppState::new(Client::clone(&db))), db))
}

#[tokio::test]
async fn project_crud_round_trip() {
    let Some((router, _)) = live_router().await else {
        return;
    };

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/projects",
        None,
        Some(json!({"name": "alpha", "labels": {"team": "infra"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["labels"]["team"], "infra");
    assert!(body["data"]["createTime"].is_string());

    let (status, body) =
        send(&router, Method::GET, &format!("/v1/projects/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "alpha");

    let (status, body) = send(
        &router,
        Method::PATCH,
        &format!("/v1/projects/{id}"),
        None,
        Some(json!({"description": "renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "renamed");
    assert_eq!(body["data"]["name"], "alpha");

    let (status, _) =
        send(&router, Method::DELETE, &format!("/v1/projects/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, Method::GET, &format!("/v1/projects/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_errors_map_to_status_codes() {
    let Some((router, _)) = live_router().await else {
        return;
    };

    let (status, _) =
        send(&router, Method::POST, "/v1/projects", None, Some(json!({"name": "Bad Name"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) =
        send(&router, Method::POST, "/v1/projects", None, Some(json!({"name": "dup"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) =
        send(&router, Method::POST, "/v1/projects", None, Some(json!({"name": "dup"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, _) =
        send(&router, Method::GET, &format!("/v1/projects/{}", "not-a-uuid"), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn environments_are_scoped_to_the_project_header() {
    let Some((router, _)) = live_router().await else {
        return;
    };
    let mut projects = Vec::new();
    for name in ["one", "two"] {
        let (_, body) =
            send(&router, Method::POST, "/v1/projects", None, Some(json!({"name": name}))).await;
        projects.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, _) =
        send(&router, Method::POST, "/v1/environments", None, Some(json!({"name": "dev"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/environments",
        Some(&projects[0]),
        Some(json!({"name": "dev", "type": "staging"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["projectID"], projects[0].as_str());
    assert_eq!(body["data"]["type"], "staging");
    let env_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(&router, Method::GET, "/v1/environments", Some(&projects[0]), None).await;
    assert_eq!(body["meta"]["count"], 1);
    let (_, body) = send(&router, Method::GET, "/v1/environments", Some(&projects[1]), None).await;
    assert_eq!(body["meta"]["count"], 0);

    let uri = format!("/v1/environments/{env_id}");
    let (status, _) = send(&router, Method::GET, &uri, Some(&projects[1]), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, Method::DELETE, &uri, Some(&projects[1]), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_paging_sorting_and_filters() {
    let Some((router, _)) = live_router().await else {
        return;
    };
    let items: Vec<Value> = ["a", "b", "c"].iter().map(|n| json!({"name": n})).collect();
    let (status, body) =
        send(&router, Method::POST, "/v1/projects/bulk", None, Some(Value::Array(items))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) =
        send(&router, Method::GET, "/v1/projects?sort=-name&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["c", "b"]);
    assert_eq!(body["meta"]["count"], 3);

    let (_, body) = send(&router, Method::GET, "/v1/projects?name=b", None, None).await;
    assert_eq!(body["meta"]["count"], 1);

    let (status, _) = send(&router, Method::GET, "/v1/projects?colour=red", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_delete_is_all_or_nothing() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let items: Vec<Value> = ["x", "y"].iter().map(|n| json!({"name": n})).collect();
    let (_, body) =
        send(&router, Method::POST, "/v1/projects/bulk", None, Some(Value::Array(items))).await;
    let ids: Vec<Value> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| json!({"id": p["id"]}))
        .collect();

    let mut with_missing = ids.clone();
    with_missing.push(json!({"id": Uuid::new_v4()}));
    let (status, _) = send(
        &router,
        Method::DELETE,
        "/v1/projects/bulk",
        None,
        Some(json!({"items": with_missing})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(client.projects().query().count().await.unwrap(), 2);

    let (status, body) =
        send(&router, Method::DELETE, "/v1/projects/bulk", None, Some(json!({"items": ids}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 2);
    assert_eq!(client.projects().query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn builtin_roles_are_protected() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let admin = Role {
        id: "system/admin".into(),
        kind: "system".into(),
        builtin: true,
        ..Default::default()
    };
    client.roles().create(admin).save().await.unwrap();

    let uri = "/v1/roles/system%2Fadmin";
    let (status, _) =
        send(&router, Method::PATCH, uri, None, Some(json!({"description": "x"}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&router, Method::DELETE, uri, None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(client.roles().query().count().await.unwrap(), 1);
}

#[tokio::test]
async fn settings_hide_and_mask_values() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let settings = vec![
        Setting {
            name: "ServeUrl".into(),
            value: "https://walrus.local".into(),
            editable: true,
            ..Default::default()
        },
        Setting {
            name: "PrivateKey".into(),
            value: "secret".into(),
            private: true,
            ..Default::default()
        },
        Setting {
            name: "BootPwdGainSource".into(),
            value: "Specified".into(),
            hidden: true,
            ..Default::default()
        },
    ];
    let saved = client.settings().create_bulk(settings).save().await.unwrap();

    let (status, body) = send(&router, Method::GET, "/v1/settings?sort=name", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["name"], "PrivateKey");
    assert_eq!(data[0]["value"], "******");
    assert_eq!(data[1]["value"], "https://walrus.local");

    let serve_url = &saved[0];
    let (status, body) = send(
        &router,
        Method::PATCH,
        &format!("/v1/settings/{}", serve_url.id),
        None,
        Some(json!({"value": "https://walrus.example"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], "https://walrus.example");

    let private = &saved[1];
    let (status, _) = send(
        &router,
        Method::PATCH,
        &format!("/v1/settings/{}", private.id),
        None,
        Some(json!({"value": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn token_value_is_returned_on_create_only() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let subject = walrus_model::model::Subject {
        kind: "user".into(),
        domain: "builtin".into(),
        name: "admin".into(),
        ..Default::default()
    };
    let subject = client.subjects().create(subject).save().await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/tokens",
        None,
        Some(json!({"subjectID": subject.id, "name": "ci"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("value").is_none());
    let access_token = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert!(!access_token.is_empty());

    let stored = client.tokens().query().only().await.unwrap();
    assert_eq!(stored.value.as_str(), access_token);

    let uri = format!("/v1/tokens/{}", stored.id);
    let (status, body) = send(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("accessToken").is_none());
    assert!(!body.to_string().contains(&access_token));

    let (status, _) =
        send(&router, Method::PATCH, &uri, None, Some(json!({"name": "renamed"}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

async fn create_project(router: &Router, name: &str) -> String {
    let (status, body) =
        send(router, Method::POST, "/v1/projects", None, Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn writes_outside_the_project_header_are_not_found() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let home = create_project(&router, "home").await;
    let away = create_project(&router, "away").await;
    let (_, body) = send(
        &router,
        Method::POST,
        "/v1/environments",
        Some(&home),
        Some(json!({"name": "dev"})),
    ).await;
    let uri = format!("/v1/environments/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(
        &router,
        Method::PATCH,
        &uri,
        Some(&away),
        Some(json!({"description": "moved"})),
    ).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let stored = client.environments().query().only().await.unwrap();
    assert!(stored.description.is_none());

    let (status, _) =
        send(&router, Method::PATCH, &uri, Some(&home), Some(json!({"description": "kept"}))).await;
    assert_eq!(status, StatusCode::OK);

    let ids = json!({"items": [{"id": stored.id}]});
    let (status, _) =
        send(&router, Method::DELETE, "/v1/environments/bulk", Some(&away), Some(ids)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(client.environments().query().count().await.unwrap(), 1);
}

#[tokio::test]
async fn environment_connectors_are_written_and_read_back() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    let project = create_project(&router, "edges").await;
    let other = create_project(&router, "elsewhere").await;
    let mut connectors = Vec::new();
    for (name, owner) in [("k8s", &project), ("aws", &project), ("foreign", &other)] {
        let (status, body) = send(
            &router,
            Method::POST,
            "/v1/connectors",
            Some(owner),
            Some(json!({
                "name": name,
                "type": "Kubernetes",
                "category": "Kubernetes",
                "configVersion": "v1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        connectors.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/environments",
        Some(&project),
        Some(json!({"name": "dev", "connectors": [{"connector": {"id": connectors[0]}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["connectors"][0]["connector"]["id"], connectors[0].as_str());
    let uri = format!("/v1/environments/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        &router,
        Method::PATCH,
        &uri,
        Some(&project),
        Some(json!({"connectors": [{"connector": {"id": connectors[1]}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let listed = body["data"]["connectors"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["connector"]["id"], connectors[1].as_str());

    let (_, body) = send(&router, Method::GET, &uri, Some(&project), None).await;
    assert_eq!(body["data"]["connectors"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &router,
        Method::PATCH,
        &uri,
        Some(&project),
        Some(json!({"connectors": [{"connector": {"id": connectors[2]}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let env = client.environments().query().only().await.unwrap();
    let rels = client
        .environments()
        .query_edge_of(&env, walrus_model::model::environment::connectors())
        .all()
        .await
        .unwrap();
    assert_eq!(rels.len(), 1);
}

#[tokio::test]
async fn subject_roles_are_written_and_read_back() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    for id in ["system/user", "system/admin"] {
        let role = Role {
            id: id.into(),
            kind: "system".into(),
            ..Default::default()
        };
        client.roles().create(role).save().await.unwrap();
    }

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/subjects",
        None,
        Some(json!({
            "type": "user",
            "domain": "builtin",
            "name": "dev",
            "roles": [{"role": {"id": "system/user"}}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["roles"][0]["role"]["id"], "system/user");
    let uri = format!("/v1/subjects/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        &router,
        Method::PATCH,
        &uri,
        None,
        Some(json!({"roles": [{"role": {"id": "system/admin"}}, {"role": {"id": "system/user"}}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let roles: Vec<&str> = body["data"]["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["role"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system/admin", "system/user"]);

    let (status, body) =
        send(&router, Method::PATCH, &uri, None, Some(json!({"description": "x"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["roles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn application_modules_are_written_and_read_back() {
    let Some((router, client)) = live_router().await else {
        return;
    };
    for id in ["webservice", "mysql"] {
        let module = walrus_model::model::Module {
            id: id.into(),
            source: format!("github.com/walrus/{id}"),
            ..Default::default()
        };
        client.modules().create(module).save().await.unwrap();
    }
    let project = create_project(&router, "apps").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/applications",
        Some(&project),
        Some(json!({
            "name": "shop",
            "modules": [{
                "moduleID": "webservice",
                "version": "0.1.0",
                "name": "web",
                "attributes": {"port": 80}
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["modules"][0]["moduleID"], "webservice");
    let uri = format!("/v1/applications/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        &router,
        Method::PATCH,
        &uri,
        Some(&project),
        Some(json!({"modules": [
            {"moduleID": "webservice", "version": "0.2.0", "name": "web"},
            {"moduleID": "mysql", "version": "8.0", "name": "db"}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let modules = body["data"]["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0]["name"], "db");
    assert_eq!(modules[1]["version"], "0.2.0");

    let (_, body) = send(&router, Method::GET, &uri, Some(&project), None).await;
    assert_eq!(body["data"]["modules"].as_array().unwrap().len(), 2);
}
