//! Persistence tests against a live PostgreSQL. Each test migrates its own
//! schema; all of them are skipped when `TEST_DATABASE_URL` is unset.

mod common;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use walrus_model::model::{
    allocation_cost, application_module_relationship as amr, environment,
    environment_connector_relationship as ecr, project, subject_role_relationship as srr,
    AllocationCost, Application, ApplicationModuleRelationship, Connector, Environment, Module,
    Project, Role, Subject,
};
use walrus_model::tx::{Committer, Tx};
use walrus_model::{dao, mask_not_found, Client, DaoError, Predicate};

fn project(name: &str) -> Project {
    Project {
        name: name.into(),
        ..Default::default()
    }
}

fn connector(project_id: Option<Uuid>, name: &str) -> Connector {
    Connector {
        project_id,
        name: name.into(),
        kind: "Kubernetes".into(),
        category: "Kubernetes".into(),
        config_version: "v1".into(),
        ..Default::default()
    }
}

fn role(id: &str) -> Role {
    Role {
        id: id.into(),
        kind: "system".into(),
        ..Default::default()
    }
}

fn subject(name: &str) -> Subject {
    Subject {
        kind: "user".into(),
        domain: "builtin".into(),
        name: name.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_query_update_delete() {
    let Some(client) = common::client().await else {
        return;
    };
    let projects = client.projects();

    let created = projects.create(project("alpha")).save().await.unwrap();
    assert!(!created.id.is_nil());
    assert!(created.create_time.is_some());

    let found = projects
        .query()
        .filter(project::NAME.eq("alpha"))
        .only()
        .await
        .unwrap();
    assert_eq!(found.id, created.id);

    let updated = projects
        .update_one_id(created.id)
        .set(project::DESCRIPTION, "first project")
        .save()
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("first project"));
    assert_eq!(updated.name, "alpha");

    projects.delete_one_id(created.id).exec().await.unwrap();
    let err = projects.get(&created.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(mask_not_found(projects.get(&created.id).await).unwrap().is_none());
}

#[tokio::test]
async fn set_obj_writes_only_changed_columns() {
    let Some(client) = common::client().await else {
        return;
    };
    let stored = client.projects().create(project("beta")).save().await.unwrap();

    let mut next = stored.clone();
    next.description = Some("changed".into());
    next.labels.insert("team".into(), "infra".into());
    let saved = client
        .projects()
        .update_one_id(stored.id)
        .set_obj(next)
        .save()
        .await
        .unwrap();
    assert_eq!(saved.description.as_deref(), Some("changed"));
    assert_eq!(saved.labels.get("team").map(String::as_str), Some("infra"));
    assert_eq!(saved.create_time, stored.create_time);
}

#[tokio::test]
async fn updates_without_changes_still_touch_rows() {
    let Some(client) = common::client().await else {
        return;
    };
    let stored = client.projects().create(project("iota")).save().await.unwrap();
    client.projects().create(project("kappa")).save().await.unwrap();

    let touched = client.projects().update_one_id(stored.id).save().await.unwrap();
    assert!(touched.update_time > stored.update_time);
    assert_eq!(touched.description, stored.description);

    let unchanged = client
        .projects()
        .update_one_id(stored.id)
        .set_obj(stored.clone())
        .save()
        .await
        .unwrap();
    assert!(unchanged.update_time > touched.update_time);

    let n = client.projects().update().save().await.unwrap();
    assert_eq!(n, 2);
    let n = client.projects().update().filter(project::NAME.eq("missing")).save().await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn save_e_falls_back_to_the_input_object() {
    let Some(client) = common::client().await else {
        return;
    };
    let missing = project("lambda");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let returned = client
        .projects()
        .update_one(missing.clone())
        .save_e(move |_, p| {
            sink.lock().unwrap().push(p.name.clone());
            Box::pin(async { Ok(()) })
        })
        .await
        .unwrap();
    assert_eq!(returned.id, missing.id);
    assert_eq!(*seen.lock().unwrap(), vec!["lambda".to_string()]);

    let err = client
        .projects()
        .update_one_id(missing.id)
        .save_e(|_, _| Box::pin(async { Ok(()) }))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn invalid_rows_fail_validation() {
    let Some(client) = common::client().await else {
        return;
    };
    let err = client.projects().create(project("Not A Label")).save().await.unwrap_err();
    assert!(err.is_validation(), "{err}");

    let p = client.projects().create(project("gamma")).save().await.unwrap();
    let env = Environment {
        project_id: p.id,
        name: "dev".into(),
        kind: "qa".into(),
        ..Default::default()
    };
    let err = client.environments().create(env).save().await.unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[tokio::test]
async fn unique_and_foreign_keys_map_to_constraint_errors() {
    let Some(client) = common::client().await else {
        return;
    };
    client.projects().create(project("delta")).save().await.unwrap();
    let err = client.projects().create(project("delta")).save().await.unwrap_err();
    assert!(err.is_constraint(), "{err}");

    let orphan = Environment {
        project_id: Uuid::new_v4(),
        name: "dev".into(),
        ..Default::default()
    };
    let err = client.environments().create(orphan).save().await.unwrap_err();
    assert!(err.is_constraint(), "{err}");
}

#[tokio::test]
async fn global_and_project_connectors_have_separate_name_scopes() {
    let Some(client) = common::client().await else {
        return;
    };
    let p = client.projects().create(project("epsilon")).save().await.unwrap();

    client.connectors().create(connector(None, "k8s")).save().await.unwrap();
    client.connectors().create(connector(Some(p.id), "k8s")).save().await.unwrap();
    let err = client.connectors().create(connector(None, "k8s")).save().await.unwrap_err();
    assert!(err.is_constraint(), "{err}");
}

#[tokio::test]
async fn eager_loading_and_edge_queries() {
    let Some(client) = common::client().await else {
        return;
    };
    let p = client.projects().create(project("zeta")).save().await.unwrap();
    for name in ["dev", "prod"] {
        let env = Environment {
            project_id: p.id,
            name: name.into(),
            ..Default::default()
        };
        client.environments().create(env).save().await.unwrap();
    }

    let envs = client
        .environments()
        .query()
        .with(environment::project(), |q| q)
        .order(environment::NAME.asc())
        .all()
        .await
        .unwrap();
    assert_eq!(envs.len(), 2);
    assert_eq!(envs[0].kind, "development");
    assert_eq!(envs[0].project().unwrap().name, "zeta");

    let loaded = client
        .projects()
        .query()
        .filter(project::ID.eq(p.id))
        .with(project::environments(), |q| q.filter(environment::NAME.eq("prod")))
        .only()
        .await
        .unwrap();
    assert_eq!(loaded.environments().unwrap().len(), 1);
    assert!(loaded.applications().is_err());

    let via_edge = client
        .projects()
        .query_edge_of(&p, project::environments())
        .count()
        .await
        .unwrap();
    assert_eq!(via_edge, 2);

    let with_envs = client
        .projects()
        .query()
        .filter(Predicate::has(&project::environments()))
        .count()
        .await
        .unwrap();
    assert_eq!(with_envs, 1);
}

#[tokio::test]
async fn edge_queries_honour_source_paging() {
    let Some(client) = common::client().await else {
        return;
    };
    for name in ["eta", "theta"] {
        let p = client.projects().create(project(name)).save().await.unwrap();
        let env = Environment {
            project_id: p.id,
            name: "dev".into(),
            ..Default::default()
        };
        client.environments().create(env).save().await.unwrap();
    }

    let first = client
        .projects()
        .query()
        .order(project::NAME.asc())
        .limit(1)
        .query_edge(project::environments())
        .with(environment::project(), |q| q)
        .all()
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].project().unwrap().name, "eta");

    let skipped = client
        .projects()
        .query()
        .order(project::NAME.asc())
        .offset(1)
        .query_edge(project::environments())
        .with(environment::project(), |q| q)
        .only()
        .await
        .unwrap();
    assert_eq!(skipped.project().unwrap().name, "theta");
}

#[tokio::test]
async fn deleting_a_project_cascades() {
    let Some(client) = common::client().await else {
        return;
    };
    let p = client.projects().create(project("eta")).save().await.unwrap();
    let env = Environment {
        project_id: p.id,
        name: "dev".into(),
        ..Default::default()
    };
    client.environments().create(env).save().await.unwrap();

    client.projects().delete_one_id(p.id).exec().await.unwrap();
    assert_eq!(client.environments().query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn cost_upsert_replaces_values_on_conflict() {
    let Some(client) = common::client().await else {
        return;
    };
    let c = client.connectors().create(connector(None, "costs")).save().await.unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let cost = |total: f64| AllocationCost {
        start_time: start,
        end_time: start + chrono::Duration::hours(1),
        minutes: 60.0,
        connector_id: c.id,
        name: "default/web".into(),
        fingerprint: "web".into(),
        total_cost: total,
        ..Default::default()
    };

    for total in [1.5, 2.5] {
        client
            .allocation_costs()
            .create_bulk(vec![cost(total)])
            .on_conflict_columns(allocation_cost::CONFLICT_COLUMNS)
            .update_new_values()
            .exec()
            .await
            .unwrap();
    }
    let rows = client.allocation_costs().query().all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].id > 0);
    assert_eq!(rows[0].total_cost, 2.5);
}

#[tokio::test]
async fn with_tx_rolls_back_on_error() {
    let Some(client) = common::client().await else {
        return;
    };
    let res: Result<(), DaoError> = client
        .with_tx(|tx| {
            Box::pin(async move {
                tx.client().projects().create(project("theta")).save().await?;
                Err(DaoError::validation("project", "abort"))
            })
        })
        .await;
    assert!(res.unwrap_err().is_validation());
    assert_eq!(client.projects().query().count().await.unwrap(), 0);

    let id = client
        .with_tx(|tx| {
            Box::pin(async move {
                Ok(tx.client().projects().create(project("iota")).save().await?.id)
            })
        })
        .await
        .unwrap();
    assert!(client.projects().get(&id).await.is_ok());
}

#[tokio::test]
async fn nested_transactions_are_rejected() {
    let Some(client) = common::client().await else {
        return;
    };
    let tx = client.tx().await.unwrap();
    assert!(tx.client().is_tx());
    assert!(matches!(tx.client().tx().await, Err(DaoError::NestedTx)));
    tx.rollback().await.unwrap();
    assert!(tx.is_finished().await);
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    next: Arc<dyn Committer>,
}

#[async_trait]
impl Committer for Recorder {
    async fn commit(&self, tx: &Tx) -> Result<(), DaoError> {
        self.log.lock().unwrap().push(self.name);
        self.next.commit(tx).await
    }
}

#[tokio::test]
async fn commit_hooks_run_first_registered_first() {
    let Some(client) = common::client().await else {
        return;
    };
    let log = Arc::new(Mutex::new(Vec::new()));
    let tx = client.tx().await.unwrap();
    for name in ["first", "second"] {
        let log = log.clone();
        tx.on_commit(move |next| {
            Arc::new(Recorder {
                name,
                log: log.clone(),
                next,
            }) as Arc<dyn Committer>
        });
    }
    tx.client().projects().create(project("kappa")).save().await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(client.projects().query().count().await.unwrap(), 1);
}

async fn seed_subject(client: &Client) -> (Subject, Vec<String>) {
    let roles: Vec<Role> = ["system/admin", "system/user", "system/viewer"].map(role).into();
    client.roles().create_bulk(roles).exec().await.unwrap();
    let s = client.subjects().create(subject("alice")).save().await.unwrap();
    (s, vec!["system/admin".into(), "system/user".into(), "system/viewer".into()])
}

#[tokio::test]
async fn sync_subject_roles_adds_and_removes() {
    let Some(client) = common::client().await else {
        return;
    };
    let (s, roles) = seed_subject(&client).await;

    dao::sync_subject_roles(&client, s.id, &roles[..2]).await.unwrap();
    dao::sync_subject_roles(&client, s.id, &roles[1..]).await.unwrap();

    let mut held: Vec<String> = client
        .subject_role_relationships()
        .query()
        .filter(srr::SUBJECT_ID.eq(s.id))
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.role_id)
        .collect();
    held.sort();
    assert_eq!(held, vec!["system/user".to_string(), "system/viewer".to_string()]);

    dao::sync_subject_roles(&client, s.id, &[]).await.unwrap();
    let left = client
        .subject_role_relationships()
        .query()
        .filter(srr::SUBJECT_ID.eq(s.id))
        .count()
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn sync_environment_connectors_inside_a_transaction() {
    let Some(client) = common::client().await else {
        return;
    };
    let p = client.projects().create(project("lambda")).save().await.unwrap();
    let env = Environment {
        project_id: p.id,
        name: "dev".into(),
        ..Default::default()
    };
    let env = client.environments().create(env).save().await.unwrap();
    let a = client.connectors().create(connector(Some(p.id), "a")).save().await.unwrap();
    let b = client.connectors().create(connector(Some(p.id), "b")).save().await.unwrap();

    dao::sync_environment_connectors(&client, env.id, &[a.id, b.id]).await.unwrap();
    let (env_id, b_id) = (env.id, b.id);
    client
        .with_tx(move |tx| {
            Box::pin(async move {
                dao::sync_environment_connectors(tx.client(), env_id, &[b_id]).await
            })
        })
        .await
        .unwrap();

    let bound = client
        .environment_connector_relationships()
        .query()
        .filter(ecr::ENVIRONMENT_ID.eq(env.id))
        .all()
        .await
        .unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].connector_id, b.id);
}

#[tokio::test]
async fn sync_application_modules_updates_versions() {
    let Some(client) = common::client().await else {
        return;
    };
    let p = client.projects().create(project("mu")).save().await.unwrap();
    let app = Application {
        project_id: p.id,
        name: "shop".into(),
        ..Default::default()
    };
    let app = client.applications().create(app).save().await.unwrap();
    for id in ["mysql", "redis"] {
        let m = Module {
            id: id.into(),
            source: format!("github.com/walrus/{id}"),
            ..Default::default()
        };
        client.modules().create(m).save().await.unwrap();
    }
    let rel = |module_id: &str, name: &str, version: &str| ApplicationModuleRelationship {
        module_id: module_id.into(),
        name: name.into(),
        version: version.into(),
        ..Default::default()
    };

    dao::sync_application_modules(
        &client,
        app.id,
        &[rel("mysql", "db", "1.0.0"), rel("redis", "cache", "6.0.0")],
    )
    .await
    .unwrap();
    dao::sync_application_modules(&client, app.id, &[rel("mysql", "db", "1.1.0")])
        .await
        .unwrap();

    let rows = client
        .application_module_relationships()
        .query()
        .filter(amr::APPLICATION_ID.eq(app.id))
        .all()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "db");
    assert_eq!(rows[0].version, "1.1.0");
}
