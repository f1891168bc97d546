mod common;

use common::*;
use restlink::{AppError, ConstraintKind, Database, MemoryStore, StaticIdentity};
use serde_json::{json, Value};

const ALICE: &str = "7";

async fn seed_project(db: &MemoryStore, name: &str) -> i64 {
    let created = project_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &json!({ "name": name }))
        .await
        .unwrap();
    created["id"].as_i64().unwrap()
}

async fn seed_tag(db: &MemoryStore, label: &str) -> i64 {
    let created = tag_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &json!({ "label": label }))
        .await
        .unwrap();
    created["id"].as_i64().unwrap()
}

#[tokio::test]
async fn read_returns_serialized_resource() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    let got = projects_controller().read(db.begin().await.unwrap(), &id).await.unwrap();
    assert_eq!(got, json!({"id": id, "name": "Apollo", "description": null, "creator_id": 7}));
}

#[tokio::test]
async fn missing_selector_is_not_found_for_every_operation() {
    let db = store();
    let c = projects_controller();
    assert!(matches!(c.read(db.begin().await.unwrap(), &42).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        c.update(db.begin().await.unwrap(), &42, &json!({"name": "x"})).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(c.delete(db.begin().await.unwrap(), &42).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn update_of_missing_resource_does_not_parse_payload() {
    let db = store();
    let err = projects_controller()
        .update(db.begin().await.unwrap(), &42, &json!({"name": null}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn update_changes_only_schema_fields() {
    let db = store();
    let created = project_creator()
        .create(
            db.begin().await.unwrap(),
            &StaticIdentity(ALICE.into()),
            &json!({"name": "Apollo", "description": "moon"}),
        )
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let updated = projects_controller()
        .update(
            db.begin().await.unwrap(),
            &id,
            &json!({"name": "Artemis", "description": "ignored", "creator_id": 99}),
        )
        .await
        .unwrap();
    assert_eq!(updated["name"], "Artemis");
    assert_eq!(updated["description"], "moon");
    assert_eq!(updated["creator_id"], 7);

    let stored = db.rows(projects());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["name"], "Artemis");
    assert_eq!(stored[0]["description"], "moon");
}

#[tokio::test]
async fn rejected_update_leaves_row_untouched() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    let err = projects_controller()
        .update(db.begin().await.unwrap(), &id, &json!({"name": null}))
        .await
        .unwrap_err();
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "name"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(db.rows(projects())[0]["name"], "Apollo");
}

#[tokio::test]
async fn delete_removes_exactly_one_row() {
    let db = store();
    let keep = seed_project(&db, "Keep").await;
    let doomed = seed_project(&db, "Drop").await;

    projects_controller().delete(db.begin().await.unwrap(), &doomed).await.unwrap();

    let rows = db.rows(projects());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], keep);
    assert!(matches!(
        projects_controller().delete(db.begin().await.unwrap(), &doomed).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn deleting_a_parent_cascades_to_children() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    project_tasks()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &id.to_string(), &json!({"title": "a"}))
        .await
        .unwrap();
    projects_controller().delete(db.begin().await.unwrap(), &id).await.unwrap();
    assert!(db.rows(tasks()).is_empty());
}

#[tokio::test]
async fn create_without_identity_is_unauthorized_and_writes_nothing() {
    let db = store();
    let err = project_creator()
        .create(db.begin().await.unwrap(), &restlink::CallerId(None), &json!({"name": "Apollo"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    assert!(db.rows(projects()).is_empty());
}

#[tokio::test]
async fn identity_that_does_not_fit_creator_column_is_unauthorized() {
    let db = store();
    let err = project_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity("alice".into()), &json!({"name": "Apollo"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[tokio::test]
async fn create_stamps_creator_and_reports_validation_field() {
    let db = store();
    let created = project_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &json!({"name": "Apollo", "extra": 1}))
        .await
        .unwrap();
    assert_eq!(created["creator_id"], 7);
    assert!(created.get("extra").is_none());

    let err = project_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &json!({"name": ""}))
        .await
        .unwrap_err();
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "name"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(db.rows(projects()).len(), 1);
}

#[tokio::test]
async fn create_surfaces_unique_violation() {
    let db = store();
    seed_tag(&db, "urgent").await;
    let err = tag_creator()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &json!({"label": "urgent"}))
        .await
        .unwrap_err();
    assert!(err.is_constraint(ConstraintKind::Unique));
    assert_eq!(db.rows(tags()).len(), 1);
}

#[tokio::test]
async fn child_under_missing_parent_is_not_found() {
    let db = store();
    let err = project_tasks()
        .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), "999", &json!({"title": "orphan"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(db.rows(tasks()).is_empty());
}

#[tokio::test]
async fn child_carries_parent_and_creator() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    let task = project_tasks()
        .create(
            db.begin().await.unwrap(),
            &StaticIdentity("11".into()),
            &id.to_string(),
            &json!({"title": "launch"}),
        )
        .await
        .unwrap();
    assert_eq!(task["project_id"], id);
    assert_eq!(task["creator_id"], 11);
    assert_eq!(task["title"], "launch");
    assert_eq!(task["done"], false);
}

#[tokio::test]
async fn list_returns_children_under_collection_key() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    let other = seed_project(&db, "Gemini").await;
    let links = project_tasks();
    for (parent, title) in [(id, "first"), (other, "elsewhere"), (id, "second")] {
        links
            .create(db.begin().await.unwrap(), &StaticIdentity(ALICE.into()), &parent.to_string(), &json!({ "title": title }))
            .await
            .unwrap();
    }

    let listed = links.list(db.begin().await.unwrap(), &id.to_string()).await.unwrap();
    let titles: Vec<&str> = listed["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
}

#[tokio::test]
async fn list_of_empty_or_missing_parent() {
    let db = store();
    let id = seed_project(&db, "Apollo").await;
    let links = project_tasks();
    assert_eq!(
        links.list(db.begin().await.unwrap(), &id.to_string()).await.unwrap(),
        json!({"tasks": []})
    );
    assert!(matches!(links.list(db.begin().await.unwrap(), "999").await, Err(AppError::NotFound(_))));
    assert!(matches!(links.list(db.begin().await.unwrap(), "abc").await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn link_is_idempotent() {
    let db = store();
    let project = seed_project(&db, "Apollo").await.to_string();
    let tag = seed_tag(&db, "urgent").await.to_string();
    let links = project_tag_links();

    links.link(db.begin().await.unwrap(), &project, &tag).await.unwrap();
    links.link(db.begin().await.unwrap(), &project, &tag).await.unwrap();

    let rows = db.rows(project_tags());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["project_id"], json!(project.parse::<i64>().unwrap()));
}

#[tokio::test]
async fn link_to_missing_side_is_not_found() {
    let db = store();
    let project = seed_project(&db, "Apollo").await.to_string();
    let err = project_tag_links()
        .link(db.begin().await.unwrap(), &project, "404")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(db.rows(project_tags()).is_empty());
}

#[tokio::test]
async fn unlink_removes_pair_and_reports_missing_pair() {
    let db = store();
    let project = seed_project(&db, "Apollo").await.to_string();
    let tag = seed_tag(&db, "urgent").await.to_string();
    let links = project_tag_links();

    assert!(matches!(
        links.unlink(db.begin().await.unwrap(), &project, &tag).await,
        Err(AppError::NotFound(_))
    ));
    links.link(db.begin().await.unwrap(), &project, &tag).await.unwrap();
    links.unlink(db.begin().await.unwrap(), &project, &tag).await.unwrap();
    assert!(db.rows(project_tags()).is_empty());
}

#[tokio::test]
async fn parsed_scenario_fields() {
    let parser = restlink::RequestParser::new()
        .argument("name", restlink::convert::string, true)
        .argument("age", restlink::convert::integer, false);
    let parsed = parser.parse(&json!({"name": "Alice", "age": null})).unwrap();
    assert_eq!(Value::Object(parsed), json!({"name": "Alice", "age": null}));
}

#[tokio::test]
async fn overlapping_requests_keep_each_others_writes() {
    let db = store();
    let parent = seed_project(&db, "Apollo").await;

    let first = db.begin().await.unwrap();
    let second = db.begin().await.unwrap();
    let third = db.begin().await.unwrap();
    let fourth = db.begin().await.unwrap();

    let a = project_creator()
        .create(first, &StaticIdentity(ALICE.into()), &json!({"name": "A"}))
        .await
        .unwrap();
    let b = project_creator()
        .create(second, &StaticIdentity(ALICE.into()), &json!({"name": "B"}))
        .await
        .unwrap();
    assert_ne!(a["id"], b["id"]);

    project_tasks()
        .create(third, &StaticIdentity(ALICE.into()), &parent.to_string(), &json!({"title": "launch"}))
        .await
        .unwrap();
    projects_controller()
        .update(fourth, &parent, &json!({"name": "Artemis"}))
        .await
        .unwrap();

    let mut names: Vec<String> = db
        .rows(projects())
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["A", "Artemis", "B"]);
    let stored_tasks = db.rows(tasks());
    assert_eq!(stored_tasks.len(), 1);
    assert_eq!(stored_tasks[0]["project_id"], parent);
}
