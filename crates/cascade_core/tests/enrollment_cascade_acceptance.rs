use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::Uri,
    routing::get,
    Json, Router,
};
use cascade_core::{
    CascadeController, CascadeDefinition, Field, FieldState, HttpOptionsFetcher, PageContext,
};
use serde_json::{json, Value};
use shared::domain::FieldKey;
use tokio::{net::TcpListener, sync::Mutex};
use url::Url;

#[derive(Clone, Default)]
struct Portal {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Portal {
    async fn record(&self, uri: &Uri) {
        let entry = match uri.query() {
            Some(query) => format!("{}?{query}", uri.path()),
            None => uri.path().to_string(),
        };
        self.requests.lock().await.push(entry);
    }
}

type Params = Query<HashMap<String, String>>;

async fn students(State(portal): State<Portal>, uri: Uri, Query(q): Params) -> Json<Value> {
    portal.record(&uri).await;
    let results = match q.get("parent_id").map(String::as_str) {
        Some("3") => json!([{ "id": 8, "text": "Mia" }, { "id": 9, "text": "Leo" }]),
        _ => json!([]),
    };
    Json(json!({ "results": results }))
}

async fn semesters(State(portal): State<Portal>, uri: Uri, Query(q): Params) -> Json<Value> {
    portal.record(&uri).await;
    let results = match q.get("course_id").map(String::as_str) {
        Some("5") => json!([{ "id": 1, "text": "Spring" }, { "id": 2, "text": "Fall" }]),
        Some("6") => json!([{ "id": 4, "text": "Summer" }]),
        _ => json!([]),
    };
    Json(json!({ "results": results }))
}

async fn slots(State(portal): State<Portal>, uri: Uri, Query(q): Params) -> Json<Value> {
    portal.record(&uri).await;
    let course = q.get("course_id").map(String::as_str);
    let semester = q.get("semester_id").map(String::as_str);
    let results = match (course, semester) {
        (Some("5"), Some("2")) => json!([{ "id": 11, "text": "Mon 10:00" }, { "id": 12, "text": "Wed 16:00" }]),
        (Some("5"), Some("1")) => json!([{ "id": 13, "text": "Sat 09:00" }]),
        _ => json!([]),
    };
    Json(json!({ "results": results }))
}

async fn subgroups(State(portal): State<Portal>, uri: Uri, Query(q): Params) -> Json<Value> {
    portal.record(&uri).await;
    let results = match q.get("slot_id").map(String::as_str) {
        Some("11") => json!([{ "id": 31, "label": "Group A" }, { "id": 32, "label": "Group B" }]),
        Some("13") => json!([{ "id": 35, "label": "Group E" }]),
        _ => json!([]),
    };
    Json(json!({ "results": results }))
}

async fn spawn_portal() -> anyhow::Result<(String, Portal)> {
    let portal = Portal::default();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let base = "/ops/portal/enrollment/related";
    let app = Router::new()
        .route(&format!("{base}/students/"), get(students))
        .route(&format!("{base}/semesters/"), get(semesters))
        .route(&format!("{base}/slots/"), get(slots))
        .route(&format!("{base}/subgroups/"), get(subgroups))
        .route("/ops/portal/classnotice/subgroups/", get(subgroups))
        .with_state(portal.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), portal))
}

fn key(name: &str) -> FieldKey {
    FieldKey::new(name)
}

async fn values(controller: &CascadeController, name: &str) -> (Vec<String>, String) {
    let field = controller.field(&key(name)).await.expect("field");
    (
        field
            .option_values()
            .into_iter()
            .map(str::to_string)
            .collect(),
        field.value.0,
    )
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[tokio::test]
async fn saved_enrollment_is_rederived_hop_by_hop_on_load() {
    let (origin, portal) = spawn_portal().await.expect("portal");
    let fields = vec![
        Field::new("parent"),
        Field::new("student"),
        Field::new("course").with_value("5"),
        Field::new("semester").with_value("2"),
        Field::new("course_slot").with_value("11"),
        Field::new("sub_group").with_value("32"),
    ];
    let controller = CascadeController::bind(
        CascadeDefinition::enrollment(),
        PageContext::new(
            Url::parse(&origin).expect("origin"),
            "/ops/portal/enrollment/15/change/",
        ),
        fields,
        Arc::new(HttpOptionsFetcher::new()),
    )
    .expect("bind");

    controller.initial_sync().await;
    controller.settled().await;

    assert_eq!(
        *portal.requests.lock().await,
        strings(&[
            "/ops/portal/enrollment/related/semesters/?course_id=5",
            "/ops/portal/enrollment/related/slots/?course_id=5&semester_id=2",
            "/ops/portal/enrollment/related/subgroups/?slot_id=11",
        ])
    );
    assert_eq!(
        values(&controller, "semester").await,
        (strings(&["", "1", "2"]), "2".to_string())
    );
    assert_eq!(
        values(&controller, "course_slot").await,
        (strings(&["", "11", "12"]), "11".to_string())
    );
    assert_eq!(
        values(&controller, "sub_group").await,
        (strings(&["", "31", "32"]), "32".to_string())
    );
    assert_eq!(
        values(&controller, "student").await,
        (strings(&[""]), String::new())
    );
}

#[tokio::test]
async fn changing_semester_refetches_slots_and_drops_vanished_selection() {
    let (origin, portal) = spawn_portal().await.expect("portal");
    let fields = vec![
        Field::new("parent").with_value("3"),
        Field::new("student").with_value("9"),
        Field::new("course").with_value("5"),
        Field::new("semester").with_value("2"),
        Field::new("course_slot").with_value("11"),
        Field::new("sub_group").with_value("31"),
    ];
    let controller = CascadeController::bind(
        CascadeDefinition::enrollment(),
        PageContext::new(
            Url::parse(&origin).expect("origin"),
            "/ops/portal/enrollment/add/",
        ),
        fields,
        Arc::new(HttpOptionsFetcher::new()),
    )
    .expect("bind");
    controller.initial_sync().await;
    controller.settled().await;
    assert_eq!(
        values(&controller, "student").await,
        (strings(&["", "8", "9"]), "9".to_string())
    );
    portal.requests.lock().await.clear();

    controller
        .change(&key("semester"), "1")
        .await
        .expect("change semester");
    controller.settled().await;

    assert_eq!(
        *portal.requests.lock().await,
        strings(&["/ops/portal/enrollment/related/slots/?course_id=5&semester_id=1"])
    );
    assert_eq!(
        values(&controller, "course_slot").await,
        (strings(&["", "13"]), String::new())
    );
    assert_eq!(
        values(&controller, "sub_group").await,
        (strings(&[""]), String::new())
    );
}

#[tokio::test]
async fn class_notice_uses_data_url_and_placeholder() {
    let (origin, portal) = spawn_portal().await.expect("portal");
    let fields = vec![
        Field::new("course_slot"),
        Field::new("sub_group").with_data_url("/ops/portal/classnotice/subgroups/"),
    ];
    let controller = CascadeController::bind(
        CascadeDefinition::class_notice(),
        PageContext::new(
            Url::parse(&origin).expect("origin"),
            "/ops/portal/classnotice/add/",
        ),
        fields,
        Arc::new(HttpOptionsFetcher::new()),
    )
    .expect("bind");

    controller.initial_sync().await;
    controller.settled().await;
    assert!(portal.requests.lock().await.is_empty());

    controller
        .change(&key("course_slot"), "11")
        .await
        .expect("change slot");
    controller.settled().await;

    let sub_group = controller.field(&key("sub_group")).await.expect("field");
    assert_eq!(sub_group.option_values(), vec!["", "31", "32"]);
    assert_eq!(sub_group.state, FieldState::Populated);
    assert!(sub_group.enabled);
    assert_eq!(
        *portal.requests.lock().await,
        strings(&["/ops/portal/classnotice/subgroups/?slot_id=11"])
    );
}
