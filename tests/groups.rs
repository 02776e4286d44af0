//! Grouping queries: validation, roll-ups, headers and determinism.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::*;
use testrun_backend::storage::models::TestcaseStatus;

#[tokio::test]
async fn validate_query_reports_grouping() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let token = access_token_for(&user.id);

    let query = urlencode(&format!("session_id = \"{}\"", Uuid::new_v4()));
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups/validate-query?queryStr={query}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["isGrouping"], false);

    let query = urlencode("group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups/validate-query?queryStr={query}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isGrouping"], true);

    let (status, body) = api_get(
        &harness.app,
        "/api/v1/groups/validate-query?queryStr=abc",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["detail"]
            .as_str()
            .expect("detail")
            .starts_with("Invalid query"),
        "{body}"
    );
}

#[tokio::test]
async fn non_grouping_query_yields_an_empty_envelope() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let token = access_token_for(&user.id);

    let (status, body) = api_get(
        &harness.app,
        "/api/v1/groups?queryStr=&offset=0&limit=10",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "items": [],
            "total": 0,
            "offset": 0,
            "limit": 10,
            "header": null,
            "aggregatedStatus": null,
        })
    );
}

#[tokio::test]
async fn session_grouping_rolls_up_the_worst_status() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let session1 = create_session(&harness.db, &user.id).await;
    let session2 = create_session(&harness.db, &user.id).await;

    create_testcase(&harness.db, &session1, TestcaseStatus::Pass).await;
    create_testcase(&harness.db, &session1, TestcaseStatus::Fail).await;
    create_testcase(&harness.db, &session2, TestcaseStatus::Pass).await;
    create_testcase(&harness.db, &session2, TestcaseStatus::Error).await;
    create_testcase(&harness.db, &session2, TestcaseStatus::Skip).await;

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let mut expected_items = vec![
        json!({ "columns": [session1.id], "status": 1 }),
        json!({ "columns": [session2.id], "status": 0 }),
    ];
    expected_items.sort_by_key(|item| item["columns"][0].as_str().map(str::to_string));
    assert_eq!(
        body,
        json!({
            "items": expected_items,
            "total": 2,
            "offset": 0,
            "limit": 10,
            "header": ["session_id"],
            "aggregatedStatus": 0,
        })
    );
}

#[tokio::test]
async fn grouping_respects_the_main_query_filter() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let session1 = create_session(&harness.db, &user.id).await;
    let session2 = create_session(&harness.db, &user.id).await;
    create_testcase(&harness.db, &session1, TestcaseStatus::Fail).await;
    create_testcase(&harness.db, &session2, TestcaseStatus::Error).await;

    let token = access_token_for(&user.id);
    let query = urlencode(&format!(
        "session_id=\"{}\" group_by(session_id)",
        session1.id
    ));
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "items": [{ "columns": [session1.id], "status": 1 }],
            "total": 1,
            "offset": 0,
            "limit": 10,
            "header": ["session_id"],
            "aggregatedStatus": 1,
        })
    );
}

#[tokio::test]
async fn tag_grouping_by_label_value() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let prod = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &prod, "env", Some("prod")).await;
    let dev = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &dev, "env", Some("dev")).await;
    let unlabeled = create_session(&harness.db, &user.id).await;

    create_testcase(&harness.db, &prod, TestcaseStatus::Error).await;
    create_testcase(&harness.db, &dev, TestcaseStatus::Pass).await;
    // No env label: this session contributes no group row.
    create_testcase(&harness.db, &unlabeled, TestcaseStatus::Fail).await;

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(#\"env\")");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "items": [
                { "columns": ["dev"], "status": 2 },
                { "columns": ["prod"], "status": 0 },
            ],
            "total": 2,
            "offset": 0,
            "limit": 10,
            "header": ["#\"env\""],
            "aggregatedStatus": 0,
        })
    );
}

#[tokio::test]
async fn valueless_labels_group_under_null() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let session1 = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &session1, "triaged", None).await;
    let session2 = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &session2, "triaged", None).await;

    create_testcase(&harness.db, &session1, TestcaseStatus::Pass).await;
    create_testcase(&harness.db, &session2, TestcaseStatus::Pass).await;

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(#\"triaged\")");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({
            "items": [{ "columns": [null], "status": 2 }],
            "total": 1,
            "offset": 0,
            "limit": 10,
            "header": ["#\"triaged\""],
            "aggregatedStatus": 2,
        })
    );
}

#[tokio::test]
async fn multi_token_grouping_orders_columns_by_token() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let session = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &session, "env", Some("prod")).await;
    create_testcase(&harness.db, &session, TestcaseStatus::Skip).await;

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(session_id, #\"env\")");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["header"], json!(["session_id", "#\"env\""]));
    assert_eq!(body["items"][0]["columns"], json!([session.id, "prod"]));
    assert_eq!(body["items"][0]["status"], 3);
}

#[tokio::test]
async fn tag_filter_combines_with_grouping() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    let tagged = create_session(&harness.db, &user.id).await;
    create_label(&harness.db, &tagged, "ci", None).await;
    let untagged = create_session(&harness.db, &user.id).await;

    create_testcase(&harness.db, &tagged, TestcaseStatus::Fail).await;
    create_testcase(&harness.db, &untagged, TestcaseStatus::Error).await;

    let token = access_token_for(&user.id);

    let query = urlencode("#\"ci\" group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["columns"], json!([tagged.id]));

    let query = urlencode("!#\"ci\" group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["columns"], json!([untagged.id]));
}

#[tokio::test]
async fn group_pagination_keeps_the_full_total() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    for _ in 0..4 {
        let session = create_session(&harness.db, &user.id).await;
        create_testcase(&harness.db, &session, TestcaseStatus::Pass).await;
    }

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=3"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 4);
    assert_eq!(body["items"].as_array().expect("items").len(), 3);

    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=3&limit=3"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["items"].as_array().expect("items").len(), 1);
}

#[tokio::test]
async fn group_listings_are_deterministic() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    for _ in 0..5 {
        let session = create_session(&harness.db, &user.id).await;
        create_testcase(&harness.db, &session, TestcaseStatus::Pass).await;
    }

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(session_id)");
    let uri = format!("/api/v1/groups?queryStr={query}&offset=0&limit=10");

    let (_, first) = api_get(&harness.app, &uri, Some(&token)).await;
    let (_, second) = api_get(&harness.app, &uri, Some(&token)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn groups_are_isolated_between_users() {
    let harness = test_app().await;
    let alice = create_user(&harness.db, "alice", "password1").await;
    let bob = create_user(&harness.db, "bob", "password1").await;
    let session = create_session(&harness.db, &bob.id).await;
    create_testcase(&harness.db, &session, TestcaseStatus::Error).await;

    let token = access_token_for(&alice.id);
    let query = urlencode("group_by(session_id)");
    let (status, body) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["header"], serde_json::Value::Null);
}

/// Every group row can be drilled into, and the drill-down returns rows
/// that re-derive to exactly that group.
#[tokio::test]
async fn drill_down_inverts_the_grouping() {
    let harness = test_app().await;
    let user = create_user(&harness.db, "alice", "password1").await;
    for value in [Some("prod"), Some("dev"), None] {
        let session = create_session(&harness.db, &user.id).await;
        create_label(&harness.db, &session, "env", value).await;
        create_testcase(&harness.db, &session, TestcaseStatus::Pass).await;
    }

    let token = access_token_for(&user.id);
    let query = urlencode("group_by(#\"env\")");
    let (status, groups) = api_get(
        &harness.app,
        &format!("/api/v1/groups?queryStr={query}&offset=0&limit=10"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{groups}");
    let keys = groups["header"].clone();
    let items = groups["items"].as_array().expect("items").clone();
    assert_eq!(items.len(), 3);

    for item in items {
        let identifier = json!([keys, item["columns"]]);
        let group = urlencode(&identifier.to_string());
        let (status, body) = api_get(
            &harness.app,
            &format!("/api/v1/testcases?queryStr={query}&group={group}"),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(
            body["total"].as_i64().expect("total") > 0,
            "group {identifier} should have testcases"
        );
    }
}
