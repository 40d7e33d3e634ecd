mod common;

use axum::http::StatusCode;
use common::{TestApp, DEPLOYMENT_ORG, GLOBAL_ORG};
use conductor_service::models::Role;
use serde_json::json;

#[tokio::test]
async fn test_campus_admin_reads_and_sets_roles() {
    let app = TestApp::new();
    let admin = app
        .create_user_with_roles("Admin", "admin@example.com", &[(DEPLOYMENT_ORG, Role::CampusAdmin)])
        .await;
    let target = app
        .create_user_with_roles(
            "Target",
            "target@example.com",
            &[(DEPLOYMENT_ORG, Role::Member), ("elsewhere", Role::CampusAdmin)],
        )
        .await;
    let cookie = app.session_cookie(&admin.user_id);
    let uri = format!("/users/{}/roles", target.user_id);

    let res = app.get(&uri, Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user_id"], target.user_id.as_str());
    assert_eq!(res.body["roles"].as_array().unwrap().len(), 2);

    let res = app
        .put_json(&uri, Some(&cookie), json!({ "role": "campusadmin" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let roles = res.body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 2);
    let in_deployment: Vec<_> = roles
        .iter()
        .filter(|r| r["org"] == DEPLOYMENT_ORG)
        .collect();
    assert_eq!(in_deployment.len(), 1);
    assert_eq!(in_deployment[0]["role"], "campusadmin");
}

#[tokio::test]
async fn test_global_super_admin_passes_role_check() {
    let app = TestApp::new();
    let root = app
        .create_user_with_roles("Root", "root@example.com", &[(GLOBAL_ORG, Role::SuperAdmin)])
        .await;
    let target = app
        .create_user_with_roles("Target", "target@example.com", &[(DEPLOYMENT_ORG, Role::Member)])
        .await;
    let cookie = app.session_cookie(&root.user_id);

    let res = app
        .get(&format!("/users/{}/roles", target.user_id), Some(&cookie))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_members_and_other_org_admins_are_rejected() {
    let app = TestApp::new();
    let member = app
        .create_user_with_roles("Member", "member@example.com", &[(DEPLOYMENT_ORG, Role::Member)])
        .await;
    let foreign_admin = app
        .create_user_with_roles("Foreign", "foreign@example.com", &[("elsewhere", Role::CampusAdmin)])
        .await;
    let uri = format!("/users/{}/roles", member.user_id);

    for user in [&member, &foreign_admin] {
        let cookie = app.session_cookie(&user.user_id);
        let res = app.get(&uri, Some(&cookie)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["errMsg"], "Insufficient role");

        let res = app
            .put_json(&uri, Some(&cookie), json!({ "role": "campusadmin" }))
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let anonymous = app.get(&uri, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["errMsg"], "Authentication required");
}

#[tokio::test]
async fn test_superadmin_cannot_be_granted_and_unknown_user() {
    let app = TestApp::new();
    let admin = app
        .create_user_with_roles("Admin", "admin@example.com", &[(DEPLOYMENT_ORG, Role::CampusAdmin)])
        .await;
    let cookie = app.session_cookie(&admin.user_id);

    let res = app
        .put_json(
            &format!("/users/{}/roles", admin.user_id),
            Some(&cookie),
            json!({ "role": "superadmin" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .put_json("/users/ghost/roles", Some(&cookie), json!({ "role": "member" }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
