mod support;

use std::sync::Arc;

use clockify_core::{ClientDraft, ExpenseDraft, ProjectDraft};
use clockify_engine::{
    ClientManager, ExpenseFilter, ExpenseManager, FailureKind, GroupManager, Method, ProjectManager,
    TaskManager, UserManager, PAGE_PARAM, PAGE_SIZE_PARAM,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{
    category, client_for, group, project, task, user, workspace_path, RecordingSink,
    StubTransport,
};

fn projects_fixture() -> Arc<StubTransport> {
    StubTransport::new().with_listing(
        "/projects",
        vec![
            project("p1", "Website", Some(("c1", "Acme Corp"))),
            project("p2", "Mobile App", Some(("c1", "Acme Corp"))),
            project("p3", "Internal", None),
        ],
    )
}

fn project_gets(transport: &StubTransport) -> usize {
    transport
        .calls_with(Method::Get, &workspace_path("/projects"))
        .len()
}

#[tokio::test]
async fn project_listing_is_cached_until_a_mutation() {
    clockify_logging::initialize_for_tests();
    let transport = projects_fixture();
    let sink = RecordingSink::new();
    let mut manager = ProjectManager::new(client_for(&transport), sink.clone());

    let first = manager.get_all_projects(true).await;
    assert_eq!(first.items.len(), 3);
    let fetched = project_gets(&transport);
    assert_eq!(fetched, 1);

    manager.get_all_projects(true).await;
    assert_eq!(project_gets(&transport), fetched);

    manager
        .create_project(&ProjectDraft {
            name: "New".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    manager.get_all_projects(true).await;
    assert_eq!(project_gets(&transport), fetched + 1);

    manager.get_all_projects(false).await;
    assert_eq!(project_gets(&transport), fetched + 2);
    assert!(sink.names().contains(&"all_projects".to_string()));
}

#[tokio::test]
async fn failed_mutation_still_drops_the_cache() {
    let transport = projects_fixture().rejecting_writes_containing("Broken");
    let mut manager = ProjectManager::new(client_for(&transport), RecordingSink::new());

    manager.get_all_projects(true).await;
    let result = manager
        .create_project(&ProjectDraft {
            name: "Broken".to_string(),
            ..Default::default()
        })
        .await;
    assert!(result.is_err());

    manager.get_all_projects(true).await;
    assert_eq!(project_gets(&transport), 2);
}

#[tokio::test]
async fn incomplete_listing_is_neither_cached_nor_exported() {
    let transport = StubTransport::new()
        .with_listing(
            "/users",
            (0..60)
                .map(|n| user(&format!("u{n}"), &format!("User {n}"), &format!("u{n}@x.io")))
                .collect(),
        )
        .failing_page("/users", 1);
    let sink = RecordingSink::new();
    let mut manager = UserManager::new(client_for(&transport), sink.clone());

    let users = manager.get_all_users(true).await;
    assert!(users.is_error());
    assert!(users.items.is_empty());
    assert!(sink.last("all_users").is_none());

    manager.get_all_users(true).await;
    let page_one_calls = transport
        .calls()
        .iter()
        .filter(|call| call.query_value(PAGE_PARAM) == Some("1"))
        .count();
    assert_eq!(page_one_calls, 2);
}

#[tokio::test]
async fn empty_listing_is_cached_but_not_exported() {
    let transport = StubTransport::new().with_listing("/clients", vec![]);
    let sink = RecordingSink::new();
    let mut manager = ClientManager::new(client_for(&transport), sink.clone());

    assert!(manager.get_all_clients(true).await.items.is_empty());
    manager.get_all_clients(true).await;
    assert_eq!(transport.calls().len(), 1);
    assert!(sink.names().is_empty());
}

#[tokio::test]
async fn project_lookups_ignore_case_and_report_missing_names() {
    let transport = projects_fixture();
    let mut manager = ProjectManager::new(client_for(&transport), RecordingSink::new());

    let found = manager.get_project_by_name("website").await.unwrap();
    assert_eq!(found.id, "p1");

    let matches = manager
        .get_projects_by_names(&["MOBILE APP".to_string(), "Ghost".to_string()])
        .await;
    assert_eq!(matches.ids(), vec!["p2".to_string()]);
    assert_eq!(matches.missing, vec!["Ghost".to_string()]);

    let all = manager.get_all_projects(true).await.into_items();
    let acme = ProjectManager::filter_projects_by_client_id(&all, "c1");
    assert_eq!(acme.len(), 2);

    let clients = manager.extract_clients_from_projects(&all);
    assert_eq!(clients.len(), 1);
}

#[tokio::test]
async fn client_name_filter_resolves_through_client_listing() {
    let transport = projects_fixture().with_listing(
        "/clients",
        vec![json!({ "id": "c1", "name": "Acme Corp" })],
    );
    let sink = RecordingSink::new();
    let mut projects = ProjectManager::new(client_for(&transport), sink.clone());
    let mut clients = ClientManager::new(client_for(&transport), sink.clone());

    let all = projects.get_all_projects(true).await.into_items();
    let matched = clients.filter_projects_by_client_name(&all, "acme corp").await;
    assert_eq!(matched.len(), 2);
    assert!(clients
        .filter_projects_by_client_name(&all, "Nobody")
        .await
        .is_empty());

    let summary = clients.get_clients_summary(&all).await;
    assert_eq!(summary.total_clients, 1);

    clients
        .create_client(&ClientDraft {
            name: "Beta".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let posts = transport.calls_with(Method::Post, &workspace_path("/clients"));
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].body, Some(json!({ "name": "Beta" })));
}

#[tokio::test]
async fn tasks_are_cached_per_project() {
    let transport = StubTransport::new()
        .with_listing(
            "/projects/p1/tasks",
            vec![task("t1", "Design", "p1", &[]), task("t2", "Build", "p1", &[])],
        )
        .with_listing("/projects/p2/tasks", vec![task("t3", "Design Review", "p2", &[])]);
    let mut manager = TaskManager::new(client_for(&transport), RecordingSink::new());

    assert_eq!(manager.get_tasks_by_project("p1", true).await.items.len(), 2);
    assert_eq!(manager.get_tasks_by_project("p2", true).await.items.len(), 1);
    manager.delete_task("p1", "t2").await.unwrap();

    manager.get_tasks_by_project("p1", true).await;
    manager.get_tasks_by_project("p2", true).await;
    let p1_gets = transport
        .calls_with(Method::Get, &workspace_path("/projects/p1/tasks"))
        .len();
    let p2_gets = transport
        .calls_with(Method::Get, &workspace_path("/projects/p2/tasks"))
        .len();
    assert_eq!((p1_gets, p2_gets), (2, 1));
}

#[tokio::test]
async fn task_search_and_counts_span_projects() {
    let transport = projects_fixture()
        .with_listing(
            "/projects/p1/tasks",
            vec![task("t1", "Design", "p1", &[]), task("t2", "Build", "p1", &[])],
        )
        .with_listing("/projects/p2/tasks", vec![task("t3", "design review", "p2", &[])])
        .with_listing("/projects/p3/tasks", vec![]);
    let mut projects = ProjectManager::new(client_for(&transport), RecordingSink::new());
    let mut tasks = TaskManager::new(client_for(&transport), RecordingSink::new());

    let all = projects.get_all_projects(true).await.into_items();
    let found = tasks.get_tasks_by_name(&all, "DESIGN").await;
    let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t3"]);

    let counts = tasks.count_tasks_per_project(&all).await;
    assert_eq!(counts.get("p1"), Some(&2));
    assert_eq!(counts.get("p3"), Some(&0));
}

#[tokio::test]
async fn assigning_access_puts_canonical_ids() {
    let transport = StubTransport::new().with_listing(
        "/projects/p1/tasks",
        vec![task("t1", "Design", "p1", &["u9"])],
    );
    let mut manager = TaskManager::new(client_for(&transport), RecordingSink::new());
    let tasks = manager.get_tasks_by_project("p1", true).await;

    manager
        .assign_task_access(
            &tasks.items[0],
            &["u2".to_string(), "u1".to_string(), "u2".to_string()],
            &["g1".to_string()],
        )
        .await
        .unwrap();

    let puts = transport.calls_with(Method::Put, &workspace_path("/projects/p1/tasks/t1"));
    assert_eq!(puts.len(), 1);
    let body = puts[0].body.clone().unwrap();
    assert_eq!(body["assigneeIds"], json!(["u1", "u2"]));
    assert_eq!(body["userGroupIds"], json!(["g1"]));
    assert_eq!(body["name"], "Design");
}

#[tokio::test]
async fn group_membership_calls_hit_member_endpoints() {
    let transport = StubTransport::new().with_listing(
        "/user-groups",
        vec![group("g1", "Engineering"), group("g2", "Finance Team")],
    );
    let mut manager = GroupManager::new(client_for(&transport), RecordingSink::new());

    let matches = manager
        .find_groups_by_names(&["finance".to_string(), "Legal".to_string()])
        .await;
    assert_eq!(matches.ids(), vec!["g2".to_string()]);
    assert_eq!(matches.missing, vec!["Legal".to_string()]);
    assert!(manager
        .get_groups_by_names(&["finance".to_string()])
        .await
        .found
        .is_empty());

    manager.add_user_to_group("g1", "u1").await.unwrap();
    manager.remove_user_from_group("g1", "u1").await.unwrap();
    let posts = transport.calls_with(Method::Post, &workspace_path("/user-groups/g1/users"));
    assert_eq!(posts[0].body, Some(json!({ "userId": "u1" })));
    assert_eq!(
        transport
            .calls_with(Method::Delete, &workspace_path("/user-groups/g1/users/u1"))
            .len(),
        1
    );
}

#[tokio::test]
async fn users_resolve_by_email_and_name_fragment() {
    let transport = StubTransport::new().with_listing(
        "/users",
        vec![
            user("u1", "Ada Lovelace", "ada@example.com"),
            user("u2", "Alan Turing", "alan@example.com"),
        ],
    );
    let mut manager = UserManager::new(client_for(&transport), RecordingSink::new());

    let ada = manager.get_user_by_email("ADA@example.com").await.unwrap();
    assert_eq!(ada.id, "u1");
    assert_eq!(manager.get_users_by_name("al").await.len(), 1);
    let matches = manager
        .find_users_by_names(&["turing".to_string()])
        .await;
    assert_eq!(matches.ids(), vec!["u2".to_string()]);
}

#[tokio::test]
async fn expense_listing_uses_small_pages_and_user_route() {
    let transport = StubTransport::new()
        .with_listing("/expenses", vec![json!({ "id": "e1", "amount": 12.5, "projectId": "p1" })])
        .with_listing("/user/u1/expenses", vec![json!({ "id": "e2", "amount": 3.0 })])
        .with_listing("/expenses/categories", vec![category("cat1", "Travel")]);
    let sink = RecordingSink::new();
    let mut manager = ExpenseManager::new(client_for(&transport), sink.clone());

    let filter = ExpenseFilter {
        project_id: Some("p1".to_string()),
        ..Default::default()
    };
    let all = manager.get_all_expenses(&filter, true).await;
    assert_eq!(all.items.len(), 1);
    let call = &transport.calls_with(Method::Get, &workspace_path("/expenses"))[0];
    assert_eq!(call.query_value(PAGE_SIZE_PARAM), Some("50"));
    assert_eq!(call.query_value("projectId"), Some("p1"));

    let mine = manager
        .get_all_expenses(
            &ExpenseFilter {
                user_id: Some("u1".to_string()),
                ..Default::default()
            },
            true,
        )
        .await;
    assert_eq!(mine.items[0].id, "e2");

    let categories = manager.get_expense_categories(true).await;
    assert_eq!(categories.items[0].name, "Travel");

    let summary = manager.get_expense_summary(&filter).await;
    assert_eq!(summary.total_expenses, 1);
    assert!(sink.last("expense_summary").is_some());
}

#[tokio::test]
async fn bulk_create_isolates_failures() {
    let transport = StubTransport::new().rejecting_writes_containing("reject me");
    let mut manager = ExpenseManager::new(client_for(&transport), RecordingSink::new());
    let drafts = vec![
        complete_draft(10.0, "ok"),
        complete_draft(20.0, "reject me"),
        complete_draft(30.0, "fine"),
    ];

    let outcome = manager.bulk_create_expenses(&drafts).await;
    assert_eq!(outcome.total_created(), 2);
    assert_eq!(outcome.total_failed(), 1);
    assert_eq!(outcome.failed[0].index, 1);
    assert_eq!(
        transport
            .calls_with(Method::Post, &workspace_path("/expenses"))
            .len(),
        3
    );
}

fn complete_draft(amount: f64, notes: &str) -> ExpenseDraft {
    ExpenseDraft {
        amount,
        project_id: Some("p1".to_string()),
        category_id: Some("cat1".to_string()),
        user_id: Some("u1".to_string()),
        date: Some("2025-07-01T00:00:00Z".to_string()),
        notes: Some(notes.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn incomplete_expense_draft_is_refused_without_a_request() {
    let transport = StubTransport::new();
    let mut manager = ExpenseManager::new(client_for(&transport), RecordingSink::new());
    let draft = ExpenseDraft {
        amount: 12.0,
        notes: Some("Coffee".to_string()),
        ..Default::default()
    };

    let err = manager.create_expense(&draft).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidBody);
    assert!(err.message.contains("categoryId, date, projectId, userId"));

    let outcome = manager
        .bulk_create_expenses(&[draft, complete_draft(5.0, "Tea")])
        .await;
    assert_eq!(outcome.total_created(), 1);
    assert_eq!(outcome.failed[0].index, 0);
    assert_eq!(
        transport
            .calls_with(Method::Post, &workspace_path("/expenses"))
            .len(),
        1
    );
}
