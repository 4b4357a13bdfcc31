mod support;

use clockify_core::{PagePlan, ResponseShape, StopReason};
use clockify_engine::{ApiClient, Fetch, Method, PageWalker, PAGE_PARAM, PAGE_SIZE_PARAM};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use support::{client_for, workspace_path, StubTransport};

fn numbered(total: usize) -> Vec<Value> {
    (0..total)
        .map(|n| json!({ "id": format!("p{n}"), "name": format!("Project {n}") }))
        .collect()
}

#[tokio::test]
async fn walker_requests_one_extra_page_on_exact_multiples() {
    clockify_logging::initialize_for_tests();
    for (total, size) in [(0, 3), (1, 3), (3, 3), (7, 3), (9, 3), (10, 1)] {
        let transport = StubTransport::new().with_listing("/projects", numbered(total));
        let walker = PageWalker::new(transport.as_ref());
        let aggregate = walker
            .walk(
                &workspace_path("/projects"),
                &[],
                PagePlan::new(Some(size), None),
            )
            .await;

        let expected_pages = total.div_ceil(size) + usize::from(total % size == 0);
        assert_eq!(aggregate.total_count(), total, "N={total} S={size}");
        assert_eq!(aggregate.pages_fetched, expected_pages, "N={total} S={size}");
        assert_eq!(transport.calls().len(), expected_pages);
        assert!(aggregate.is_complete());
    }
}

#[tokio::test]
async fn items_keep_page_order() {
    let transport = StubTransport::new().with_listing("/projects", numbered(8));
    let aggregate = PageWalker::new(transport.as_ref())
        .walk(&workspace_path("/projects"), &[], PagePlan::new(Some(3), None))
        .await;

    let ids: Vec<&str> = aggregate
        .items
        .iter()
        .filter_map(|item| item["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"]);

    let pages: Vec<String> = transport
        .calls()
        .iter()
        .filter_map(|call| call.query_value(PAGE_PARAM).map(str::to_string))
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn failing_page_keeps_earlier_items_and_marks_failure() {
    clockify_logging::initialize_for_tests();
    let transport = StubTransport::new()
        .with_listing("/projects", numbered(10))
        .failing_page("/projects", 3);
    let aggregate = PageWalker::new(transport.as_ref())
        .walk(&workspace_path("/projects"), &[], PagePlan::new(Some(2), None))
        .await;

    assert_eq!(aggregate.total_count(), 4);
    assert_eq!(aggregate.pages_fetched, 2);
    assert!(aggregate.is_error());
    assert!(!aggregate.is_complete());
    assert!(matches!(aggregate.stop, StopReason::Failed { page: 3, .. }));
    assert!(ApiClient::get_error_message(&aggregate)
        .unwrap_or_default()
        .contains("500"));
}

#[tokio::test]
async fn page_cap_stops_walk_and_is_flagged() {
    let transport = StubTransport::new().with_listing("/projects", numbered(10));
    let aggregate = PageWalker::new(transport.as_ref())
        .walk(
            &workspace_path("/projects"),
            &[],
            PagePlan::new(Some(2), Some(2)),
        )
        .await;

    assert_eq!(aggregate.total_count(), 4);
    assert_eq!(aggregate.pages_fetched, 2);
    assert_eq!(aggregate.stop, StopReason::PageCap);
    assert!(!aggregate.is_complete());
    assert!(!aggregate.is_error());
}

#[tokio::test]
async fn caller_page_keys_are_overridden() {
    let transport = StubTransport::new().with_listing("/projects", numbered(2));
    let filters = vec![
        ("page".to_string(), "9".to_string()),
        ("page-size".to_string(), "1".to_string()),
        ("archived".to_string(), "false".to_string()),
    ];
    PageWalker::new(transport.as_ref())
        .walk(&workspace_path("/projects"), &filters, PagePlan::new(Some(5), None))
        .await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let first = &calls[0];
    assert_eq!(first.query_value(PAGE_PARAM), Some("1"));
    assert_eq!(first.query_value(PAGE_SIZE_PARAM), Some("5"));
    assert_eq!(first.query_value("archived"), Some("false"));
    assert_eq!(
        first.query.iter().filter(|(key, _)| key == PAGE_PARAM).count(),
        1
    );
}

#[tokio::test]
async fn repeated_walks_return_identical_results() {
    let transport = StubTransport::new().with_listing("/projects", numbered(5));
    let client = client_for(&transport);
    let first = client.list("/projects", &[], Fetch::with_page_size(2)).await;
    let second = client.list("/projects", &[], Fetch::with_page_size(2)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn first_page_fetch_sends_no_paging_params() {
    let transport = StubTransport::new().with_listing("/clients", numbered(4));
    let client = client_for(&transport);
    let aggregate = client.list("/clients", &[], Fetch::FirstPage).await;

    assert_eq!(aggregate.total_count(), 4);
    assert_eq!(aggregate.stop, StopReason::SinglePage);
    let calls = transport.calls_with(Method::Get, &workspace_path("/clients"));
    assert_eq!(calls.len(), 1);
    assert!(calls[0].query.is_empty());
}

#[tokio::test]
async fn envelope_responses_are_unwrapped() {
    let transport = StubTransport::new().with_record(
        &workspace_path("/expenses"),
        json!({ "expenses": [{ "id": "e1", "amount": 3.5 }], "count": 1 }),
    );
    let client = client_for(&transport);
    let aggregate = client.list_expenses(&[], Fetch::FirstPage).await;
    assert_eq!(aggregate.items.len(), 1);
    assert_eq!(aggregate.items[0].amount, 3.5);

    let probe = client.probe_pagination("/expenses").await.unwrap();
    assert_eq!(probe.first_page_items, 1);
    assert!(matches!(probe.shape, ResponseShape::Object { .. }));
}

#[tokio::test]
async fn unreachable_listing_yields_error_aggregate() {
    let transport = StubTransport::new();
    let client = client_for(&transport);
    let aggregate = client.list_users(Fetch::all()).await;
    assert!(ApiClient::is_error_response(&aggregate));
    assert!(aggregate.items.is_empty());
    assert_eq!(aggregate.pages_fetched, 0);
}
