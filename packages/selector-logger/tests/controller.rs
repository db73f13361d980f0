//! End-to-end tests: protocol messages and autonomous rounds driven through
//! a real HTML page, the in-memory store, and a scripted host.

use serde_json::json;
use selector_logger::testing::{HostBehavior, RecordingBadge, ScriptedHost};
use selector_logger::{
    CollectorRow, ConfigState, Controller, HtmlExecutor, MemoryKv, Request, Response,
};

const PAGE: &str = r#"
    <html><body>
        <article class="post" data-id="a1">
            <h2 class="title">First
post</h2>
            <a class="link" href="/posts/1">read</a>
        </article>
        <article class="post" data-id="a2">
            <h2 class="title">Second post</h2>
            <a class="link" href="/posts/2">read</a>
        </article>
    </body></html>
"#;

fn page_executor(url: &str) -> HtmlExecutor {
    HtmlExecutor::new(url, PAGE)
}

fn controller_with(
    behavior: HostBehavior,
) -> Controller<MemoryKv, ScriptedHost, RecordingBadge> {
    Controller::new(MemoryKv::new(), ScriptedHost::new(behavior), RecordingBadge::new())
}

fn rows(values: &[&str]) -> Vec<CollectorRow> {
    values.iter().copied().map(CollectorRow::new).collect()
}

#[tokio::test]
async fn run_collectors_message_extracts_from_the_page() {
    let controller = controller_with(HostBehavior::Silent);
    let executor = page_executor("https://blog.example.com/index");

    let response = controller
        .handle(
            Request::RunCollectors {
                rows: rows(&[
                    "blog.example.com*|.title|inner:strip",
                    "|.link|attr:href",
                    "other.example.com*|.title|inner:strip",
                ]),
            },
            &executor,
        )
        .await;

    assert_eq!(
        response,
        Response::Collected {
            result: vec![
                "First post".to_string(),
                "Second post".to_string(),
                "/posts/1".to_string(),
                "/posts/2".to_string(),
            ],
        }
    );
}

#[tokio::test]
async fn error_lines_ride_in_the_result_stream() {
    let controller = controller_with(HostBehavior::Silent);
    let executor = page_executor("https://blog.example.com/index");

    let response = controller
        .handle(
            Request::RunCollectors {
                rows: rows(&["|.post|attr:", "|.post|shout", "|.post|attr:data-id"]),
            },
            &executor,
        )
        .await;

    let Response::Collected { result } = response else {
        panic!("expected a result");
    };
    assert_eq!(
        result,
        vec![
            "[attr error] missing attribute name",
            "[attr error] missing attribute name",
            "[mode error] unsupported mode \"shout\"",
            "[mode error] unsupported mode \"shout\"",
            "a1",
            "a2",
        ]
    );
}

#[tokio::test]
async fn full_autonomous_round_against_a_real_page() {
    let host = ScriptedHost::new(HostBehavior::Reply(json!({"ok": true})));
    let frames = host.frames_handle();
    let controller = Controller::new(MemoryKv::new(), host, RecordingBadge::new());
    controller
        .session()
        .set_state(&ConfigState {
            auto_run: true,
            rows: rows(&["|.title|inner:strip"]),
            enable_native: true,
            file_path: "/tmp/posts.log".to_string(),
            skip_visited: true,
        })
        .await
        .unwrap();

    let executor = page_executor("https://blog.example.com/index");
    controller
        .on_page_complete("https://blog.example.com/index", &executor)
        .await;

    assert_eq!(
        controller.session().log().await.unwrap(),
        vec!["First post", "Second post"]
    );
    assert_eq!(
        frames.lock().unwrap().clone(),
        vec![json!({
            "op": "append",
            "path": "/tmp/posts.log",
            "lines": ["First post", "Second post"],
        })]
    );
    assert!(controller
        .session()
        .has_visited("https://blog.example.com/index")
        .await
        .unwrap());

    // A second completion of the same page is deduplicated
    controller
        .on_page_complete("https://blog.example.com/index/", &executor)
        .await;
    assert_eq!(
        controller.session().log().await.unwrap(),
        vec!["First post", "Second post"]
    );
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn user_path_mirrors_the_popup_flow() {
    let controller = controller_with(HostBehavior::Reply(json!({"ok": true})));
    let executor = page_executor("https://blog.example.com/index");

    // Run, then append the result to the session log, then ask for a badge
    // refresh, the way the control surface does.
    let response = controller
        .handle(
            Request::RunCollectors {
                rows: rows(&["|.link|attr:href"]),
            },
            &executor,
        )
        .await;
    let Response::Collected { result } = response else {
        panic!("expected a result");
    };
    controller.session().append_log(&result).await.unwrap();

    let mut visited = controller.session().visited().await.unwrap();
    visited.insert(selector_logger::normalize_url(
        "https://blog.example.com/index",
    ));
    controller.session().set_visited(&visited).await.unwrap();

    let response = controller
        .handle(Request::UpdateBadge, &executor)
        .await;
    assert_eq!(response, Response::ok());
    assert_eq!(
        controller.session().log().await.unwrap(),
        vec!["/posts/1", "/posts/2"]
    );
}
