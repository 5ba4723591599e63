//! Full pipeline tests: `JobRunner` + `ReqwestFetcher` + `ScraperParser`
//! against a loopback HTTP server.

use std::time::Duration;

use tabula_client::{ReqwestFetcher, ScraperParser};
use tabula_core::{ColumnRule, ErrorKind, Job, JobRunner, JobState, OutputFormat, Outcome};

use crate::integration::common::{Route, refused_url, spawn_server};

const FIXTURE: &str = r#"<html>
  <body>
    <a href="/relative/path">A link</a>
    <p class="content">Paragraph text</p>
  </body>
</html>"#;

const LISTING: &str = r#"<html><body>
  <div class="item"><a href="item-1.html">First</a><span class="price">1.00</span></div>
  <div class="item"><a href="item-2.html">Second</a><span class="price">2.00</span></div>
  <div class="item"><a href="item-3.html">Third</a></div>
</body></html>"#;

fn runner() -> JobRunner<ReqwestFetcher, ScraperParser> {
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(5)).unwrap();
    JobRunner::new(fetcher, ScraperParser)
}

fn fixture_rules() -> Vec<ColumnRule> {
    vec![
        ColumnRule::text(["p.content"]).unwrap(),
        ColumnRule::attribute("href", ["a"]).unwrap(),
    ]
}

/// Poll the runner the way a front end would, bounded by `limit`.
async fn poll_until_done(
    runner: &mut JobRunner<ReqwestFetcher, ScraperParser>,
    limit: Duration,
) -> Outcome {
    let mut ticker = tokio::time::interval(Duration::from_millis(20));
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        ticker.tick().await;
        if let Some(outcome) = runner.poll() {
            return outcome;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job did not finish within {limit:?}"
        );
    }
}

#[tokio::test]
async fn test_fixture_page_end_to_end() {
    let base = spawn_server(vec![Route::html("/base/", FIXTURE)]).await;
    let mut runner = runner();
    let job = Job::new(format!("{base}/base/"), fixture_rules(), OutputFormat::Csv).unwrap();

    runner.submit(job).unwrap();
    let outcome = poll_until_done(&mut runner, Duration::from_secs(10)).await;

    let rows = outcome.into_result().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows.rows()[0],
        vec![
            Some("Paragraph text".to_string()),
            Some(format!("{base}/relative/path")),
        ]
    );
    assert_eq!(runner.state(), JobState::Completed);
    assert!(runner.poll().is_none(), "outcome must be delivered once");
}

#[tokio::test]
async fn test_relative_links_resolve_against_redirect_target() {
    let base = spawn_server(vec![
        Route::redirect("/old", "/shop/list.html"),
        Route::html("/shop/list.html", LISTING),
    ])
    .await;
    let mut runner = runner();
    let rules = vec![
        ColumnRule::text(["div.item > a"]).unwrap(),
        ColumnRule::text(["span.price"]).unwrap(),
        ColumnRule::attribute("href", ["div.item > a"]).unwrap(),
    ];
    let job = Job::new(format!("{base}/old"), rules, OutputFormat::Json).unwrap();

    runner.submit(job).unwrap();
    let rows = runner.wait().await.unwrap().into_result().unwrap();

    // Three links, two prices: the third item is dropped.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows()[1][0].as_deref(), Some("Second"));
    assert_eq!(rows.rows()[1][1].as_deref(), Some("2.00"));
    assert_eq!(
        rows.rows()[0][2].as_deref(),
        Some(format!("{base}/shop/item-1.html").as_str())
    );
}

#[tokio::test]
async fn test_no_matches_is_empty_success() {
    let base = spawn_server(vec![Route::html("/", FIXTURE)]).await;
    let mut runner = runner();
    let rules = vec![ColumnRule::text(["table td"]).unwrap()];
    let job = Job::new(format!("{base}/"), rules, OutputFormat::Csv).unwrap();

    runner.submit(job).unwrap();
    let outcome = runner.wait().await.unwrap();

    assert!(outcome.is_success());
    assert!(outcome.into_result().unwrap().is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_network_failure() {
    let base = spawn_server(vec![Route::status("/gone", 404)]).await;
    let mut runner = runner();
    let job = Job::new(format!("{base}/gone"), fixture_rules(), OutputFormat::Csv).unwrap();

    runner.submit(job).unwrap();
    let outcome = runner.wait().await.unwrap();

    match outcome {
        Outcome::Failure { kind, message } => {
            assert_eq!(kind, ErrorKind::Network);
            assert!(message.contains("404"), "unexpected message: {message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(runner.state(), JobState::Failed);
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let url = refused_url().await;
    let mut runner = runner();
    let job = Job::new(url, fixture_rules(), OutputFormat::Csv).unwrap();

    runner.submit(job).unwrap();
    let outcome = poll_until_done(&mut runner, Duration::from_secs(10)).await;

    let (kind, _) = outcome.into_result().unwrap_err();
    assert_eq!(kind, ErrorKind::Network);
}

#[tokio::test]
async fn test_runner_accepts_next_job_after_outcome() {
    let base = spawn_server(vec![
        Route::html("/first", FIXTURE),
        Route::html("/second", LISTING),
    ])
    .await;
    let mut runner = runner();

    runner
        .submit(Job::new(format!("{base}/first"), fixture_rules(), OutputFormat::Csv).unwrap())
        .unwrap();
    assert!(runner.wait().await.unwrap().is_success());

    let rules = vec![ColumnRule::text(["span.price"]).unwrap()];
    runner
        .submit(Job::new(format!("{base}/second"), rules, OutputFormat::Csv).unwrap())
        .unwrap();
    let rows = runner.wait().await.unwrap().into_result().unwrap();

    assert_eq!(rows.len(), 2);
}
