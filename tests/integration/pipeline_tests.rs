//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for the PDGA site and run the
//! whole fetch, parse, reconcile and load cycle end-to-end.

use disc_harvest::config::{Config, FetcherConfig, OutputConfig, RunConfig, SourceConfig, UserAgentConfig};
use disc_harvest::crawler::{Coordinator, RunOutcome};
use disc_harvest::model::{CompanyKey, DiscKey, EntityKey, PlayerKey};
use disc_harvest::source::{Category, COMPANY_INDEX_PATH, DISC_INDEX_PATH, PLAYER_PATH};
use disc_harvest::state::PageState;
use disc_harvest::storage::{RunStatus, SqliteStorage, Storage};
use disc_harvest::{HarvestError, MemorySink, PageDescriptor, PageKind};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPANY_LISTING: &str = r#"
    <html><body>
    <table class="views-table"><tbody>
      <tr>
        <td class="views-field-title">Innova</td>
        <td class="views-field-field-status">Active</td>
        <td class="views-field-field-city">Rancho Cucamonga</td>
        <td class="views-field-field-state">CA</td>
      </tr>
      <tr>
        <td class="views-field-title">Discraft</td>
        <td class="views-field-field-status">Active</td>
      </tr>
    </tbody></table>
    </body></html>
"#;

const DISC_LISTING_0: &str = r#"
    <html><body>
    <table class="views-table"><tbody>
      <tr>
        <td class="views-field-field-equipment-manuf-ref">Innova</td>
        <td class="views-field-title"><a href="/technical-standards/equipment-certification/discs/destroyer">Destroyer</a></td>
        <td class="views-field-field-equipment-approval-date">2007-01-19</td>
      </tr>
      <tr>
        <td class="views-field-field-equipment-manuf-ref">Discraft</td>
        <td class="views-field-title"><a href="/technical-standards/equipment-certification/discs/buzzz">Buzzz</a></td>
        <td class="views-field-field-equipment-approval-date">2003-05-01</td>
      </tr>
    </tbody></table>
    <ul class="pager"><li class="pager-next"><a href="?page=1">Next</a></li></ul>
    </body></html>
"#;

const DISC_LISTING_1: &str = r#"
    <html><body>
    <table class="views-table"><tbody>
      <tr>
        <td class="views-field-field-equipment-manuf-ref">Innova</td>
        <td class="views-field-title"><a href="/technical-standards/equipment-certification/discs/leopard">Leopard</a></td>
      </tr>
    </tbody></table>
    </body></html>
"#;

fn disc_detail(manufacturer: &str, model: &str, flight: [&str; 4]) -> String {
    format!(
        r#"<html><body>
        <h1 class="page-title">{}</h1>
        <div class="field--manufacturer"><div class="field__item">{}</div></div>
        <div class="field--speed"><div class="field__item">{}</div></div>
        <div class="field--glide"><div class="field__item">{}</div></div>
        <div class="field--turn"><div class="field__item">{}</div></div>
        <div class="field--fade"><div class="field__item">{}</div></div>
        <div class="field--plastics"><div class="field__item">Star</div></div>
        </body></html>"#,
        model, manufacturer, flight[0], flight[1], flight[2], flight[3]
    )
}

const PLAYER_PROFILE: &str = r#"
    <html><body>
    <h1>Paul McBeth #27523</h1>
    <ul class="player-info">
      <li class="classification"><strong>Classification: </strong>Professional</li>
      <li class="current-rating"><strong>Current Rating: </strong>1046</li>
    </ul>
    </body></html>
"#;

/// Creates a test configuration pointing at a mock server
fn create_test_config(base_url: &str, dir: &Path, categories: Vec<Category>) -> Config {
    Config {
        source: SourceConfig {
            base_url: base_url.to_string(),
            categories,
            player_ids: vec![27523],
            event_ids: vec![],
        },
        fetcher: FetcherConfig {
            max_retries: 3,
            rate_limit_interval: 0,
            worker_count: 2,
            request_timeout: 5,
            backoff_base: 10, // Very short for testing
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.join("harvest.db").display().to_string(),
            summary_path: dir.join("summary.md").display().to_string(),
        },
        run: RunConfig::default(),
        company_aliases: vec![],
    }
}

async fn mount_html(server: &MockServer, page_path: &str, page: Option<u32>, body: &str, times: u64) {
    let mut mock = Mock::given(method("GET")).and(path(page_path));
    if let Some(page) = page {
        mock = mock.and(query_param("page", page.to_string()));
    }
    mock.respond_with(
        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/html"),
    )
    .expect(times)
    .mount(server)
    .await;
}

/// Mounts the company listing, two disc listing pages and three disc details
async fn mount_catalog(server: &MockServer) {
    mount_html(server, COMPANY_INDEX_PATH, Some(0), COMPANY_LISTING, 1).await;
    mount_html(server, DISC_INDEX_PATH, Some(0), DISC_LISTING_0, 1).await;
    mount_html(server, DISC_INDEX_PATH, Some(1), DISC_LISTING_1, 1).await;
    for (manufacturer, model, flight) in [
        ("Innova", "Destroyer", ["12", "5", "-1", "3"]),
        ("Discraft", "Buzzz", ["5", "4", "-1", "1"]),
        ("Innova", "Leopard", ["6", "5", "-2", "1"]),
    ] {
        mount_html(
            server,
            &format!("{}/{}", DISC_INDEX_PATH, model.to_lowercase()),
            None,
            &disc_detail(manufacturer, model, flight),
            1,
        )
        .await;
    }
}

fn disc_key(manufacturer: &str, model: &str) -> EntityKey {
    EntityKey::Disc(DiscKey::new(CompanyKey::new(manufacturer).unwrap(), model).unwrap())
}

async fn run_to_completion(config: Config, fresh: bool) -> (MemorySink, RunOutcome) {
    let mut sink = MemorySink::new();
    let mut coordinator =
        Coordinator::new(config, "test-hash", fresh).expect("Failed to create coordinator");
    let outcome = coordinator
        .run(&mut sink, CancellationToken::new())
        .await
        .expect("Run failed");
    (sink, outcome)
}

#[tokio::test]
async fn test_full_harvest() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    mount_html(&server, &format!("{}/27523", PLAYER_PATH), None, PLAYER_PROFILE, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![Category::Companies, Category::Discs, Category::Players],
    );

    let (sink, outcome) = run_to_completion(config, true).await;

    assert!(outcome.is_completed());
    let summary = outcome.summary();
    assert_eq!(summary.pages_fetched, 7);
    assert_eq!(summary.pages_done, 7);
    assert!(summary.failed.is_empty());
    assert!(summary.dangling.is_empty());
    assert_eq!(summary.companies, 2);
    assert_eq!(summary.discs, 3);
    assert_eq!(summary.players, 1);
    assert_eq!(summary.upserted, 6);

    // Companies stream first, then discs, then players
    let kinds: Vec<&str> = sink.upsert_order().iter().map(|key| key.kind()).collect();
    assert_eq!(
        kinds,
        vec!["company", "company", "disc", "disc", "disc", "player"]
    );
    let committed: Vec<&EntityKey> = sink.entities().keys().collect();
    let streamed: Vec<&EntityKey> = sink.upsert_order().iter().collect();
    assert_eq!(streamed, committed);

    let destroyer = sink.get(&disc_key("Innova", "Destroyer")).unwrap();
    assert_eq!(destroyer["model"], "Destroyer");
    assert_eq!(destroyer["speed"], 12.0);
    assert_eq!(destroyer["turn"], -1.0);
    assert_eq!(destroyer["approved"], "2007-01-19");
    assert_eq!(destroyer["plastics"][0], "Star");

    let innova = sink
        .get(&EntityKey::Company(CompanyKey::new("Innova").unwrap()))
        .unwrap();
    assert_eq!(innova["location"], "Rancho Cucamonga, CA");
    assert_eq!(innova["active"], true);

    let player = sink.get(&EntityKey::Player(PlayerKey(27523))).unwrap();
    assert_eq!(player["name"], "Paul McBeth");
    assert_eq!(player["rating"], 1046);

    let summary_md = disc_harvest::output::format_markdown_summary(summary);
    assert!(summary_md.contains("| Discs | 3 |"));
}

#[tokio::test]
async fn test_failed_pages_are_bounded_and_reported() {
    let server = MockServer::start().await;
    mount_html(&server, DISC_INDEX_PATH, Some(0), DISC_LISTING_0, 1).await;
    mount_html(&server, DISC_INDEX_PATH, Some(1), DISC_LISTING_1, 1).await;
    mount_html(
        &server,
        &format!("{}/leopard", DISC_INDEX_PATH),
        None,
        &disc_detail("Innova", "Leopard", ["6", "5", "-2", "1"]),
        1,
    )
    .await;

    // Permanent: fetched once
    Mock::given(method("GET"))
        .and(path(format!("{}/destroyer", DISC_INDEX_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    // Transient: fetched exactly max_retries times
    Mock::given(method("GET"))
        .and(path(format!("{}/buzzz", DISC_INDEX_PATH)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), vec![Category::Discs]);
    let db_path = config.output.database_path.clone();

    let (sink, outcome) = run_to_completion(config, true).await;

    // Failures never abort the run
    assert!(outcome.is_completed());
    let summary = outcome.summary();
    assert_eq!(summary.failed.len(), 2);
    assert_eq!(summary.fetch_attempts, 3 + 1 + 3);

    let destroyer = summary
        .failed
        .iter()
        .find(|page| page.key == "disc_detail/destroyer")
        .unwrap();
    assert_eq!(destroyer.attempts, 1);
    assert_eq!(destroyer.status, Some(404));

    let buzzz = summary
        .failed
        .iter()
        .find(|page| page.key == "disc_detail/buzzz")
        .unwrap();
    assert_eq!(buzzz.attempts, 3);
    assert!(buzzz.reason.contains("HTTP 500"));

    // Shallow listing records still produce the discs whose details failed
    assert_eq!(summary.discs, 3);
    assert!(sink.get(&disc_key("Discraft", "Buzzz")).is_some());

    // No company pages were crawled, so every disc dangles
    assert_eq!(summary.dangling.len(), 3);

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    let record = storage.get_descriptor("disc_detail/buzzz").unwrap().unwrap();
    assert_eq!(record.state, PageState::Failed);
    assert_eq!(record.attempts, 3);
}

#[tokio::test]
async fn test_halted_run_resumes_without_refetching() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![Category::Companies, Category::Discs],
    );
    config.fetcher.worker_count = 1;

    // First session halts after two pages
    let mut halted_config = config.clone();
    halted_config.run.page_budget = Some(2);
    let mut first_sink = MemorySink::new();
    let mut coordinator = Coordinator::new(halted_config, "test-hash", true).unwrap();
    let first = coordinator
        .run(&mut first_sink, CancellationToken::new())
        .await
        .unwrap();
    drop(coordinator);

    assert!(matches!(first, RunOutcome::Halted(_)));
    assert!(first_sink.is_empty());
    let halted_pages = first.summary().pages_done;
    assert!(halted_pages >= 2 && halted_pages < 6);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
    drop(storage);

    // Second session fetches only what is left
    let (resumed_sink, second) = run_to_completion(config, false).await;
    assert!(second.is_completed());
    assert!(second.summary().resumed);
    assert_eq!(second.summary().pages_fetched + halted_pages, 6);
    assert_eq!(second.summary().pages_done, 6);

    // Same table as an uninterrupted run
    let reference_server = MockServer::start().await;
    mount_catalog(&reference_server).await;
    let reference_dir = TempDir::new().unwrap();
    let reference_config = create_test_config(
        &reference_server.uri(),
        reference_dir.path(),
        vec![Category::Companies, Category::Discs],
    );
    let (reference_sink, _) = run_to_completion(reference_config, true).await;

    assert_eq!(resumed_sink.entities(), reference_sink.entities());
}

#[tokio::test]
async fn test_sink_failure_retries_only_the_load() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![Category::Companies, Category::Discs],
    );

    let mut failing_sink = MemorySink::failing_after(1);
    let mut coordinator = Coordinator::new(config.clone(), "test-hash", true).unwrap();
    let result = coordinator
        .run(&mut failing_sink, CancellationToken::new())
        .await;
    drop(coordinator);

    assert!(matches!(result, Err(HarvestError::Sink(_))));
    assert!(failing_sink.is_empty());

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
    assert_eq!(storage.count_by_state(PageState::Done).unwrap(), 6);
    drop(storage);

    // Resuming replays the journal and loads without fetching anything
    let (sink, outcome) = run_to_completion(config, false).await;
    assert!(outcome.is_completed());
    assert_eq!(outcome.summary().pages_fetched, 0);
    assert_eq!(sink.len(), 5);
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..500 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never received {} requests", count);
}

#[tokio::test]
async fn test_cancel_during_backoff_keeps_attempts() {
    let server = MockServer::start().await;
    let profile_path = format!("{}/27523", PLAYER_PATH);
    Mock::given(method("GET"))
        .and(path(profile_path.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_html(&server, &profile_path, None, PLAYER_PROFILE, 1).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path(), vec![Category::Players]);
    config.fetcher.worker_count = 1;

    // The first retry would wait a full minute
    let mut slow_config = config.clone();
    slow_config.fetcher.backoff_base = 60_000;
    let cancel = CancellationToken::new();
    let mut first_sink = MemorySink::new();
    let mut coordinator = Coordinator::new(slow_config, "test-hash", true).unwrap();
    let session = coordinator.run(&mut first_sink, cancel.clone());
    let interrupt = async {
        wait_for_requests(&server, 1).await;
        cancel.cancel();
    };
    let (first, ()) = tokio::join!(session, interrupt);
    drop(coordinator);

    let first = first.unwrap();
    assert!(matches!(first, RunOutcome::Halted(_)));
    assert!(first_sink.is_empty());

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let record = storage.get_descriptor("player_profile/27523").unwrap().unwrap();
    assert_eq!(record.state, PageState::Pending);
    assert_eq!(record.attempts, 1);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
    drop(storage);

    // The resumed session spends the second attempt, not a fresh first one
    let (sink, outcome) = run_to_completion(config.clone(), false).await;
    assert!(outcome.is_completed());
    assert!(outcome.summary().resumed);
    assert!(sink.get(&EntityKey::Player(PlayerKey(27523))).is_some());

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let record = storage.get_descriptor("player_profile/27523").unwrap().unwrap();
    assert_eq!(record.state, PageState::Done);
    assert_eq!(record.attempts, 2);
}

#[tokio::test]
async fn test_resume_never_exceeds_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/27523", PLAYER_PATH)))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), vec![Category::Players]);

    // A session died while the page was on its last allowed attempt
    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let run_id = storage.create_run("test-hash").unwrap();
    let profile = PageDescriptor::detail(PageKind::PlayerProfile, "27523");
    storage.enqueue_descriptor(&profile, run_id).unwrap();
    storage
        .update_descriptor_state(&profile.key(), PageState::Fetching, 3)
        .unwrap();
    storage
        .update_run_status(run_id, RunStatus::Interrupted)
        .unwrap();
    drop(storage);

    let (sink, outcome) = run_to_completion(config.clone(), false).await;

    assert!(outcome.is_completed());
    let summary = outcome.summary();
    assert_eq!(summary.fetch_attempts, 0);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].key, "player_profile/27523");
    assert_eq!(summary.failed[0].attempts, 3);
    assert!(sink.is_empty());

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let record = storage.get_descriptor("player_profile/27523").unwrap().unwrap();
    assert_eq!(record.state, PageState::Failed);
    assert_eq!(record.attempts, 3);
}
