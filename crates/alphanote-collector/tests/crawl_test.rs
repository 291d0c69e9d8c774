//! 수집 워크플로우 통합 테스트 (mockito 목 서버 + MemoryStore).

use alphanote_collector::modules::{crawl_zhihu, CrawlOptions, CreatorSelection, TimeWindow};
use alphanote_core::time::{self, DEFAULT_TIMEZONE};
use alphanote_core::{Content, ContentKind};
use alphanote_data::{ContentStore, CreatorStore, MemoryStore};
use alphanote_zhihu::{GovernorConfig, ZhihuClient, ZhihuConfig};
use chrono::NaiveDate;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

const JAN_01: i64 = 1_704_067_200;
const JAN_02: i64 = 1_704_153_600;
const JAN_03: i64 = 1_704_240_000;

fn client_for(server: &ServerGuard) -> ZhihuClient {
    ZhihuClient::anonymous(ZhihuConfig {
        base_url: server.url(),
        governor: GovernorConfig::new(3, 0),
        ..Default::default()
    })
    .unwrap()
}

fn answers(items: &[(i64, i64)], is_end: bool) -> String {
    let data: Vec<_> = items
        .iter()
        .map(|(id, created)| {
            json!({
                "id": id,
                "question": {"id": 1, "title": format!("问题 {}", id)},
                "content": "<p>正文</p>",
                "created_time": created,
                "updated_time": created,
                "author": {"id": "uid-1", "name": "Foo"}
            })
        })
        .collect();
    json!({"paging": {"is_end": is_end}, "data": data}).to_string()
}

async fn member(server: &mut ServerGuard, token: &str) -> Mock {
    server
        .mock("GET", format!("/api/v4/members/{}", token).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"id": "uid-1", "url_token": token, "name": "Foo"}).to_string())
        .create_async()
        .await
}

async fn answers_page(server: &mut ServerGuard, offset: u32, body: String, hits: usize) -> Mock {
    server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::UrlEncoded("offset".into(), offset.to_string()))
        .with_status(200)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

async fn no_articles(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api/v4/members/foo/articles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": [], "paging": {"is_end": true}}"#)
        .create_async()
        .await
}

fn stored(content_id: &str, created_time: i64) -> Content {
    Content {
        content_id: content_id.to_string(),
        kind: ContentKind::Answer,
        title: "旧内容".to_string(),
        body: "旧正文".to_string(),
        url: format!("https://www.zhihu.com/question/1/answer/{}", content_id),
        created_time,
        updated_time: created_time,
        voteup_count: 0,
        comment_count: 0,
        author_id: "uid-1".to_string(),
        author_name: "Foo".to_string(),
        author_avatar: None,
        is_tagged: false,
    }
}

fn only_foo() -> CrawlOptions {
    CrawlOptions {
        selection: CreatorSelection::Links(vec!["https://www.zhihu.com/people/foo/".to_string()]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_incremental_crawl_stops_at_watermark() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let first = answers_page(
        &mut server,
        0,
        answers(&[(2003, JAN_03), (2002, JAN_02), (2001, JAN_01)], false),
        1,
    )
    .await;
    let second = answers_page(&mut server, 20, answers(&[], true), 0).await;
    let _articles = no_articles(&mut server).await;

    let store = MemoryStore::new();
    store.upsert_content(&stored("2001", JAN_01)).await.unwrap();

    let client = client_for(&server);
    let report = crawl_zhihu(&client, &store, &only_foo()).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;

    let creator = &report.creators[0];
    assert_eq!(creator.existing, 1);
    assert_eq!(creator.watermark, Some(JAN_01));
    assert_eq!(creator.inserted, 2);
    assert_eq!(creator.skipped, 1);
    assert_eq!(report.summary.written, 2);

    // 기준점 이하 항목은 다시 쓰지 않는다
    let old = store.get_content("2001").await.unwrap().unwrap();
    assert_eq!(old.title, "旧内容");
    assert_eq!(store.all_contents().await.len(), 3);

    let saved = store.get_creator("foo").await.unwrap().unwrap();
    assert_eq!(saved.user_id, "uid-1");
    assert!(saved.last_crawled_at.is_some());
}

#[tokio::test]
async fn test_full_crawl_walks_every_page() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let first = answers_page(
        &mut server,
        0,
        answers(&[(2003, JAN_03), (2002, JAN_02)], false),
        1,
    )
    .await;
    let second = answers_page(&mut server, 20, answers(&[(2001, JAN_01)], true), 1).await;
    let _articles = no_articles(&mut server).await;

    let store = MemoryStore::new();
    store.upsert_content(&stored("2001", JAN_01)).await.unwrap();

    let options = CrawlOptions {
        full: true,
        ..only_foo()
    };
    let client = client_for(&server);
    let report = crawl_zhihu(&client, &store, &options).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;

    let creator = &report.creators[0];
    assert_eq!(creator.watermark, None);
    assert_eq!(creator.inserted, 2);
    assert_eq!(creator.updated, 1);
    assert_eq!(creator.pages, 3);

    let refreshed = store.get_content("2001").await.unwrap().unwrap();
    assert_eq!(refreshed.title, "问题 2001");
    assert_eq!(refreshed.created_time, JAN_01);
}

#[tokio::test]
async fn test_date_window_filters_items() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let _first = answers_page(
        &mut server,
        0,
        answers(&[(2003, JAN_03), (2002, JAN_02), (2001, JAN_01)], false),
        1,
    )
    .await;
    let second = answers_page(&mut server, 20, answers(&[], true), 0).await;
    let _articles = no_articles(&mut server).await;

    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let options = CrawlOptions {
        window: TimeWindow::from_dates(Some(day), Some(day), DEFAULT_TIMEZONE),
        ..only_foo()
    };
    assert_eq!(
        options.window.end_exclusive,
        Some(time::date_end_exclusive_timestamp(day, DEFAULT_TIMEZONE))
    );

    let store = MemoryStore::new();
    let client = client_for(&server);
    let report = crawl_zhihu(&client, &store, &options).await.unwrap();

    second.assert_async().await;
    let creator = &report.creators[0];
    assert_eq!(creator.inserted, 1);
    assert_eq!(creator.skipped, 2);

    let contents = store.all_contents().await;
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].content_id, "2002");
}

#[tokio::test]
async fn test_failed_page_is_retried_then_skipped() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let broken = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::UrlEncoded("offset".into(), "0".into()))
        .with_status(500)
        .expect(2)
        .create_async()
        .await;
    let _next = answers_page(&mut server, 20, answers(&[(2001, JAN_01)], true), 1).await;
    let _articles = no_articles(&mut server).await;

    let store = MemoryStore::new();
    let client = client_for(&server);
    let report = crawl_zhihu(&client, &store, &only_foo()).await.unwrap();

    broken.assert_async().await;
    let creator = &report.creators[0];
    assert_eq!(creator.failed_pages, 1);
    assert_eq!(creator.inserted, 1);
}

#[tokio::test]
async fn test_missing_page_is_not_retried() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let missing = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::UrlEncoded("offset".into(), "0".into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let _next = answers_page(&mut server, 20, answers(&[(2001, JAN_01)], true), 1).await;
    let _articles = no_articles(&mut server).await;

    let store = MemoryStore::new();
    let client = client_for(&server);
    let report = crawl_zhihu(&client, &store, &only_foo()).await.unwrap();

    missing.assert_async().await;
    let creator = &report.creators[0];
    assert_eq!(creator.existing, 0);
    assert_eq!(creator.failed_pages, 1);
    assert_eq!(creator.inserted, 1);
}

#[tokio::test]
async fn test_forbidden_streak_aborts_run() {
    let mut server = Server::new_async().await;
    let _member = member(&mut server, "foo").await;
    let forbidden = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::Any)
        .with_status(403)
        .expect(3)
        .create_async()
        .await;
    let untouched = server
        .mock("GET", "/api/v4/members/bar")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let options = CrawlOptions {
        selection: CreatorSelection::Links(vec!["foo".to_string(), "bar".to_string()]),
        max_page_failures: 5,
        ..Default::default()
    };
    let store = MemoryStore::new();
    let client = client_for(&server);
    let err = crawl_zhihu(&client, &store, &options).await.unwrap_err();

    assert!(err.is_fatal());
    forbidden.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
async fn test_no_creators_is_a_noop() {
    let server = Server::new_async().await;
    let store = MemoryStore::new();
    let client = client_for(&server);

    let report = crawl_zhihu(&client, &store, &CrawlOptions::default())
        .await
        .unwrap();
    assert_eq!(report.summary.total, 0);
    assert!(report.creators.is_empty());
}
