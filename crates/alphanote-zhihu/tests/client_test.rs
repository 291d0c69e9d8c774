//! ZhihuClient 통합 테스트 (mockito 목 서버).

use std::sync::{Arc, Mutex};

use alphanote_core::{ContentKind, Gender};
use alphanote_zhihu::{
    GovernorConfig, GovernorState, HeaderSet, Signer, ZhihuClient, ZhihuConfig, ZhihuError,
};
use async_trait::async_trait;
use mockito::{Matcher, Server};
use secrecy::SecretString;
use serde_json::json;

#[derive(Default)]
struct RecordingSigner {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Signer for RecordingSigner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn sign(&self, path_with_query: &str, _cookies: &str) -> HeaderSet {
        self.seen.lock().unwrap().push(path_with_query.to_string());
        HeaderSet::from([
            ("x-zst-81".to_string(), "zst".to_string()),
            ("x-zse-96".to_string(), "2.0_test".to_string()),
        ])
    }
}

fn test_config(base_url: String) -> ZhihuConfig {
    ZhihuConfig {
        base_url,
        governor: GovernorConfig::new(3, 0),
        ..Default::default()
    }
}

fn answers_body() -> String {
    json!({
        "paging": {"is_end": false, "totals": 40},
        "data": [
            {
                "id": 2002,
                "question": {"id": 11, "title": "贵州茅台还能买吗"},
                "content": "<p>长期看好</p>",
                "created_time": 1704153600,
                "updated_time": 1704153600,
                "voteup_count": 5,
                "comment_count": 1,
                "author": {"id": "uid-1", "name": "Foo", "avatar_url": "https://pic/a.jpg"}
            },
            {
                "id": 2001,
                "question": {"id": 12, "title": "宁德时代"},
                "content": "<p>观望</p>",
                "created_time": 1704067200,
                "author": {"id": "uid-1", "name": "Foo"}
            }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_list_answers_page() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "20".into()),
            Matcher::UrlEncoded("sort_by".into(), "created".into()),
        ]))
        .match_header("x-api-version", "3.0.91")
        .match_header("x-requested-with", "fetch")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(answers_body())
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    let page = client.list_page(ContentKind::Answer, "foo", 0).await.unwrap();

    mock.assert_async().await;
    assert!(!page.is_end);
    assert_eq!(page.raw_count, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].content_id, "2002");
    assert_eq!(page.items[0].title, "贵州茅台还能买吗");
    assert_eq!(page.items[0].body, "长期看好");
    assert_eq!(
        page.items[0].url,
        "https://www.zhihu.com/question/11/answer/2002"
    );
    assert_eq!(page.items[1].created_time, 1_704_067_200);
}

#[tokio::test]
async fn test_signs_requests_when_cookie_present() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v4/members/foo/articles")
        .match_query(Matcher::UrlEncoded("offset".into(), "20".into()))
        .match_header("cookie", "z_c0=abc")
        .match_header("x-zse-96", "2.0_test")
        .match_header("x-zst-81", "zst")
        .with_status(200)
        .with_body(r#"{"data": [], "paging": {"is_end": true}}"#)
        .create_async()
        .await;

    let signer = Arc::new(RecordingSigner::default());
    let client = ZhihuClient::new(
        test_config(server.url()),
        Some(SecretString::from("z_c0=abc".to_string())),
        signer.clone(),
    )
    .unwrap();

    let page = client.list_page(ContentKind::Article, "foo", 20).await.unwrap();
    mock.assert_async().await;
    assert!(page.is_end);
    assert!(page.items.is_empty());

    let seen = signer.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("/api/v4/members/foo/articles?include="));
    assert!(seen[0].contains("offset=20"));
    assert!(!seen[0].contains("http"));
}

#[tokio::test]
async fn test_unsigned_without_cookie() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::Any)
        .match_header("cookie", Matcher::Missing)
        .match_header("x-zse-96", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let signer = Arc::new(RecordingSigner::default());
    let client = ZhihuClient::new(test_config(server.url()), None, signer.clone()).unwrap();

    let page = client.list_page(ContentKind::Answer, "foo", 0).await.unwrap();
    mock.assert_async().await;
    assert!(page.is_end);
    assert!(signer.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_consecutive_forbidden_trips_governor() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::Any)
        .with_status(403)
        .expect(3)
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();

    for _ in 0..2 {
        let err = client
            .list_page(ContentKind::Answer, "foo", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ZhihuError::Http { status: 403, .. }));
        assert!(!err.is_fatal());
    }

    let err = client
        .list_page(ContentKind::Answer, "foo", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ZhihuError::CircuitTripped { consecutive: 3 }));
    assert_eq!(client.governor().state(), GovernorState::Tripped);

    // 차단 후에는 서버에 요청하지 않는다
    let err = client
        .list_page(ContentKind::Article, "foo", 0)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_counter_resets_on_success() {
    let mut server = Server::new_async().await;
    let forbidden = server
        .mock("GET", "/api/v4/members/foo/answers")
        .match_query(Matcher::Any)
        .with_status(403)
        .expect(4)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/api/v4/members/foo/articles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    for _ in 0..2 {
        let _ = client.list_page(ContentKind::Answer, "foo", 0).await;
    }
    client.list_page(ContentKind::Article, "foo", 0).await.unwrap();
    for _ in 0..2 {
        let err = client
            .list_page(ContentKind::Answer, "foo", 0)
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    assert_eq!(client.governor().state(), GovernorState::Open);
    forbidden.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_get_creator_from_api() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v4/members/foo")
        .match_query(Matcher::UrlEncoded(
            "include".into(),
            "follower_count,following_count,answer_count,articles_count,voteup_count".into(),
        ))
        .with_status(200)
        .with_body(
            json!({
                "id": "real-id", "url_token": "foo", "name": "Foo", "gender": 1,
                "follower_count": 1200, "following_count": 3, "answer_count": 50,
                "articles_count": 8, "voteup_count": 9000
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    let creator = client.get_creator("foo").await.unwrap().unwrap();

    mock.assert_async().await;
    assert_eq!(creator.user_id, "real-id");
    assert_eq!(creator.url_token, "foo");
    assert_eq!(creator.gender, Gender::Male);
    assert_eq!(creator.follower_count, 1200);
    assert!(!creator.is_placeholder());
}

#[tokio::test]
async fn test_get_creator_falls_back_to_profile_page() {
    let mut server = Server::new_async().await;
    let api = server
        .mock("GET", "/api/v4/members/foo")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let html = r#"<!doctype html><html><body>
        <script id="js-initialData" type="text/json">{"initialState":{"entities":{"users":{"foo":{"id":"page-id","urlToken":"foo","name":"Foo","gender":0,"followerCount":77,"articlesCount":4}}}}}</script>
        </body></html>"#;
    let page = server
        .mock("GET", "/people/foo")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html)
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    let creator = client.get_creator("foo").await.unwrap().unwrap();

    api.assert_async().await;
    page.assert_async().await;
    assert_eq!(creator.user_id, "page-id");
    assert_eq!(creator.gender, Gender::Female);
    assert_eq!(creator.follower_count, 77);
    assert_eq!(creator.article_count, 4);
}

#[tokio::test]
async fn test_get_creator_not_found_anywhere() {
    let mut server = Server::new_async().await;
    let _api = server
        .mock("GET", "/api/v4/members/ghost")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let _page = server
        .mock("GET", "/people/ghost")
        .with_status(404)
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    assert!(client.get_creator("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_items_are_skipped() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v4/members/foo/articles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "paging": {"is_end": true},
                "data": [
                    {"title": "no id"},
                    {"id": 7, "title": "ok", "content": "<p>正文</p>", "created": 1700000000}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ZhihuClient::anonymous(test_config(server.url())).unwrap();
    let page = client.list_page(ContentKind::Article, "foo", 0).await.unwrap();

    assert_eq!(page.raw_count, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].content_id, "7");
    assert_eq!(page.items[0].body, "正文");
}
