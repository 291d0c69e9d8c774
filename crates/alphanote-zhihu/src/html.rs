//! HTML 처리: 본문 텍스트 추출, 프로필 페이지의 초기 데이터 파싱.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::{Result, ZhihuError};

/// HTML 조각에서 태그를 제거하고 엔티티를 해석한 텍스트를 반환합니다.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.replace('\u{a0}', " ").trim().to_string()
}

/// 프로필 페이지의 `script#js-initialData`에서 사용자 엔티티를 꺼냅니다.
///
/// 스크립트나 해당 사용자가 없으면 `None`.
pub fn initial_user_entity(html: &str, url_token: &str) -> Result<Option<Value>> {
    let selector = Selector::parse("script#js-initialData")
        .map_err(|e| ZhihuError::Parse(format!("selector: {:?}", e)))?;

    let document = Html::parse_document(html);
    let Some(script) = document.select(&selector).next() else {
        return Ok(None);
    };

    let raw: String = script.text().collect();
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let data: Value = serde_json::from_str(&raw)?;
    Ok(data
        .pointer("/initialState/entities/users")
        .and_then(|users| users.get(url_token))
        .cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_tags_and_entities() {
        let html = "<p>贵州茅台 &amp; 五粮液</p><p>a&nbsp;b &lt;c&gt; &quot;d&quot;</p>";
        assert_eq!(html_to_text(html), "贵州茅台 & 五粮液a b <c> \"d\"");
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("  plain  "), "plain");
    }

    #[test]
    fn test_initial_user_entity() {
        let html = r#"<html><body>
            <script id="js-initialData" type="text/json">
            {"initialState":{"entities":{"users":{"foo":{"id":"abc123","urlToken":"foo","name":"Foo"}}}}}
            </script></body></html>"#;

        let user = initial_user_entity(html, "foo").unwrap().unwrap();
        assert_eq!(user["id"], "abc123");
        assert!(initial_user_entity(html, "bar").unwrap().is_none());
        assert!(initial_user_entity("<html></html>", "foo").unwrap().is_none());
    }

    #[test]
    fn test_initial_user_entity_invalid_json() {
        let html = r#"<script id="js-initialData">{not json</script>"#;
        assert!(matches!(
            initial_user_entity(html, "foo"),
            Err(ZhihuError::Parse(_))
        ));
    }
}
