//! 크리에이터 등록/활성화 관리.

use alphanote_core::{url_token_from_link, Creator};
use alphanote_data::Store;
use alphanote_zhihu::types::profile_url;
use tracing::info;

use crate::error::CollectorError;
use crate::Result;

/// 프로필 링크로 크리에이터를 등록합니다.
///
/// 실제 `user_id`는 첫 수집 때 채워지며, 그전까지 `url_token`을 임시 id로
/// 씁니다. 이미 등록된 `url_token`이면 `AlreadyExists`.
pub async fn add_creator(store: &dyn Store, link: &str) -> Result<Creator> {
    let url_token = url_token_from_link(link)
        .ok_or_else(|| CollectorError::InvalidInput(format!("프로필 링크가 아닙니다: {}", link)))?;

    let creator = Creator::placeholder(url_token.clone(), profile_url(&url_token));
    store.register_creator(&creator).await?;

    info!(url_token = %url_token, "Creator registered");
    Ok(creator)
}

pub async fn set_creator_active(store: &dyn Store, url_token: &str, active: bool) -> Result<()> {
    store.set_creator_active(url_token, active).await?;
    info!(url_token, active, "Creator activation changed");
    Ok(())
}

pub async fn list_creators(store: &dyn Store, active_only: bool) -> Result<Vec<Creator>> {
    Ok(store.list_creators(active_only).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphanote_data::{CreatorStore, DataError, MemoryStore};

    #[tokio::test]
    async fn test_add_creator_from_link() {
        let store = MemoryStore::new();
        let creator = add_creator(&store, "https://www.zhihu.com/people/foo-bar/")
            .await
            .unwrap();

        assert_eq!(creator.url_token, "foo-bar");
        assert!(creator.is_placeholder());
        assert!(creator.is_active);
        assert_eq!(creator.profile_url, "https://www.zhihu.com/people/foo-bar");

        let stored = store.get_creator("foo-bar").await.unwrap().unwrap();
        assert_eq!(stored.user_id, "foo-bar");
    }

    #[tokio::test]
    async fn test_add_duplicate_rejected() {
        let store = MemoryStore::new();
        add_creator(&store, "foo").await.unwrap();

        let result = add_creator(&store, "https://www.zhihu.com/people/foo").await;
        assert!(matches!(
            result,
            Err(CollectorError::Data(DataError::AlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn test_toggle_and_list() {
        let store = MemoryStore::new();
        add_creator(&store, "foo").await.unwrap();
        add_creator(&store, "bar").await.unwrap();

        set_creator_active(&store, "foo", false).await.unwrap();

        let active = list_creators(&store, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].url_token, "bar");
        assert_eq!(list_creators(&store, false).await.unwrap().len(), 2);

        assert!(set_creator_active(&store, "missing", true).await.is_err());
    }
}
