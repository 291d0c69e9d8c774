//! 수집 작업 모듈.

pub mod crawl;
pub mod creators;
pub mod market;
pub mod tag;

pub use crawl::{
    build_client, crawl_zhihu, decide, resolve_cookies, CrawlOptions, CrawlReport, CreatorReport,
    CreatorSelection, ItemDecision, TimeWindow,
};
pub use creators::{add_creator, list_creators, set_creator_active};
pub use market::{update_market, update_market_with};
pub use tag::{tag_articles, tag_manual};
