//! 도메인 모델.

pub mod association;
pub mod content;
pub mod creator;
pub mod instrument;
pub mod job;

pub use association::*;
pub use content::*;
pub use creator::*;
pub use instrument::*;
pub use job::*;
