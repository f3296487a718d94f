mod common;
pub use self::common::{PageCommon, Query};

mod history;
pub use self::history::HistoryQuery;
