use chrono::{DateTime, Utc};
use url::Url;

use super::common::{PageCommon, Query};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Query for the account history endpoint, bounded by a time window.
#[derive(Default, Clone, Debug)]
pub struct HistoryQuery {
    pub common: PageCommon,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Query for HistoryQuery {
    fn get_common(&mut self) -> &mut PageCommon {
        &mut self.common
    }

    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        if let Some(start) = self.start {
            url.query_pairs_mut()
                .append_pair("start", &start.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(end) = self.end {
            url.query_pairs_mut()
                .append_pair("end", &end.format(TIMESTAMP_FORMAT).to_string());
        }
        self.common.add_to_url(&url)
    }
}

impl HistoryQuery {
    /// Window covering `start..=end`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}
