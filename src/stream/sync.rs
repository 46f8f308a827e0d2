//! End-time-ordered merging of parallel streams.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::DataPointStream;
use crate::data::DataPoint;
use crate::error::FeedError;

struct MergeEntry {
    stream: Box<dyn DataPointStream>,
    head: Option<DataPoint>,
    exhausted: bool,
}

impl MergeEntry {
    fn new(stream: Box<dyn DataPointStream>) -> Self {
        Self {
            stream,
            head: None,
            exhausted: false,
        }
    }
}

/// Merges N streams ordered by UTC end time. Ties are stable: the earliest
/// entry wins, so placing auxiliary streams before the main stream makes
/// corporate actions take effect on the bar where they apply.
pub struct SynchronizedMerge {
    entries: Vec<MergeEntry>,
    data_time_zone: Tz,
    current: Option<DataPoint>,
}

impl SynchronizedMerge {
    /// Merge a main stream with auxiliary streams; auxiliaries win end-time
    /// ties against the main stream.
    pub fn with_auxiliary(
        main: Box<dyn DataPointStream>,
        auxiliary: Vec<Box<dyn DataPointStream>>,
        data_time_zone: Tz,
    ) -> Self {
        let mut entries: Vec<MergeEntry> = auxiliary.into_iter().map(MergeEntry::new).collect();
        entries.push(MergeEntry::new(main));
        Self {
            entries,
            data_time_zone,
            current: None,
        }
    }

    /// Merge peer streams (chain constituents); ties break by entry order.
    pub fn balanced(streams: Vec<Box<dyn DataPointStream>>, data_time_zone: Tz) -> Self {
        Self {
            entries: streams.into_iter().map(MergeEntry::new).collect(),
            data_time_zone,
            current: None,
        }
    }
}

impl DataPointStream for SynchronizedMerge {
    fn move_next(&mut self) -> bool {
        self.current = None;

        let mut any_alive = false;
        for entry in &mut self.entries {
            if entry.head.is_none() && !entry.exhausted {
                if entry.stream.move_next() {
                    entry.head = entry.stream.current().cloned();
                } else {
                    entry.exhausted = true;
                }
            }
            if !entry.exhausted {
                any_alive = true;
            }
        }

        let mut best: Option<(usize, DateTime<Utc>)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(head) = &entry.head {
                let end = head.end_time_utc(self.data_time_zone);
                match best {
                    Some((_, best_end)) if end >= best_end => {}
                    _ => best = Some((index, end)),
                }
            }
        }

        if let Some((index, _)) = best {
            self.current = self.entries[index].head.take();
            return true;
        }

        any_alive
    }

    fn current(&self) -> Option<&DataPoint> {
        self.current.as_ref()
    }

    fn take_error(&mut self) -> Option<FeedError> {
        self.entries
            .iter_mut()
            .find_map(|entry| entry.stream.take_error())
    }
}
