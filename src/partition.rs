//! Per-batch date bucketing.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::fetch::CoordRow;

/// Group a batch's rows by the calendar date of their timestamp.
///
/// Pure function over one batch: every invocation starts from an empty map,
/// there is no cross-batch merging. Intra-date row order is the batch order,
/// so the buckets' union reconstructs the input exactly.
pub fn partition(batch: Vec<CoordRow>) -> BTreeMap<NaiveDate, Vec<CoordRow>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<CoordRow>> = BTreeMap::new();

    for row in batch {
        buckets.entry(row.date()).or_default().push(row);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn row(id: u64, ts: &str) -> CoordRow {
        let timestamp = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap();
        CoordRow {
            id,
            timestamp,
            fields: vec![id.to_string(), ts.to_string()],
        }
    }

    #[test]
    fn empty_batch_yields_empty_bucket() {
        assert!(partition(Vec::new()).is_empty());
    }

    #[test]
    fn rows_group_by_calendar_date() {
        let batch = vec![
            row(1, "2013-10-03 08:00:00"),
            row(2, "2013-10-03 23:59:59"),
            row(3, "2013-10-04 00:00:00"),
        ];
        let buckets = partition(batch);

        assert_eq!(buckets.len(), 2);
        let d3 = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();
        let d4 = NaiveDate::from_ymd_opt(2013, 10, 4).unwrap();
        assert_eq!(buckets[&d3].len(), 2);
        assert_eq!(buckets[&d4].len(), 1);
    }

    #[test]
    fn buckets_are_disjoint_and_reconstruct_the_batch() {
        // Dates interleave; time-of-day is dropped, order within a date kept.
        let batch = vec![
            row(10, "2013-10-03 01:00:00"),
            row(11, "2013-10-04 02:00:00"),
            row(12, "2013-10-03 03:00:00"),
            row(13, "2013-10-05 04:00:00"),
            row(14, "2013-10-04 05:00:00"),
        ];
        let buckets = partition(batch.clone());

        let mut rebuilt: Vec<CoordRow> = buckets.into_values().flatten().collect();
        rebuilt.sort_by_key(|r| r.id);
        assert_eq!(rebuilt, batch);
    }

    #[test]
    fn intra_date_order_is_batch_order() {
        let batch = vec![
            row(5, "2013-10-03 22:00:00"),
            row(6, "2013-10-03 01:00:00"),
            row(7, "2013-10-03 13:00:00"),
        ];
        let buckets = partition(batch);
        let d3 = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();
        let ids: Vec<u64> = buckets[&d3].iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }
}
