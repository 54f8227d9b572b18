// ========================================================================================
//
//                      The locus boundary state machine
//
// ========================================================================================
//
// Sites arrive in table order. The first site opens a locus. Every later qualifying
// site either joins the open locus, when it lies between the locus start and
// `mean_locus_length + 80` basepairs past it, or closes the open locus and opens a
// new one at its own position. A position that moves backwards (next chromosome, or
// unsorted input) always closes the locus. A closed locus becomes a record only if
// the mode's policy keeps it. The locus still open at the end of the table is
// dropped unless `flush_final` is set.

use crate::config::SegmentConfig;
use crate::types::{ActiveLocus, LocusRecord, Row, SampleTally};
use log::{debug, warn};

/// The mode-specific half of segmentation.
pub trait LocusPolicy {
    /// Whether a site takes part in segmentation at all. Non-qualifying sites only
    /// matter when they are the very first row of the table.
    fn qualifies(&self, row: &Row) -> bool;

    /// The per-site value folded into the locus statistic by running maximum.
    fn statistic(&self, row: &Row) -> u32;

    /// Finalize filter applied when a locus closes.
    fn keep(&self, locus: &ActiveLocus) -> bool;

    /// Called after a locus closed by `trigger` has been emitted.
    fn on_emit(&mut self, trigger: &Row) {
        let _ = trigger;
    }
}

/// Single-individual tables: the statistic is the maximum site depth.
///
/// Loci shorter than the mean length come from merged read pairs, whose depth is
/// roughly twice that of unmerged pairs, so they must reach `1.9 * min_depth`.
/// Loci longer than the mean length pass on length alone.
#[derive(Clone, Debug)]
pub struct WithinSamplePolicy {
    min_depth: u32,
    mean_locus_length: u64,
}

impl WithinSamplePolicy {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            min_depth: config.min_depth,
            mean_locus_length: config.mean_locus_length,
        }
    }
}

impl LocusPolicy for WithinSamplePolicy {
    fn qualifies(&self, row: &Row) -> bool {
        row.depth().meets(self.min_depth)
    }

    fn statistic(&self, row: &Row) -> u32 {
        row.depth()
            .get()
            .map_or(0, |reads| reads.clamp(0, i64::from(u32::MAX)) as u32)
    }

    fn keep(&self, locus: &ActiveLocus) -> bool {
        // depth >= 1.9 * min_depth, kept in integers
        u64::from(locus.statistic) * 10 >= u64::from(self.min_depth) * 19
            || locus.length() > self.mean_locus_length
    }
}

/// Multi-sample tables: the statistic is the maximum number of supporting samples
/// at any site, and every emitted locus credits the samples supporting the site
/// that closed it.
#[derive(Clone, Debug)]
pub struct AcrossSamplePolicy {
    min_depth: u32,
    min_samples: u32,
    tally: SampleTally,
}

impl AcrossSamplePolicy {
    pub fn new(config: &SegmentConfig, sample_names: &[String]) -> Self {
        Self {
            min_depth: config.min_depth,
            min_samples: config.min_samples,
            tally: SampleTally::new(sample_names.iter().cloned()),
        }
    }

    pub fn tally(&self) -> &SampleTally {
        &self.tally
    }

    pub fn into_tally(self) -> SampleTally {
        self.tally
    }
}

impl LocusPolicy for AcrossSamplePolicy {
    fn qualifies(&self, row: &Row) -> bool {
        self.statistic(row) >= self.min_samples
    }

    fn statistic(&self, row: &Row) -> u32 {
        row.supporting_samples(self.min_depth)
    }

    fn keep(&self, locus: &ActiveLocus) -> bool {
        locus.statistic >= self.min_samples
    }

    fn on_emit(&mut self, trigger: &Row) {
        for (index, call) in trigger.samples().iter().enumerate() {
            if call.supports(self.min_depth) {
                self.tally.increment(index);
            }
        }
    }
}

/// Counters describing one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub rows: u64,
    pub qualifying_rows: u64,
    pub emitted: u64,
    pub discarded: u64,
    /// True when a locus was still open at the end and was not flushed.
    pub dropped_final: bool,
}

/// Output of a finished scan.
#[derive(Debug)]
pub struct Segmentation<P> {
    pub records: Vec<LocusRecord>,
    pub policy: P,
    pub summary: ScanSummary,
}

/// Streaming segmenter. Owns every piece of running state for one table.
#[derive(Debug)]
pub struct Segmenter<P> {
    policy: P,
    merge_window: u64,
    flush_final: bool,
    active: Option<ActiveLocus>,
    next_id: u64,
    records: Vec<LocusRecord>,
    summary: ScanSummary,
}

impl<P: LocusPolicy> Segmenter<P> {
    pub fn new(policy: P, config: &SegmentConfig) -> Self {
        Self {
            policy,
            merge_window: config.merge_window(),
            flush_final: config.flush_final,
            active: None,
            next_id: 1,
            records: Vec::new(),
            summary: ScanSummary::default(),
        }
    }

    pub fn active(&self) -> Option<&ActiveLocus> {
        self.active.as_ref()
    }

    pub fn records(&self) -> &[LocusRecord] {
        &self.records
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Feeds one row, in table order.
    pub fn push(&mut self, row: &Row) {
        self.summary.rows += 1;
        let qualifies = self.policy.qualifies(row);
        if qualifies {
            self.summary.qualifying_rows += 1;
        }

        let Some(active) = self.active.as_ref() else {
            self.active = Some(self.open(row, qualifies));
            return;
        };

        if !qualifies {
            return;
        }

        let joins = row.position >= active.start && row.position - active.start <= self.merge_window;
        if joins {
            if row.chromosome != active.chromosome {
                warn!(
                    "{}:{} joins a locus opened on {}:{}; positions did not decrease between chromosomes",
                    row.chromosome, row.position, active.chromosome, active.start
                );
            }
            self.extend(row);
        } else {
            if row.position < active.start && row.chromosome == active.chromosome {
                warn!(
                    "position {} on {} is below the open locus start {}; input is not sorted",
                    row.position, row.chromosome, active.start
                );
            }
            self.cross_boundary(row);
        }
    }

    /// Ends the scan. The open locus is finalized only when `flush_final` is set.
    pub fn finish(mut self) -> Segmentation<P> {
        if let Some(open) = self.active.take() {
            if self.flush_final {
                self.finalize(open);
            } else {
                debug!(
                    "dropping open locus {}:{}-{} at end of table",
                    open.chromosome, open.start, open.end
                );
                self.summary.dropped_final = true;
            }
        }

        Segmentation {
            records: self.records,
            policy: self.policy,
            summary: self.summary,
        }
    }

    fn open(&self, row: &Row, qualifies: bool) -> ActiveLocus {
        let (statistic, snp_count) = if qualifies {
            (self.policy.statistic(row), 1)
        } else {
            (0, 0)
        };
        ActiveLocus {
            chromosome: row.chromosome.clone(),
            start: row.position,
            end: row.position,
            statistic,
            snp_count,
        }
    }

    fn extend(&mut self, row: &Row) {
        let statistic = self.policy.statistic(row);
        if let Some(active) = self.active.as_mut() {
            if active.chromosome != row.chromosome {
                active.chromosome.clone_from(&row.chromosome);
            }
            active.end = row.position;
            active.statistic = active.statistic.max(statistic);
            active.snp_count += 1;
        }
    }

    fn cross_boundary(&mut self, row: &Row) {
        let fresh = self.open(row, true);
        if let Some(closed) = self.active.replace(fresh) {
            if self.finalize(closed) {
                self.policy.on_emit(row);
            }
        }
    }

    fn finalize(&mut self, closed: ActiveLocus) -> bool {
        if !self.policy.keep(&closed) {
            debug!(
                "discarding locus {}:{}-{} (statistic {})",
                closed.chromosome, closed.start, closed.end, closed.statistic
            );
            self.summary.discarded += 1;
            return false;
        }

        let record = LocusRecord {
            id: self.next_id,
            length: closed.length(),
            chromosome: closed.chromosome,
            statistic: closed.statistic,
            snp_count: closed.snp_count,
            start: closed.start,
            end: closed.end,
        };
        debug!(
            "locus {} {}:{}-{} statistic {} snps {}",
            record.id, record.chromosome, record.start, record.end, record.statistic, record.snp_count
        );
        self.next_id += 1;
        self.summary.emitted += 1;
        self.records.push(record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Depth, Genotype, SampleCall};

    fn within_rows(chromosome: &str, sites: &[(u64, Option<i64>)]) -> Vec<Row> {
        sites
            .iter()
            .map(|&(position, depth)| {
                Row::within(chromosome, position, depth.map_or(Depth::MISSING, Depth::new))
            })
            .collect()
    }

    fn run_within(config: &SegmentConfig, rows: &[Row]) -> Segmentation<WithinSamplePolicy> {
        let mut segmenter = Segmenter::new(WithinSamplePolicy::new(config), config);
        for row in rows {
            segmenter.push(row);
        }
        segmenter.finish()
    }

    fn call(genotype: &str, depth: i64) -> SampleCall {
        SampleCall {
            genotype: if genotype == "./." {
                Genotype::Missing
            } else {
                Genotype::Called
            },
            depth: Depth::new(depth),
        }
    }

    fn across_row(position: u64, calls: &[(&str, i64)]) -> Row {
        Row::across(
            "1",
            position,
            calls.iter().map(|&(gt, dp)| call(gt, dp)).collect(),
        )
    }

    #[test]
    fn shallow_sites_never_emit() {
        let config = SegmentConfig::default();
        let rows = within_rows(
            "1",
            &[(100, Some(5)), (2000, Some(3)), (5000, Some(1)), (9000, None), (20000, Some(5))],
        );
        let result = run_within(&config, &rows);
        assert!(result.records.is_empty());
        assert_eq!(result.summary.qualifying_rows, 0);
    }

    #[test]
    fn short_shallow_locus_is_discarded_at_boundary() {
        let config = SegmentConfig::default();
        let rows = within_rows(
            "1",
            &[(100, Some(10)), (105, Some(10)), (110, Some(10)), (500, Some(10))],
        );
        let result = run_within(&config, &rows);
        assert!(result.records.is_empty());
        assert_eq!(result.summary.discarded, 1);
        assert!(result.summary.dropped_final);
    }

    #[test]
    fn sites_inside_merge_window_share_a_locus() {
        let config = SegmentConfig::default();
        let mut segmenter = Segmenter::new(WithinSamplePolicy::new(&config), &config);
        for row in within_rows("1", &[(100, Some(8)), (380, Some(12))]) {
            segmenter.push(&row);
        }
        let active = segmenter.active().unwrap();
        assert_eq!((active.start, active.end), (100, 380));
        assert_eq!(active.statistic, 12);
        assert!(segmenter.records().is_empty());
    }

    #[test]
    fn merge_window_edge_is_inclusive() {
        let config = SegmentConfig::default();
        let rows = within_rows(
            "1",
            &[(1000, Some(20)), (1350, Some(20)), (1351, Some(20)), (1702, Some(20))],
        );
        let result = run_within(&config, &rows);
        let spans: Vec<_> = result.records.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(1000, 1350), (1351, 1351)]);
    }

    #[test]
    fn ids_are_gapless_across_discards_and_chromosomes() {
        let config = SegmentConfig::default();
        let mut rows = within_rows(
            "1",
            &[
                (100, Some(20)),
                (300, Some(20)),
                (700, Some(20)),
                (1000, Some(20)),
                (2000, Some(7)),
                (2100, Some(7)),
                (3000, Some(20)),
            ],
        );
        rows.extend(within_rows("2", &[(50, Some(30)), (5000, Some(30))]));
        let result = run_within(&config, &rows);

        let ids: Vec<_> = result.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let spans: Vec<_> = result
            .records
            .iter()
            .map(|r| (r.chromosome.as_str(), r.start, r.end, r.length))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("1", 100, 300, 200),
                ("1", 700, 1000, 300),
                ("1", 3000, 3000, 0),
                ("2", 50, 50, 0),
            ]
        );
        assert_eq!(result.summary.discarded, 1);
    }

    #[test]
    fn joined_locus_takes_the_label_of_its_last_site() {
        let config = SegmentConfig::default();
        let mut rows = within_rows("chr1", &[(900, Some(20))]);
        rows.extend(within_rows("chr2", &[(1100, Some(20)), (5000, Some(20))]));
        let result = run_within(&config, &rows);

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.chromosome, "chr2");
        assert_eq!((record.start, record.end, record.length), (900, 1100, 200));
    }

    #[test]
    fn long_locus_passes_on_length_alone() {
        let config = SegmentConfig::default();
        let rows = within_rows("1", &[(100, Some(6)), (371, Some(6)), (1000, Some(6))]);
        let result = run_within(&config, &rows);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].length, 271);
        assert_eq!(result.records[0].statistic, 6);
    }

    #[test]
    fn depth_threshold_is_exact_at_nineteen_tenths() {
        let config = SegmentConfig {
            min_depth: 10,
            ..SegmentConfig::default()
        };
        let rows = within_rows("1", &[(100, Some(19)), (1000, Some(18)), (2000, Some(10))]);
        let result = run_within(&config, &rows);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].statistic, 19);
    }

    #[test]
    fn unqualified_first_row_only_seeds_position() {
        let config = SegmentConfig::default();
        let rows = within_rows("1", &[(100, None), (120, Some(30)), (900, Some(30))]);
        let result = run_within(&config, &rows);
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!((record.start, record.end, record.statistic), (100, 120, 30));
        assert_eq!(record.snp_count, 1);
    }

    #[test]
    fn unqualified_rows_do_not_extend_the_locus() {
        let config = SegmentConfig::default();
        let rows = within_rows(
            "1",
            &[(100, Some(30)), (200, Some(2)), (250, None), (1000, Some(30))],
        );
        let result = run_within(&config, &rows);
        assert_eq!(result.records[0].end, 100);
    }

    #[test]
    fn flush_final_emits_the_open_locus() {
        let config = SegmentConfig {
            flush_final: true,
            ..SegmentConfig::default()
        };
        let rows = within_rows("1", &[(100, Some(30)), (1000, Some(30)), (1010, Some(40))]);
        let result = run_within(&config, &rows);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[1].id, 2);
        assert_eq!(result.records[1].statistic, 40);
        assert!(!result.summary.dropped_final);
    }

    #[test]
    fn tally_credits_only_supporting_samples_on_trigger_row() {
        let config = SegmentConfig {
            min_samples: 1,
            ..SegmentConfig::default()
        };
        let names = vec!["A".to_string(), "B".to_string()];
        let mut segmenter = Segmenter::new(AcrossSamplePolicy::new(&config, &names), &config);
        for position in [100, 150, 600, 900, 1300] {
            segmenter.push(&across_row(position, &[("0/1", 12), ("./.", 40)]));
        }
        let result = segmenter.finish();

        assert_eq!(result.records.len(), 2);
        assert!(result.records.iter().all(|r| r.statistic == 1));
        assert_eq!(
            result.records.iter().map(|r| r.snp_count).collect::<Vec<_>>(),
            vec![2, 2]
        );
        let tally = result.policy.into_tally();
        assert_eq!(tally.count("A"), Some(2));
        assert_eq!(tally.count("B"), Some(0));
    }

    #[test]
    fn tally_reads_the_trigger_row_not_the_locus() {
        let config = SegmentConfig {
            min_samples: 1,
            ..SegmentConfig::default()
        };
        let names = vec!["A".to_string(), "B".to_string()];
        let mut segmenter = Segmenter::new(AcrossSamplePolicy::new(&config, &names), &config);
        segmenter.push(&across_row(100, &[("0/1", 10), ("0/1", 10)]));
        segmenter.push(&across_row(120, &[("0/1", 10), ("0/1", 10)]));
        segmenter.push(&across_row(800, &[("0/1", 10), ("1/1", 2)]));
        assert_eq!(segmenter.records().len(), 1);
        assert_eq!(segmenter.records()[0].statistic, 2);
        assert_eq!(segmenter.policy().tally().count("A"), Some(1));
        assert_eq!(segmenter.policy().tally().count("B"), Some(0));
    }

    #[test]
    fn across_rows_below_min_samples_are_skipped() {
        let config = SegmentConfig {
            min_samples: 2,
            ..SegmentConfig::default()
        };
        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let mut segmenter = Segmenter::new(AcrossSamplePolicy::new(&config, &names), &config);
        segmenter.push(&across_row(100, &[("0/1", 9), ("0/1", 9), ("./.", 9)]));
        segmenter.push(&across_row(200, &[("0/1", 9), ("./.", 9), ("./.", 9)]));
        segmenter.push(&across_row(250, &[("0/1", 9), ("0/1", 9), ("0/1", 9)]));
        segmenter.push(&across_row(5000, &[("0/1", 9), ("0/1", 9), ("0/1", 1)]));
        let result = segmenter.finish();

        assert_eq!(result.summary.qualifying_rows, 3);
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!((record.start, record.end), (100, 250));
        assert_eq!(record.statistic, 3);
        assert_eq!(record.snp_count, 2);
        let tally = result.policy.into_tally();
        assert_eq!(
            tally.iter().collect::<Vec<_>>(),
            vec![("A", 1), ("B", 1), ("C", 0)]
        );
    }
}
