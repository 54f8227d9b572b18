// ========================================================================================
//
//                        Core value types for RAD locus segmentation
//
// ========================================================================================

/// The literal token GATK writes when a genotype could not be called.
pub const MISSING_GENOTYPE: &str = "./.";

/// The literal token GATK writes when no depth is available for a site.
pub const MISSING_DEPTH: &str = "NA";

/// Read depth at a single site. `NA` in the table becomes `Depth(None)`, which is
/// distinct from a depth of zero and never satisfies a threshold. Negative values
/// are kept as written and fail every threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Depth(Option<i64>);

impl Depth {
    pub const MISSING: Depth = Depth(None);

    pub fn new(reads: i64) -> Self {
        Self(Some(reads))
    }

    pub fn get(self) -> Option<i64> {
        self.0
    }

    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }

    /// True only for a present depth at or above `min_depth`.
    #[inline]
    pub fn meets(self, min_depth: u32) -> bool {
        matches!(self.0, Some(reads) if reads >= i64::from(min_depth))
    }
}

/// A genotype call. Only the missing marker matters to segmentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Genotype {
    Missing,
    Called,
}

impl Genotype {
    pub fn is_missing(self) -> bool {
        matches!(self, Genotype::Missing)
    }
}

/// One sample's genotype/depth column pair in an across-sample table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleCall {
    pub genotype: Genotype,
    pub depth: Depth,
}

impl SampleCall {
    /// A sample supports a site when its genotype was called and its depth reaches
    /// the threshold.
    #[inline]
    pub fn supports(&self, min_depth: u32) -> bool {
        !self.genotype.is_missing() && self.depth.meets(min_depth)
    }
}

/// The per-site payload that differs between the two table layouts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowData {
    WithinSample { depth: Depth },
    AcrossSample { samples: Vec<SampleCall> },
}

/// A single parsed data line of a variant table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub chromosome: String,
    pub position: u64,
    pub data: RowData,
}

impl Row {
    pub fn within(chromosome: &str, position: u64, depth: Depth) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            position,
            data: RowData::WithinSample { depth },
        }
    }

    pub fn across(chromosome: &str, position: u64, samples: Vec<SampleCall>) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            position,
            data: RowData::AcrossSample { samples },
        }
    }

    /// Depth of a within-sample row. Across-sample rows have no single depth.
    pub fn depth(&self) -> Depth {
        match &self.data {
            RowData::WithinSample { depth } => *depth,
            RowData::AcrossSample { .. } => Depth::MISSING,
        }
    }

    pub fn samples(&self) -> &[SampleCall] {
        match &self.data {
            RowData::WithinSample { .. } => &[],
            RowData::AcrossSample { samples } => samples.as_slice(),
        }
    }

    /// Number of samples whose call at this site is usable at `min_depth`.
    pub fn supporting_samples(&self, min_depth: u32) -> u32 {
        self.samples()
            .iter()
            .filter(|call| call.supports(min_depth))
            .count() as u32
    }
}

/// The locus currently being accumulated by the segmenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveLocus {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    /// Running maximum of the mode statistic (site depth or supporting samples).
    pub statistic: u32,
    pub snp_count: u32,
}

impl ActiveLocus {
    pub fn length(&self) -> u64 {
        self.end - self.start
    }
}

/// A finalized locus that passed its mode's filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocusRecord {
    pub id: u64,
    pub chromosome: String,
    pub statistic: u32,
    pub snp_count: u32,
    pub length: u64,
    pub start: u64,
    pub end: u64,
}

/// Per-sample count of emitted loci, kept in header column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleTally {
    entries: Vec<(String, u64)>,
}

impl SampleTally {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            entries: names.into_iter().map(|name| (name, 0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn increment(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.1 += 1;
        }
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(sample, _)| sample == name)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
    }
}
