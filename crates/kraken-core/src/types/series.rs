use serde::{Deserialize, Serialize};

use crate::types::{Crawl, Stage, TargetFilter};

/// Template for repeated crawls with a fixed stage pipeline and filter (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub stages: Vec<Stage>,
    pub filter: TargetFilter,
    /// Ids of the Crawls run under this Series.
    #[serde(default)]
    pub crawls: Vec<String>,
    /// Number of Crawls started under this Series; the next Crawl's iteration number.
    #[serde(default)]
    pub iterations: u64,
}

impl Series {
    /// Creates a new Series with no crawls run yet.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stages: Vec<Stage>,
        filter: TargetFilter,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            stages,
            filter,
            crawls: Vec::new(),
            iterations: 0,
        }
    }

    /// Builds the next [`Crawl`] for this series, incrementing `iterations`
    /// and appending the new crawl's id, mirroring the original's `new_crawl`.
    pub fn new_crawl(&mut self, crawl_id: impl Into<String>) -> Crawl {
        self.iterations += 1;
        let crawl_id = crawl_id.into();
        self.crawls.push(crawl_id.clone());
        Crawl::new(
            crawl_id,
            self.id.clone(),
            &self.name,
            self.iterations,
            self.stages.clone(),
            self.filter.clone(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_crawl_increments_iterations_and_derives_name() {
        let mut series = Series::new("s1", "nightly", Vec::new(), TargetFilter::All);

        let first = series.new_crawl("c1");
        assert_eq!(first.name, "nightly_1");
        assert_eq!(series.iterations, 1);

        let second = series.new_crawl("c2");
        assert_eq!(second.name, "nightly_2");
        assert_eq!(series.iterations, 2);
        assert_eq!(series.crawls, vec!["c1", "c2"]);
    }
}
