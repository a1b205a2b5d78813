//! Run statistics and console summary

use crate::checkpoint::Statistics;

/// Aggregated counters for one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Bookmarks in the tree, including ones handled on earlier runs
    pub total_bookmarks: u64,
    /// Successful outcomes recorded across all runs
    pub processed: u64,
    /// Terminal failures recorded across all runs
    pub failed: u64,
    /// Items skipped because a prior run already handled them
    pub skipped: u64,
    /// Whether the run stopped early on a shutdown signal
    pub interrupted: bool,
    /// Wall-clock duration of this run in seconds
    pub duration_secs: u64,
}

impl RunSummary {
    pub fn from_statistics(stats: &Statistics, interrupted: bool, duration_secs: u64) -> Self {
        Self {
            total_bookmarks: stats.total_bookmarks,
            processed: stats.processed_count,
            failed: stats.failed_count,
            skipped: stats.skipped_count,
            interrupted,
            duration_secs,
        }
    }

    /// Percentage of attempted items that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempted = self.processed + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        (self.processed as f64 / attempted as f64) * 100.0
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Export Summary ===");
    println!("Total bookmarks:  {}", summary.total_bookmarks);
    println!("Processed:        {}", summary.processed);
    println!("Failed:           {}", summary.failed);
    println!("Skipped:          {}", summary.skipped);
    println!("Success rate:     {:.1}%", summary.success_rate());
    println!(
        "Duration:         {}m {}s",
        summary.duration_secs / 60,
        summary.duration_secs % 60
    );
    if summary.interrupted {
        println!("Run was interrupted; re-run with --resume to continue.");
    }
}
