use std::time::Instant;

use stitch::contexts::{FileOutcome, FileStatus};

pub struct ProgressIndicator {
    total: usize,
    written: usize,
    unchanged: usize,
    rejected: usize,
    failed: usize,
    verbose: bool,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize, verbose: bool) -> Self {
        Self {
            total,
            written: 0,
            unchanged: 0,
            rejected: 0,
            failed: 0,
            verbose,
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        let shown = outcome
            .target
            .as_ref()
            .map(|t| t.display().to_string())
            .unwrap_or_else(|| outcome.path.clone());

        match &outcome.status {
            FileStatus::Written => {
                self.written += 1;
                println!("Created file: {}", shown);
            }
            FileStatus::WouldWrite => {
                self.written += 1;
                println!("Would create file: {}", shown);
            }
            FileStatus::Unchanged => {
                self.unchanged += 1;
                if self.verbose {
                    println!("⊚ Unchanged: {}", shown);
                }
            }
            FileStatus::Rejected(e) => {
                self.rejected += 1;
                eprintln!("✗ Rejected {}: {}", outcome.path, e);
            }
            FileStatus::Failed(reason) => {
                self.failed += 1;
                eprintln!("✗ Failed {}: {}", outcome.path, reason);
            }
        }
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Total:     {}", self.total);
        println!("  Written:   {}", self.written);
        println!("  Unchanged: {}", self.unchanged);
        println!("  Rejected:  {}", self.rejected);
        println!("  Failed:    {}", self.failed);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}
