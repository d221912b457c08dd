//! Console progress for pipeline runs.

use crate::pipeline::{RunSummary, TickerOutcome};
use std::io::{self, Write};

/// Callbacks invoked by the pipeline as tickers complete.
pub trait RunProgress {
    fn ticker_started(&mut self, _symbol: &str, _index: usize, _total: usize) {}

    fn ticker_finished(&mut self, outcome: &TickerOutcome);

    fn run_finished(&mut self, _summary: &RunSummary) {}
}

/// Discards all progress.
pub struct NoProgress;

impl RunProgress for NoProgress {
    fn ticker_finished(&mut self, _outcome: &TickerOutcome) {}
}

/// One line per ticker plus a closing summary.
///
/// ```text
/// [OK] Loaded AAPL (100 rows)
/// [ERROR] MSFT: request failed after 3 attempts: rate limited by provider: ...
/// ```
pub struct StdoutProgress<W: Write = io::Stdout> {
    out: W,
}

impl StdoutProgress<io::Stdout> {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutProgress<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutProgress<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RunProgress for StdoutProgress<W> {
    fn ticker_finished(&mut self, outcome: &TickerOutcome) {
        // Progress output is best effort; a closed stdout must not fail the run.
        let _ = match &outcome.error {
            None => writeln!(
                self.out,
                "[OK] Loaded {} ({} rows)",
                outcome.symbol, outcome.rows_fetched
            ),
            Some(reason) => writeln!(self.out, "[ERROR] {}: {}", outcome.symbol, reason),
        };
    }

    fn run_finished(&mut self, summary: &RunSummary) {
        let _ = writeln!(
            self.out,
            "Done: {} succeeded, {} failed, {} new rows in {:.1}s",
            summary.succeeded(),
            summary.failed(),
            summary.rows_inserted(),
            summary.elapsed_secs
        );
        let _ = self.out.flush();
    }
}
