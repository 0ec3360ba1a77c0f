//! Report rendering. Pure string building; the caller decides where it goes
//! and maps [`ReconciliationReport::is_clean`] to a process exit status.

use std::fmt::Write as _;

use crate::ReconciliationReport;

/// Render the run outcome: one summary line, then one line per finding.
///
/// Output is byte-stable for a given report; findings arrive pre-sorted by
/// key from the engine.
pub fn render(report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "positions_checked={} mismatches={} failed_checks={}",
        report.positions_checked,
        report.mismatches.len(),
        report.failed_checks.len()
    );

    for m in &report.mismatches {
        let _ = writeln!(
            out,
            "MISMATCH market={} wallet={} expected_yes={} onchain_yes={} expected_no={} onchain_no={}",
            m.key.market, m.key.wallet, m.expected_yes, m.onchain_yes, m.expected_no, m.onchain_no
        );
    }

    for fc in &report.failed_checks {
        let _ = writeln!(
            out,
            "CHECK_FAILED market={} wallet={} error={}",
            fc.key.market, fc.key.wallet, fc.error
        );
    }

    out
}
