use std::io::{self, Write};

use tracing::{info, warn};

use crate::collector::DetailCollector;
use crate::discovery::{DiscoveryPool, PrinterProbe};
use crate::range::CidrRange;
use crate::snmp::SnmpClient;
use crate::{targets, Error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub probed: usize,
    pub found: usize,
    pub reported: usize,
    pub failed: usize,
}

/// Runs discovery to completion, then collects one report per printer in
/// discovery order, writing everything to `out` as it happens.
pub struct Scanner<P, C> {
    pool: DiscoveryPool<P>,
    collector: DetailCollector<C>,
}

impl<P, C> Scanner<P, C>
where
    P: PrinterProbe + 'static,
    C: SnmpClient,
{
    pub fn new(pool: DiscoveryPool<P>, collector: DetailCollector<C>) -> Self {
        Self { pool, collector }
    }

    pub async fn run<W: Write>(&self, cidr: &str, out: &mut W) -> Result<ScanSummary, Error> {
        let range = CidrRange::parse(cidr)?;

        writeln!(
            out,
            "Scanning network {range} ({} addresses) with {} workers for SNMP-enabled printers...",
            range.host_count(),
            self.pool.workers()
        )
        .map_err(output_error)?;
        out.flush().map_err(output_error)?;

        let mut write_result: io::Result<()> = Ok(());
        let discovery = self
            .pool
            .run(range, |printer| {
                if write_result.is_ok() {
                    write_result = writeln!(out, "{printer}");
                }
                if write_result.is_ok() {
                    write_result = out.flush();
                }
            })
            .await;
        write_result.map_err(output_error)?;

        let mut summary = ScanSummary {
            probed: discovery.probed,
            found: discovery.printers.len(),
            ..ScanSummary::default()
        };

        if discovery.printers.is_empty() {
            writeln!(out, "No SNMP printers found.").map_err(output_error)?;
            info!(target: targets::REPORT, probed = summary.probed, "Scan finished without printers");
            return Ok(summary);
        }

        writeln!(out, "Found {} SNMP printers:", summary.found).map_err(output_error)?;
        for printer in &discovery.printers {
            match self.collector.collect(printer.address).await {
                Ok(report) => {
                    write!(out, "\n{report}").map_err(output_error)?;
                    summary.reported += 1;
                }
                Err(error) => {
                    warn!(
                        target: targets::REPORT,
                        address = %printer.address,
                        error = %error.technical_detail(),
                        "Device report aborted"
                    );
                    writeln!(
                        out,
                        "\nFailed to collect report for {}: {}",
                        printer.address,
                        error.technical_detail()
                    )
                    .map_err(output_error)?;
                    summary.failed += 1;
                }
            }
            out.flush().map_err(output_error)?;
        }

        info!(
            target: targets::REPORT,
            probed = summary.probed,
            found = summary.found,
            reported = summary.reported,
            failed = summary.failed,
            "Scan finished"
        );
        Ok(summary)
    }
}

fn output_error(source: io::Error) -> Error {
    Error::Output { source }
}
