use std::io::{self, Write};
use std::process::ExitCode;

use tracing::{debug, error, info};

use printscan_core::{
    targets, DetailCollector, DiscoveryPool, Error, ScanSettings, Scanner, SnmpConfig,
    SnmpPrinterProbe, SnmpV2cClient,
};

use crate::cli::CommandLine;

/// Configuration errors exit with this status; device failures never do.
const CONFIGURATION_EXIT: u8 = 2;

pub async fn run(cli: CommandLine) -> ExitCode {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match scan(&cli, &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = out.flush();
            error!(
                target: targets::CLI,
                error = %error.technical_detail(),
                "Scan aborted"
            );
            eprintln!("printscan: {}", error.user_summary());
            eprintln!("  {}", error.technical_detail());
            if error.is_configuration() {
                ExitCode::from(CONFIGURATION_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn scan<W: Write>(cli: &CommandLine, out: &mut W) -> Result<(), Error> {
    let settings = match cli.config.as_deref() {
        Some(path) => ScanSettings::load(path)?,
        None => ScanSettings::default(),
    }
    .apply(cli.overrides());
    let cidr = settings.resolved_cidr()?;

    debug!(
        target: targets::CLI,
        cidr = %cidr,
        workers = settings.workers,
        "Effective scan settings"
    );

    let client = SnmpV2cClient::new(SnmpConfig::with_community(settings.community.clone()));
    let scanner = Scanner::new(
        DiscoveryPool::new(SnmpPrinterProbe::new(client.clone()), settings.workers),
        DetailCollector::new(client),
    );

    let summary = scanner.run(&cidr, out).await?;
    info!(
        target: targets::CLI,
        found = summary.found,
        failed = summary.failed,
        "Done"
    );
    Ok(())
}
