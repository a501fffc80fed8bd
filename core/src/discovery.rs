use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::model::{DiscoveredPrinter, SnmpAddress};
use crate::oids::{naming_oids, HR_PRINTER_STATUS_OID};
use crate::snmp::{DecodedValue, Oid, SnmpClient, SnmpRequest};
use crate::targets;

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    NotPrinter,
    Printer { name: Option<String> },
}

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;

/// Decides whether one address hosts a printer. Failures are folded into
/// [`ProbeOutcome::NotPrinter`].
pub trait PrinterProbe: Send + Sync {
    fn probe<'a>(&'a self, address: Ipv4Addr) -> ProbeFuture<'a>;
}

/// Probes `hrPrinterStatus.1` and, on a hit, resolves a display name.
#[derive(Debug, Clone)]
pub struct SnmpPrinterProbe<C> {
    client: C,
}

impl<C: SnmpClient> SnmpPrinterProbe<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn probe_address(&self, ip: Ipv4Addr) -> ProbeOutcome {
        let address = SnmpAddress::from(ip);
        let status_oid = Oid::from_slice(&HR_PRINTER_STATUS_OID);
        let request = SnmpRequest::new(address.clone(), vec![status_oid.clone()]);

        let response = match self.client.get(request).await {
            Ok(response) => response,
            Err(error) => {
                trace!(
                    target: targets::DISCOVERY,
                    address = %address,
                    error = %error.technical_detail(),
                    "No SNMP answer"
                );
                return ProbeOutcome::NotPrinter;
            }
        };

        match response.value_of(&status_oid) {
            Some(value) if !value.is_missing() => {}
            _ => {
                debug!(
                    target: targets::DISCOVERY,
                    address = %address,
                    "SNMP agent without printer status"
                );
                return ProbeOutcome::NotPrinter;
            }
        }

        let name = self.resolve_name(&address).await;
        info!(
            target: targets::DISCOVERY,
            address = %address,
            named = name.is_some(),
            "Printer discovered"
        );
        ProbeOutcome::Printer { name }
    }

    async fn resolve_name(&self, address: &SnmpAddress) -> Option<String> {
        let oids = naming_oids();
        let request = SnmpRequest::new(address.clone(), oids.clone());
        let response = match self.client.get(request).await {
            Ok(response) => response,
            Err(error) => {
                debug!(
                    target: targets::DISCOVERY,
                    address = %address,
                    error = %error.technical_detail(),
                    "Printer name lookup failed"
                );
                return None;
            }
        };

        oids.iter().find_map(|oid| match response.value_of(oid)?.decode() {
            DecodedValue::Text(text) if !text.is_empty() => Some(text),
            _ => None,
        })
    }
}

impl<C: SnmpClient> PrinterProbe for SnmpPrinterProbe<C> {
    fn probe<'a>(&'a self, address: Ipv4Addr) -> ProbeFuture<'a> {
        Box::pin(self.probe_address(address))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    /// Printers in the order their probes completed.
    pub printers: Vec<DiscoveredPrinter>,
    pub probed: usize,
}

/// Fixed set of workers sharing one bounded address queue.
pub struct DiscoveryPool<P> {
    probe: Arc<P>,
    workers: usize,
}

impl<P: PrinterProbe + 'static> DiscoveryPool<P> {
    pub fn new(probe: P, workers: usize) -> Self {
        Self::from_shared(Arc::new(probe), workers)
    }

    pub fn from_shared(probe: Arc<P>, workers: usize) -> Self {
        Self {
            probe,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Probes every address once. `on_found` runs on the calling task as
    /// each positive arrives. Returns after the feeder and all workers
    /// have been joined.
    pub async fn run<I, F>(&self, addresses: I, mut on_found: F) -> DiscoveryOutcome
    where
        I: IntoIterator<Item = Ipv4Addr>,
        I::IntoIter: Send + 'static,
        F: FnMut(&DiscoveredPrinter),
    {
        let (queue_tx, queue_rx) = mpsc::channel::<Ipv4Addr>(self.workers);
        let (found_tx, mut found_rx) = mpsc::unbounded_channel::<DiscoveredPrinter>();
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&queue_rx),
                Arc::clone(&self.probe),
                found_tx.clone(),
            )));
        }
        // Only workers hold the receiver, so the feeder stops if they all die.
        drop(queue_rx);
        drop(found_tx);

        let addresses = addresses.into_iter();
        let feeder = tokio::spawn(async move {
            let mut fed = 0usize;
            for address in addresses {
                if queue_tx.send(address).await.is_err() {
                    break;
                }
                fed += 1;
            }
            fed
        });

        let mut printers = Vec::new();
        while let Some(printer) = found_rx.recv().await {
            on_found(&printer);
            printers.push(printer);
        }

        match feeder.await {
            Ok(fed) => trace!(target: targets::DISCOVERY, fed, "Address feeder finished"),
            Err(error) => warn!(target: targets::DISCOVERY, error = %error, "Address feeder failed"),
        }

        let mut probed = 0;
        for handle in handles {
            match handle.await {
                Ok(count) => probed += count,
                Err(error) => {
                    warn!(target: targets::DISCOVERY, error = %error, "Discovery worker failed")
                }
            }
        }

        debug!(
            target: targets::DISCOVERY,
            probed,
            found = printers.len(),
            workers = self.workers,
            "Discovery complete"
        );

        DiscoveryOutcome { printers, probed }
    }
}

async fn run_worker<P: PrinterProbe + ?Sized>(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Ipv4Addr>>>,
    probe: Arc<P>,
    found: mpsc::UnboundedSender<DiscoveredPrinter>,
) -> usize {
    let mut probed = 0;
    loop {
        let next = queue.lock().await.recv().await;
        let Some(address) = next else {
            break;
        };
        probed += 1;

        if let ProbeOutcome::Printer { name } = probe.probe(address).await {
            if found.send(DiscoveredPrinter { address, name }).is_err() {
                break;
            }
        }
    }

    trace!(target: targets::DISCOVERY, worker_id, probed, "Discovery worker exiting");
    probed
}
