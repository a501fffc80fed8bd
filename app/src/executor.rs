use std::io;

use tokio::runtime::{Builder, Runtime};

use printscan_core::TOKIO_WORKER_STACK_SIZE_BYTES;

/// Multi-threaded runtime whose workers can hold snmp2 session futures.
pub fn build_runtime() -> io::Result<Runtime> {
    Builder::new_multi_thread()
        .thread_name("printscan-worker")
        .thread_stack_size(TOKIO_WORKER_STACK_SIZE_BYTES)
        .enable_all()
        .build()
}
