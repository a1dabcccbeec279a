//! hbsbench command-line entry point

use hbsbench_profile::TrackingAllocator;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator;

fn main() {
    if let Err(e) = hbsbench_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
