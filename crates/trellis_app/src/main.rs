// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trellis - command-line graph layout
//!
//! Reads a row-oriented JSON graph and an optional RON layout settings file,
//! runs the layout to completion and prints node and edge positions as JSON.
//!
//! ```text
//! trellis graph.json [settings.ron]
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG`.

mod driver;

use driver::Args;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trellis_app=info,trellis_layout=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = Args::parse(std::env::args().skip(1)).and_then(|args| driver::run(&args));
    match result {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}
