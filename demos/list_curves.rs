//! Lists the elliptic curves built in to the linked OpenSSL, along with the size of each curve's
//! field and the order of its generator.
//!
//! ## Example usage:
//!
//! ```bash
//! cargo run --example list-curves
//! ```
//!
//! Only show curves with a NIST name, and log handle lifecycle events:
//!
//! ```bash
//! RUST_LOG=halide=debug cargo run --example list-curves -- --nist
//! ```

use anyhow::Context;
use halide::{curve, group};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let nist_only = std::env::args().skip(1).any(|arg| arg == "--nist");

    for info in curve::list_builtin_curves().context("listing builtin curves")? {
        if nist_only && info.curve.nist_name().is_none() {
            continue;
        }

        let group = group::create_group(info.curve)
            .with_context(|| format!("creating group for {}", info.curve))?;
        let order = group::group_order(&group)
            .with_context(|| format!("computing order of {}", info.curve))?;

        println!(
            "{:<6} {:<18} {:<6} {:>4} bits  {}",
            info.curve.as_raw(),
            info.curve,
            info.curve.nist_name().unwrap_or("-"),
            group.degree(),
            info.comment,
        );
        println!("       order = {order}");
    }

    Ok(())
}
