//! Shared plumbing for the scxrd command-line tools.

use anyhow::{bail, Result};
use scxrd_pure::UbMatrix;
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise warnings are shown, or everything
/// down to `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Nine row-major values as a UB matrix.
pub fn ub_from_values(values: &[f64]) -> Result<UbMatrix> {
    let Ok(values) = <[f64; 9]>::try_from(values) else {
        bail!("UB matrix needs 9 values, got {}", values.len());
    };
    Ok(UbMatrix(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ub_needs_nine_values() {
        let ub = ub_from_values(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(ub.0[4], 1.0);
        let err = ub_from_values(&[1.0; 8]).unwrap_err();
        assert_eq!(err.to_string(), "UB matrix needs 9 values, got 8");
    }
}
