//! User-facing CLI output: JSON on stdout, human notes on stderr.

use crate::{
    amount::{format_ui_amount, NATIVE_DECIMALS},
    chains::registry::ChainRegistry,
    status::BatchStatus,
    types::ExecutionResult,
};
use eyre::Context as _;
use std::io::{BufRead as _, IsTerminal as _, Write as _};

fn stderr_write(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    let _flush = stderr.flush();
}

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn print_json(v: &serde_json::Value) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write stdout")?;
    Ok(())
}

pub fn print_status(status: &BatchStatus) {
    stderr_writeln(&format!("swapbatch: {status}"));
}

pub fn print_progress(done: usize, total: usize) {
    stderr_writeln(&format!("swapbatch: confirmed {done}/{total}"));
}

/// One line per dispatched batch, with fees in native units.
pub fn print_results(results: &[ExecutionResult], registry: &ChainRegistry) {
    for r in results {
        let chain = registry.label(r.chain_id);
        let reference = r
            .tx_hash
            .map(|h| format!("tx {h}"))
            .or_else(|| r.batch_id.as_ref().map(|id| format!("batch {id}")))
            .unwrap_or_else(|| "no reference".into());
        let fee = r
            .fee_summary
            .as_ref()
            .and_then(|f| format_ui_amount(f.total_fee_wei, NATIVE_DECIMALS).ok())
            .map_or_else(String::new, |f| format!(", fee {f}"));
        let outcome = if r.success {
            String::new()
        } else {
            format!(" ({} transaction(s) confirmed before failing)", r.tx_hashes.len())
        };
        stderr_writeln(&format!("{chain}: {} via {}{fee}{outcome}", reference, r.method));
    }
}

/// Ask for confirmation before sending transactions, or bail if non-interactive.
pub fn confirm_swap_or_bail(yes: bool, summary: &str) -> eyre::Result<()> {
    if yes {
        return Ok(());
    }
    let interactive = std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
    if !interactive {
        eyre::bail!("refusing to send transactions non-interactively; pass --yes");
    }

    stderr_writeln(summary);
    stderr_write("Continue? [y/N] ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read confirmation")?;
    let ans = line.trim().to_ascii_lowercase();
    if ans == "y" || ans == "yes" {
        Ok(())
    } else {
        eyre::bail!("cancelled");
    }
}
