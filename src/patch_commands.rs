use anyhow::{Context, Result, bail};
use std::{path::Path, rc::Rc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::{
    circuit::Circuit,
    gadget::Gadgetry,
    message::Message,
    patch::{load_patch_file, write_patch},
};

/// What a patch file contains, as reported by `glow validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub members: usize,
    pub wires: usize,
    pub inlets: usize,
    pub outlets: usize,
}

impl PatchSummary {
    pub fn of(circuit: &Circuit) -> Self {
        PatchSummary {
            members: circuit.len(),
            wires: circuit.wires().len(),
            inlets: circuit.num_inlets(),
            outlets: circuit.num_outlets(),
        }
    }
}

fn load(path: &Path) -> Result<Rc<Circuit>> {
    if !path.exists() {
        bail!("File does not exist: {}", path.display());
    }
    load_patch_file(path).with_context(|| format!("Invalid patch: {}", path.display()))
}

/// Check that the provided file is a loadable patch.
pub fn validate_patch_file(path: &Path) -> Result<PatchSummary> {
    let circuit = load(path)?;
    let summary = PatchSummary::of(&circuit);
    info!(path = %path.display(), ?summary, "patch is valid");
    Ok(summary)
}

/// Parse a patch file and write it back out in canonical form.
pub fn format_patch_file(path: &Path) -> Result<String> {
    let circuit = load(path)?;
    write_patch(&circuit).with_context(|| format!("Cannot write patch: {}", path.display()))
}

/// Turn one line of driver input into an inlet number and a message.
///
/// `@N rest` targets inlet N, anything else goes to `default_inlet`. The
/// message is read as JSON when it is JSON that maps onto a message, else as
/// patch tokens. Blank lines give `None`.
pub fn parse_input_line(line: &str, default_inlet: usize) -> Result<Option<(usize, Message)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (inlet, body) = match line.strip_prefix('@') {
        Some(rest) => {
            let (port, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let port = port
                .parse::<usize>()
                .with_context(|| format!("`@{port}` is not an inlet number"))?;
            (port, body.trim())
        }
        None => (default_inlet, line),
    };
    let msg = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| Message::try_from(json).ok())
        .unwrap_or_else(|| Message::parse(body));
    Ok(Some((inlet, msg)))
}

/// Feed one line of input into the circuit, rejecting inlets it does not have.
pub fn feed_line(circuit: &Circuit, line: &str, default_inlet: usize) -> Result<bool> {
    let Some((inlet, msg)) = parse_input_line(line, default_inlet)? else {
        return Ok(false);
    };
    if inlet >= circuit.num_inlets() {
        bail!(
            "inlet {inlet} does not exist, the patch has {} inlet(s)",
            circuit.num_inlets()
        );
    }
    circuit.feed(inlet, msg);
    Ok(true)
}

/// Load a patch and feed it stdin, line by line, until EOF or Ctrl-C.
pub async fn run_patch_file(path: &Path, default_inlet: usize) -> Result<()> {
    let circuit = load(path)?;
    let summary = PatchSummary::of(&circuit);
    info!(path = %path.display(), ?summary, "patch loaded");
    if summary.inlets == 0 {
        warn!("patch has no inlets, input will be rejected");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    Some(line) => {
                        if let Err(e) = feed_line(&circuit, &line, default_inlet) {
                            warn!("{:#}", e);
                            eprintln!("error: {:#}", e);
                        }
                    }
                    None => {
                        info!("end of input");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}
