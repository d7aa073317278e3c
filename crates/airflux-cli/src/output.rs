use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::process::{Command, Stdio};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Show captured subprocess output in full.
///
/// On a terminal the text goes through `$PAGER` (default `less`); otherwise,
/// or when no pager can be started, it is written to stderr verbatim.
pub fn page(text: &str) -> anyhow::Result<()> {
    if std::io::stdout().is_terminal() {
        let pager = std::env::var("PAGER").unwrap_or_default();
        let pager = if pager.trim().is_empty() {
            "less".to_string()
        } else {
            pager
        };
        match run_pager(&pager, text) {
            Ok(()) => return Ok(()),
            Err(e) => tracing::debug!(pager = %pager, error = %e, "pager unavailable"),
        }
    }
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stderr.write_all(b"\n")?;
    }
    Ok(())
}

fn run_pager(pager: &str, text: &str) -> anyhow::Result<()> {
    let mut parts = pager.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty pager command"))?;
    let binary = which::which(program)?;

    let mut child = Command::new(binary)
        .args(parts)
        .stdin(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        // A pager quit early closes the pipe; that is not a failure.
        match stdin.write_all(text.as_bytes()) {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }
    }
    child.wait()?;
    Ok(())
}
