use console::style;
use tokio::sync::mpsc::UnboundedSender;

/// Print a message to stdout and optionally send it through a channel.
///
/// In CLI mode, `tx` is `None` and this just prints. Tests pass `Some(sender)`
/// to observe what the operator would have seen.
pub fn emit(tx: &Option<UnboundedSender<String>>, msg: &str) {
    println!("{msg}");
    if let Some(tx) = tx {
        let _ = tx.send(msg.to_string());
    }
}

/// Like [`emit`], but styled as a warning. The channel receives the plain text
/// prefixed with `Warning:`.
pub fn warn(tx: &Option<UnboundedSender<String>>, msg: &str) {
    let text = format!("  Warning: {msg}");
    println!("{}", style(&text).yellow());
    if let Some(tx) = tx {
        let _ = tx.send(text);
    }
}
