use console::Term;
use fitsync::sync::CancelFlag;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first signal raises the cancellation flag; the executor finishes the
/// in-flight activity, commits, and advances the cursor to it. A second
/// signal force-quits.
pub(crate) fn setup_shutdown_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing the current activity...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing the current activity");
        }

        cancel.request();

        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install second Ctrl+C handler");

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
