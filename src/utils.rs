use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Token that fires once the process receives ctrl-c.
///
/// Clone it anywhere a task needs to wind down with the server.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    //spawn once to listen for ctrl-c
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+C handler");
        tc.cancel();
    });
    token
}
