//! Test stand-in for the remote API: a local listener that answers each
//! connection with the next scripted response. The managers issue their
//! round trips strictly in sequence, so an ordered list is enough.

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Binds a local port and serves `responses` one connection at a time, in
/// order. Returns the base URL to point a `GraphClient` at.
pub(crate) async fn serve_scripted(responses: Vec<(u16, Value)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            // The request fits one read; the connection closes after the
            // response, so nothing else arrives on it.
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let payload = body.to_string();
            let reason = if status < 400 { "OK" } else { "Error" };
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason,
                payload.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(payload.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}
