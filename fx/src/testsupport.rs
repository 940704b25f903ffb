//! In-process HTTP responder serving canned CSV bodies for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub(crate) const SAMPLE_CSV: &str = "\
Date,USD,JPY,GBP
2024-01-03,1.0919,156.33,0.8633
2024-01-02,1.0956,155.31,0.8664
";

pub(crate) struct StubServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve `body` with the given HTTP status line on an ephemeral local port,
/// counting requests. One request per connection.
pub(crate) async fn serve(status: &'static str, body: &'static str) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 2048];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\n\
                     content-type: text/csv\r\n\
                     content-length: {}\r\n\
                     connection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    StubServer {
        url: format!("http://{addr}/rates.csv"),
        hits,
    }
}
