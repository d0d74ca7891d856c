use super::{answer_for, localhost_acceptor};
use ecs_forwarder_infrastructure::dns::transport::Dialer;
use hickory_proto::op::Message;
use rustls::pki_types::CertificateDer;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy)]
pub enum DohBehavior {
    /// 200 with an answer carrying the query's own ID.
    Answer,
    /// Fixed HTTP status with an empty body.
    Status(u16),
    /// 200 with an empty body.
    EmptyBody,
}

/// Minimal HTTP/1.1 DoH endpoint over TLS with a self-signed certificate for
/// `localhost`. One request per connection.
pub struct MockDohServer {
    addr: SocketAddr,
    certificate: CertificateDer<'static>,
    received: Arc<Mutex<Vec<Message>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDohServer {
    pub async fn start(behavior: DohBehavior) -> Self {
        let (certificate, acceptor) = localhost_acceptor();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let log = received.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let acceptor = acceptor.clone();
                        let log = log.clone();
                        tokio::spawn(async move {
                            if let Ok(tls) = acceptor.accept(stream).await {
                                serve(tls, behavior, log).await;
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            certificate,
            received,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("https://localhost:{}/dns-query", self.addr.port())
    }

    /// The dialer's HTTPS client, additionally trusting this server's certificate.
    pub fn http_client(&self, dialer: &Dialer, timeout: Duration) -> reqwest::Client {
        let root = reqwest::Certificate::from_der(self.certificate.as_ref()).unwrap();
        dialer
            .http_client_builder(timeout)
            .unwrap()
            .add_root_certificate(root)
            .build()
            .unwrap()
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for MockDohServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve<S>(mut stream: S, behavior: DohBehavior, log: Arc<Mutex<Vec<Message>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some((headers, mut body)) = read_head(&mut stream).await else {
        return;
    };

    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while body.len() < content_length {
        let mut chunk = [0u8; 1024];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let query = match Message::from_vec(&body) {
        Ok(query) => query,
        Err(_) => {
            write_response(&mut stream, 400, &[]).await;
            return;
        }
    };
    log.lock().unwrap().push(query.clone());

    match behavior {
        DohBehavior::Answer => {
            let response = answer_for(&query, query.id()).to_vec().unwrap();
            write_response(&mut stream, 200, &response).await;
        }
        DohBehavior::Status(status) => write_response(&mut stream, status, &[]).await,
        DohBehavior::EmptyBody => write_response(&mut stream, 200, &[]).await,
    }
}

async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).into_owned();
            return Some((headers, buf[end + 4..].to_vec()));
        }
        let mut chunk = [0u8; 1024];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

async fn write_response<S: AsyncWrite + Unpin>(stream: &mut S, status: u16, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} Mock\r\ncontent-type: application/dns-message\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.shutdown().await;
}
