use super::{answer_for, localhost_acceptor};
use hickory_proto::op::Message;
use rustls::pki_types::CertificateDer;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy)]
pub enum DotBehavior {
    Answer,
    /// Answer with the query ID plus one.
    WrongId,
    /// Answer with the TC bit set.
    Truncated,
}

/// DoT endpoint with a self-signed certificate for `localhost`. Reads one
/// length-prefixed query per connection and answers it.
pub struct MockDotServer {
    addr: SocketAddr,
    certificate: CertificateDer<'static>,
    received: Arc<Mutex<Vec<Message>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDotServer {
    pub async fn start(behavior: DotBehavior) -> Self {
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
                            let Ok(mut tls) = acceptor.accept(stream).await else { return };

                            let mut len = [0u8; 2];
                            if tls.read_exact(&mut len).await.is_err() {
                                return;
                            }
                            let mut body = vec![0u8; u16::from_be_bytes(len) as usize];
                            if tls.read_exact(&mut body).await.is_err() {
                                return;
                            }
                            let Ok(query) = Message::from_vec(&body) else { return };
                            log.lock().unwrap().push(query.clone());

                            let mut response = match behavior {
                                DotBehavior::WrongId => answer_for(&query, query.id().wrapping_add(1)),
                                _ => answer_for(&query, query.id()),
                            };
                            if let DotBehavior::Truncated = behavior {
                                response.set_truncated(true);
                            }

                            let bytes = response.to_vec().unwrap();
                            let mut framed = (bytes.len() as u16).to_be_bytes().to_vec();
                            framed.extend_from_slice(&bytes);
                            let _ = tls.write_all(&framed).await;
                            let _ = tls.shutdown().await;
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

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Client config trusting only this server's certificate.
    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.certificate.clone()).unwrap();
        Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        )
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for MockDotServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
