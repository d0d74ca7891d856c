use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// No-auth SOCKS5 proxy that records every CONNECT target and relays bytes.
/// With `reject` set it refuses every CONNECT with reply code 0x05.
pub struct MockSocks5Proxy {
    addr: SocketAddr,
    targets: Arc<Mutex<Vec<(String, u16)>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockSocks5Proxy {
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    pub async fn rejecting() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(reject: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let targets = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let log = targets.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        if let Ok((stream, _)) = accepted {
                            tokio::spawn(relay(stream, log.clone(), reject));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            targets,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn address(&self) -> String {
        format!("socks5://{}", self.addr)
    }

    pub fn targets(&self) -> Vec<(String, u16)> {
        self.targets.lock().unwrap().clone()
    }
}

impl Drop for MockSocks5Proxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn relay(mut client: TcpStream, log: Arc<Mutex<Vec<(String, u16)>>>, reject: bool) {
    let mut greeting = [0u8; 2];
    if client.read_exact(&mut greeting).await.is_err() {
        return;
    }
    let mut methods = vec![0u8; greeting[1] as usize];
    if client.read_exact(&mut methods).await.is_err() || !methods.contains(&0x00) {
        let _ = client.write_all(&[0x05, 0xFF]).await;
        return;
    }
    if client.write_all(&[0x05, 0x00]).await.is_err() {
        return;
    }

    let mut head = [0u8; 4];
    if client.read_exact(&mut head).await.is_err() {
        return;
    }
    let host = match head[3] {
        0x01 => {
            let mut ip = [0u8; 4];
            if client.read_exact(&mut ip).await.is_err() {
                return;
            }
            Ipv4Addr::from(ip).to_string()
        }
        0x04 => {
            let mut ip = [0u8; 16];
            if client.read_exact(&mut ip).await.is_err() {
                return;
            }
            Ipv6Addr::from(ip).to_string()
        }
        0x03 => {
            let mut len = [0u8; 1];
            if client.read_exact(&mut len).await.is_err() {
                return;
            }
            let mut name = vec![0u8; len[0] as usize];
            if client.read_exact(&mut name).await.is_err() {
                return;
            }
            String::from_utf8_lossy(&name).into_owned()
        }
        _ => return,
    };
    let mut port = [0u8; 2];
    if client.read_exact(&mut port).await.is_err() {
        return;
    }
    let port = u16::from_be_bytes(port);
    log.lock().unwrap().push((host.clone(), port));

    const SUCCESS: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0, 0];
    const REFUSED: [u8; 10] = [0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

    if reject {
        let _ = client.write_all(&REFUSED).await;
        return;
    }

    let Ok(mut upstream) = TcpStream::connect((host.as_str(), port)).await else {
        let _ = client.write_all(&REFUSED).await;
        return;
    };
    if client.write_all(&SUCCESS).await.is_err() {
        return;
    }
    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}
