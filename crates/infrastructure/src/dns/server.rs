//! Plain DNS listener on UDP and TCP sharing one handler.

use super::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::wire_response::{
    build_formerr, build_servfail, client_udp_limit, encode, encode_for_udp,
};
use ecs_forwarder_application::use_cases::ForwardQueryUseCase;
use hickory_proto::op::{Message, MessageType};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const UDP_RECV_BUFFER_SIZE: usize = 4096;
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_BACKLOG: i32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listener {
    Udp,
    Tcp,
}

impl Listener {
    fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

/// Decode, forward and encode one request. Never fails: every error path
/// ends in a DNS error response or, for unusable input, no response.
struct QueryHandler {
    use_case: Arc<ForwardQueryUseCase>,
}

impl QueryHandler {
    fn new(use_case: Arc<ForwardQueryUseCase>) -> Self {
        Self { use_case }
    }

    async fn handle(
        &self,
        query_buf: &[u8],
        client: SocketAddr,
        listener: Listener,
    ) -> Option<Vec<u8>> {
        let query = match Message::from_vec(query_buf) {
            Ok(query) => query,
            Err(e) => {
                debug!(client = %client, error = %e, "Undecodable query");
                return build_formerr(query_buf).map(|buf| buf.to_vec());
            }
        };

        if query.message_type() != MessageType::Query {
            debug!(client = %client, id = query.id(), "Ignoring non-query message");
            return None;
        }

        let (domain, record_type) = query
            .queries()
            .first()
            .map(|q| (q.name().to_utf8(), q.query_type().to_string()))
            .unwrap_or_default();

        let start = Instant::now();
        let mut response = match self.use_case.execute(&query).await {
            Ok(response) => {
                debug!(
                    client = %client,
                    domain = %domain,
                    record_type = %record_type,
                    listener = listener.as_str(),
                    rcode = ?response.response_code(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query forwarded"
                );
                response
            }
            Err(e) => {
                warn!(
                    client = %client,
                    domain = %domain,
                    record_type = %record_type,
                    upstream = self.use_case.protocol_name(),
                    kind = e.kind(),
                    error = %e,
                    "Upstream resolution failed, answering SERVFAIL"
                );
                build_servfail(&query)
            }
        };

        // A client that sent no OPT record must not receive one.
        if query.extensions().is_none() {
            *response.extensions_mut() = None;
        }

        let encoded = match listener {
            Listener::Udp => encode_for_udp(&response, client_udp_limit(&query)),
            Listener::Tcp => encode(&response),
        };

        match encoded {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(client = %client, domain = %domain, error = %e, "Failed to encode response");
                encode(&build_servfail(&query)).ok()
            }
        }
    }
}

/// UDP socket and TCP listener bound to the same address, served until the
/// shutdown token is cancelled.
pub struct ForwardingServer {
    udp_socket: Arc<UdpSocket>,
    tcp_listener: TcpListener,
    handler: Arc<QueryHandler>,
}

impl ForwardingServer {
    /// Bind both listeners. With port 0 the TCP listener takes the port the
    /// UDP socket was given.
    pub fn bind(addr: SocketAddr, use_case: Arc<ForwardQueryUseCase>) -> io::Result<Self> {
        let udp_socket = create_udp_socket(addr)?;
        let tcp_listener = create_tcp_listener(udp_socket.local_addr()?)?;

        Ok(Self {
            udp_socket: Arc::new(udp_socket),
            tcp_listener,
            handler: Arc::new(QueryHandler::new(use_case)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.udp_socket.local_addr()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let addr = self.local_addr().ok();
        info!(
            listen = ?addr,
            upstream = self.handler.use_case.protocol_name(),
            ecs = %self.handler.use_case.injector().subnet(),
            "DNS forwarder listening on UDP and TCP"
        );

        let mut join_set: JoinSet<()> = JoinSet::new();
        join_set.spawn(run_udp_listener(
            self.udp_socket,
            self.handler.clone(),
            shutdown.clone(),
        ));
        join_set.spawn(run_tcp_listener(
            self.tcp_listener,
            self.handler,
            shutdown,
        ));

        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Listener task failed");
            }
        }
        info!("DNS forwarder stopped");
    }
}

async fn run_udp_listener(
    socket: Arc<UdpSocket>,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
) {
    let mut recv_buf = vec![0u8; UDP_RECV_BUFFER_SIZE];

    loop {
        let (n, from) = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut recv_buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    debug!(error = %e, "UDP recv error");
                    continue;
                }
            },
        };

        let query_buf: Arc<[u8]> = Arc::from(&recv_buf[..n]);
        let handler = handler.clone();
        let socket = socket.clone();
        tokio::spawn(async move {
            if let Some(response) = handler.handle(&query_buf, from, Listener::Udp).await {
                if let Err(e) = socket.send_to(&response, from).await {
                    warn!(client = %from, error = %e, "Failed to send UDP response");
                }
            }
        });
    }

    debug!("UDP listener stopped");
}

async fn run_tcp_listener(
    listener: TcpListener,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "TCP accept error");
                    continue;
                }
            },
        };

        let handler = handler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            serve_tcp_connection(stream, peer, handler, shutdown).await;
        });
    }

    debug!("TCP listener stopped");
}

/// Sequential queries on one connection until EOF, a framing error, 10s of
/// idleness or shutdown.
async fn serve_tcp_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let query_buf = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = tokio::time::timeout(TCP_IDLE_TIMEOUT, read_with_length_prefix(&mut stream)) => {
                match read {
                    Ok(Ok(query_buf)) => query_buf,
                    Ok(Err(e)) => {
                        debug!(client = %peer, error = %e, "TCP connection closed");
                        break;
                    }
                    Err(_) => {
                        debug!(client = %peer, "TCP connection idle, closing");
                        break;
                    }
                }
            }
        };

        let Some(response) = handler.handle(&query_buf, peer, Listener::Tcp).await else {
            continue;
        };

        if let Err(e) = send_with_length_prefix(&mut stream, &response).await {
            warn!(client = %peer, error = %e, "Failed to send TCP response");
            break;
        }
    }
}

fn create_udp_socket(socket_addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(socket_addr), Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_recv_buffer_size(512 * 1024)?;
    socket.set_send_buffer_size(512 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

fn create_tcp_listener(socket_addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(socket_addr), Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(TCP_BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
