//! Functional DNS probing over UDP.
//!
//! Builds a single recursive A query, sends it to a specific resolver and
//! waits a bounded time for a matching reply. A reply only counts when it is
//! NOERROR with at least one answer: a resolver that answers SERVFAIL for a
//! known-good domain is up but not serving.

use hickory_proto::error::ProtoError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const MAX_UDP_RESPONSE: usize = 4096;

#[derive(Debug, Error)]
pub enum DnsProbeError {
    #[error("invalid domain '{0}'")]
    InvalidDomain(String),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed DNS message: {0}")]
    Proto(#[from] ProtoError),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("resolver answered {0}")]
    Rcode(ResponseCode),

    #[error("resolver returned no answers")]
    NoAnswers,
}

/// Successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub answers: usize,
    pub latency: Duration,
}

/// Upper bound on extra attempts per probe.
pub const MAX_DNS_RETRIES: u32 = 1;

/// Resolve `domain` against `server`, retrying up to `retries` extra times
/// (at most [`MAX_DNS_RETRIES`]). Each attempt is bounded by `attempt_timeout`.
pub async fn probe(
    server: SocketAddr,
    domain: &str,
    attempt_timeout: Duration,
    retries: u32,
) -> Result<DnsAnswer, DnsProbeError> {
    let name = parse_name(domain)?;
    let mut last_err = DnsProbeError::Timeout(attempt_timeout);

    for attempt in 0..=retries.min(MAX_DNS_RETRIES) {
        match query_once(server, &name, attempt_timeout).await {
            Ok(answer) => return Ok(answer),
            Err(e) => {
                tracing::debug!(%server, domain, attempt, error = %e, "DNS attempt failed");
                last_err = e;
            }
        }
    }

    Err(last_err)
}

fn parse_name(domain: &str) -> Result<Name, DnsProbeError> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(DnsProbeError::InvalidDomain(domain.to_string()));
    }
    Name::from_ascii(format!("{}.", trimmed))
        .map_err(|_| DnsProbeError::InvalidDomain(domain.to_string()))
}

async fn query_once(
    server: SocketAddr,
    name: &Name,
    deadline: Duration,
) -> Result<DnsAnswer, DnsProbeError> {
    let bind: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(server).await?;

    let id = uuid::Uuid::new_v4().as_fields().1;
    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    request.add_query(Query::query(name.clone(), RecordType::A));
    let bytes = request.to_vec()?;

    let started = Instant::now();
    let response = match timeout(deadline, exchange(&socket, &bytes, id)).await {
        Ok(result) => result?,
        Err(_) => return Err(DnsProbeError::Timeout(deadline)),
    };

    if response.response_code() != ResponseCode::NoError {
        return Err(DnsProbeError::Rcode(response.response_code()));
    }
    if response.answers().is_empty() {
        return Err(DnsProbeError::NoAnswers);
    }

    Ok(DnsAnswer {
        answers: response.answers().len(),
        latency: started.elapsed(),
    })
}

async fn exchange(socket: &UdpSocket, bytes: &[u8], id: u16) -> Result<Message, DnsProbeError> {
    socket.send(bytes).await?;
    let mut buf = [0u8; MAX_UDP_RESPONSE];
    loop {
        let n = socket.recv(&mut buf).await?;
        let response = Message::from_vec(&buf[..n])?;
        // Stray datagrams with another id are ignored.
        if response.id() == id && response.message_type() == MessageType::Response {
            return Ok(response);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{RData, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Local resolver that answers every A query with 10.0.0.1, after
    /// silently dropping the first `drop_first` queries.
    pub(crate) async fn spawn_resolver(
        rcode: ResponseCode,
        drop_first: usize,
    ) -> (SocketAddr, Arc<AtomicUsize>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else { break };
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < drop_first {
                    continue;
                }
                let request = Message::from_vec(&buf[..n]).unwrap();
                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(OpCode::Query)
                    .set_response_code(rcode);
                response.add_queries(request.queries().to_vec());
                if rcode == ResponseCode::NoError {
                    let name = request.queries()[0].name().clone();
                    response.add_answer(Record::from_rdata(name, 60, RData::A(A::new(10, 0, 0, 1))));
                }
                let _ = socket.send_to(&response.to_vec().unwrap(), peer).await;
            }
        });

        (addr, seen)
    }

    #[tokio::test]
    async fn test_resolves_against_local_resolver() {
        let (addr, _) = spawn_resolver(ResponseCode::NoError, 0).await;
        let answer = probe(addr, "google.com", Duration::from_secs(1), 0).await.unwrap();
        assert_eq!(answer.answers, 1);
    }

    #[tokio::test]
    async fn test_retries_once_after_lost_query() {
        let (addr, seen) = spawn_resolver(ResponseCode::NoError, 1).await;
        let answer = probe(addr, "google.com", Duration::from_millis(200), 1).await;
        assert!(answer.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_servfail_is_failure() {
        let (addr, _) = spawn_resolver(ResponseCode::ServFail, 0).await;
        let err = probe(addr, "google.com", Duration::from_secs(1), 0).await.unwrap_err();
        assert!(matches!(err, DnsProbeError::Rcode(ResponseCode::ServFail)));
    }

    #[tokio::test]
    async fn test_silent_resolver_times_out() {
        let (addr, seen) = spawn_resolver(ResponseCode::NoError, usize::MAX).await;
        let err = probe(addr, "google.com", Duration::from_millis(100), 1).await.unwrap_err();
        assert!(matches!(err, DnsProbeError::Timeout(_)));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_count_is_capped() {
        let (addr, seen) = spawn_resolver(ResponseCode::NoError, usize::MAX).await;
        let err = probe(addr, "google.com", Duration::from_millis(50), 5).await.unwrap_err();
        assert!(matches!(err, DnsProbeError::Timeout(_)));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_domain_rejected() {
        let err = probe("127.0.0.1:53".parse().unwrap(), " ", Duration::from_millis(10), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsProbeError::InvalidDomain(_)));
    }
}
