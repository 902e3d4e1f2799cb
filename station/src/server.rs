use std::{
    collections::HashMap,
    io::{self, ErrorKind, Read},
    net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use mio::{
    net::{TcpListener, TcpStream},
    Events, Interest, Poll, Token,
};
use thiserror::Error;

use weather_common::{StationConfig, StationState, TelemetrySample};

use crate::{
    dashboard,
    feedback::Feedback,
    hardware::Network,
    http::{Request, Route},
    response::{send_response, Response, SendError, SendOptions, Status},
};

const LISTENER: Token = Token(0);
const MAX_DRAIN_READS: usize = 4;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("network is not connected")]
    NotConnected,
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up readiness polling: {0}")]
    Poll(#[source] io::Error),
}

#[derive(Debug, Error)]
enum ServiceError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Send(#[from] SendError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerCounters {
    pub accepted: u64,
    pub served: u64,
    pub failed: u64,
    pub closed_by_peer: u64,
}

enum Exchange {
    Served {
        route: Route,
        status: Status,
        body_bytes: usize,
    },
    PeerClosed,
    Pending,
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

struct Listening {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    // Readiness is edge-triggered; stays set until accept reports would-block.
    accept_pending: bool,
}

/// Single-threaded HTTP server driven by the station loop. Each call to
/// [`WeatherServer::handle_request`] waits at most `poll_timeout_ms` for
/// readiness, accepts at most one connection and services every readable
/// client to completion.
pub struct WeatherServer {
    config: StationConfig,
    bind_ip: IpAddr,
    listening: Option<Listening>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    counters: ServerCounters,
    read_buffer: Vec<u8>,
}

impl WeatherServer {
    pub fn new(mut config: StationConfig) -> Self {
        config.sanitize();
        let read_buffer = vec![0; config.read_buffer_bytes];
        Self {
            config,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listening: None,
            connections: HashMap::new(),
            next_token: LISTENER.0,
            counters: ServerCounters::default(),
            read_buffer,
        }
    }

    #[cfg(test)]
    pub fn with_bind_ip(mut self, bind_ip: IpAddr) -> Self {
        self.bind_ip = bind_ip;
        self
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.listening.is_some()
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.as_ref().map(|listening| listening.local_addr)
    }

    pub fn counters(&self) -> ServerCounters {
        self.counters
    }

    #[cfg(test)]
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn start<N: Network + ?Sized>(&mut self, network: &N) -> Result<SocketAddr, StartError> {
        if let Some(listening) = &self.listening {
            return Ok(listening.local_addr);
        }
        if !network.is_connected() {
            return Err(StartError::NotConnected);
        }

        let addr = SocketAddr::new(self.bind_ip, self.config.http_port);
        let mut listener =
            TcpListener::bind(addr).map_err(|source| StartError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartError::Bind { addr, source })?;

        let poll = Poll::new().map_err(StartError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(StartError::Poll)?;

        match network.ip_address() {
            Some(ip) => info!("HTTP server at http://{ip}:{}", local_addr.port()),
            None => info!("HTTP server listening on {local_addr}"),
        }

        self.listening = Some(Listening {
            poll,
            events: Events::with_capacity(self.config.max_events),
            listener,
            local_addr,
            accept_pending: false,
        });
        Ok(local_addr)
    }

    pub fn stop(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            if let Some(connection) = self.connections.remove(&token) {
                self.close(connection, false);
            }
        }

        if let Some(mut listening) = self.listening.take() {
            if let Err(err) = listening.poll.registry().deregister(&mut listening.listener) {
                debug!("listener deregister failed: {err}");
            }
            info!("HTTP server on {} stopped", listening.local_addr);
        }
    }

    /// One multiplexer cycle against the latest snapshot. No-op when stopped.
    pub fn handle_request(&mut self, state: &mut StationState, snapshot: &TelemetrySample) {
        let timeout = Duration::from_millis(self.config.poll_timeout_ms);
        let Some(listening) = self.listening.as_mut() else {
            return;
        };

        if let Err(err) = listening.poll.poll(&mut listening.events, Some(timeout)) {
            if err.kind() != ErrorKind::Interrupted {
                warn!("readiness poll failed: {err}");
            }
            return;
        }

        let mut readable = Vec::new();
        for event in listening.events.iter() {
            match event.token() {
                LISTENER => listening.accept_pending = true,
                token => readable.push(token),
            }
        }
        let accept_pending = listening.accept_pending;

        if accept_pending {
            self.accept_one();
        }

        // One send budget for the whole cycle keeps stalled peers from
        // holding up the sampling loop.
        let send_deadline = Instant::now() + Duration::from_millis(self.config.send_timeout_ms);
        for token in readable {
            self.service(token, state, snapshot, send_deadline);
        }
    }

    fn accept_one(&mut self) {
        let token = self.allocate_token();
        let Some(listening) = self.listening.as_mut() else {
            return;
        };

        match listening.listener.accept() {
            Ok((mut stream, peer)) => {
                if let Err(err) =
                    listening
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                {
                    warn!("failed to register connection from {peer}: {err}");
                    self.counters.failed += 1;
                    return;
                }
                debug!("accepted connection from {peer}");
                self.counters.accepted += 1;
                self.connections.insert(token, Connection { stream, peer });
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => listening.accept_pending = false,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::ConnectionAborted
                ) => {}
            Err(err) => {
                warn!("accept failed: {err}");
                listening.accept_pending = false;
            }
        }
    }

    fn allocate_token(&mut self) -> Token {
        loop {
            self.next_token = self.next_token.wrapping_add(1);
            let token = Token(self.next_token);
            if token != LISTENER && !self.connections.contains_key(&token) {
                return token;
            }
        }
    }

    fn service(
        &mut self,
        token: Token,
        state: &mut StationState,
        snapshot: &TelemetrySample,
        send_deadline: Instant,
    ) {
        let Some(mut connection) = self.connections.remove(&token) else {
            return;
        };

        match self.exchange(&mut connection, state, snapshot, send_deadline) {
            Ok(Exchange::Pending) => {
                self.connections.insert(token, connection);
                return;
            }
            Ok(Exchange::Served {
                route,
                status,
                body_bytes,
            }) => {
                self.counters.served += 1;
                debug!(
                    "{} {route:?} -> {} ({body_bytes} body bytes)",
                    connection.peer,
                    status.code()
                );
                self.close(connection, true);
            }
            Ok(Exchange::PeerClosed) => {
                self.counters.closed_by_peer += 1;
                debug!("{} closed before sending a request", connection.peer);
                self.close(connection, false);
            }
            Err(err) => {
                self.counters.failed += 1;
                warn!("connection from {} failed: {err}", connection.peer);
                self.close(connection, false);
            }
        }
    }

    fn exchange(
        &mut self,
        connection: &mut Connection,
        state: &mut StationState,
        snapshot: &TelemetrySample,
        send_deadline: Instant,
    ) -> Result<Exchange, ServiceError> {
        let received = loop {
            match connection.stream.read(&mut self.read_buffer) {
                Ok(0) => return Ok(Exchange::PeerClosed),
                Ok(received) => break received,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(Exchange::Pending),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ServiceError::Read(err)),
            }
        };

        let request = Request::parse(&self.read_buffer[..received]);
        let route = request.route();
        let response = dispatch(route, &request, state, snapshot, self.counters);

        let options = SendOptions {
            chunk_bytes: self.config.send_chunk_bytes,
            deadline: send_deadline,
        };
        let body_bytes = send_response(&mut connection.stream, &response, options)?;

        Ok(Exchange::Served {
            route,
            status: response.status,
            body_bytes,
        })
    }

    fn close(&mut self, mut connection: Connection, graceful: bool) {
        if let Some(listening) = &self.listening {
            if let Err(err) = listening.poll.registry().deregister(&mut connection.stream) {
                debug!("deregister for {} failed: {err}", connection.peer);
            }
        }

        if graceful {
            let _ = connection.stream.shutdown(Shutdown::Write);
            // Unread request bytes would turn the close into a reset.
            for _ in 0..MAX_DRAIN_READS {
                match connection.stream.read(&mut self.read_buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
}

impl Drop for WeatherServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(
    route: Route,
    request: &Request<'_>,
    state: &mut StationState,
    snapshot: &TelemetrySample,
    counters: ServerCounters,
) -> Response {
    match route {
        Route::NotFound => Response::not_found(),
        Route::Dashboard => dashboard::render(state, snapshot, counters),
        Route::Feedback => match Feedback::decode(request.body) {
            Ok(feedback) => {
                let learned =
                    state
                        .predictor
                        .learn(feedback.temperature, feedback.humidity, feedback.rating);
                if learned {
                    info!(
                        "model learned: {:.1} °C, {:.1} % -> {:.2} comfort",
                        feedback.temperature, feedback.humidity, feedback.rating
                    );
                    match serde_json::to_string(&state.predictor.stats()) {
                        Ok(stats) => debug!("learning stats {stats}"),
                        Err(err) => debug!("learning stats unavailable: {err}"),
                    }
                    Response::feedback_accepted()
                } else {
                    warn!("feedback {feedback:?} produced no usable update");
                    Response::feedback_rejected()
                }
            }
            Err(err) => {
                warn!("invalid feedback: {err}");
                Response::feedback_rejected()
            }
        },
    }
}
