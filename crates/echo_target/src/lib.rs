//! A small HTTP target for exercising load generators.
//!
//! `POST /work` accepts `{"item_id": <int>, "payload": "<str>"}` and answers
//! immediately with the item echoed back together with a snapshot of the server's
//! request counters. With a non-zero error rate a matching fraction of requests is
//! answered with `503 {"detail": "Injected error mode"}` instead.
//!
//! ```no_run
//! # async fn run() -> Result<(), echo_target::EchoError> {
//! let server = echo_target::EchoTarget::bind("127.0.0.1:0", 0.0).await?;
//! let addr = server.local_addr()?;
//! tokio::spawn(server.serve());
//! println!("listening on {addr}");
//! # Ok(())
//! # }
//! ```
mod state;

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};
use tokio::net::{TcpListener, ToSocketAddrs};

pub use state::{ServerState, StateSnapshot};

#[macro_use]
extern crate tracing;

pub const WORK_PATH: &str = "/work";

#[derive(Debug, Snafu)]
pub enum EchoError {
    #[snafu(display("error rate must be within [0, 1], got {}", rate))]
    InvalidErrorRate { rate: f64 },

    #[snafu(display("failed to bind listener: {}", source))]
    Bind { source: std::io::Error },

    #[snafu(display("failed to read local address: {}", source))]
    LocalAddr { source: std::io::Error },
}

/// Request body accepted on `POST /work`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub item_id: i64,
    pub payload: String,
}

/// Body returned for a successful `POST /work`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub item_id: i64,
    pub payload: String,
    pub error_mode: bool,
    pub server_state: StateSnapshot,
}

/// A bound, not yet serving, echo server.
#[derive(Debug)]
pub struct EchoTarget {
    listener: TcpListener,
    state: Arc<ServerState>,
    error_rate: f64,
}

impl EchoTarget {
    /// Binds `addr`; port 0 picks a free port, see [`EchoTarget::local_addr`].
    pub async fn bind(addr: impl ToSocketAddrs, error_rate: f64) -> Result<Self, EchoError> {
        ensure!(
            (0.0..=1.0).contains(&error_rate),
            InvalidErrorRateSnafu { rate: error_rate }
        );
        let listener = TcpListener::bind(addr).await.context(BindSnafu)?;

        Ok(Self {
            listener,
            state: Arc::new(ServerState::new()),
            error_rate,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EchoError> {
        self.listener.local_addr().context(LocalAddrSnafu)
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Accepts connections until the task is dropped, one task per connection.
    pub async fn serve(self) {
        let Self {
            listener,
            state,
            error_rate,
        } = self;

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(message = "Failed to accept connection.", %error);
                    continue;
                }
            };

            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let service =
                    service_fn(move |request| handle(request, Arc::clone(&state), error_rate));
                if let Err(error) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(message = "Connection closed with error.", %peer, %error);
                }
            });
        }
    }
}

async fn handle(
    request: Request<Incoming>,
    state: Arc<ServerState>,
    error_rate: f64,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if request.uri().path() != WORK_PATH {
        return Ok(detail(StatusCode::NOT_FOUND, "Not Found"));
    }
    if request.method() != Method::POST {
        return Ok(detail(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => return Ok(detail(StatusCode::BAD_REQUEST, &error.to_string())),
    };
    let item: EchoRequest = match serde_json::from_slice(&body) {
        Ok(item) => item,
        Err(error) => return Ok(detail(StatusCode::UNPROCESSABLE_ENTITY, &error.to_string())),
    };

    let _inflight = state.enter();

    if error_rate > 0.0 && rand::random_bool(error_rate) {
        state.record_failed();
        trace!(message = "Injected failure.", item_id = item.item_id);
        return Ok(detail(StatusCode::SERVICE_UNAVAILABLE, "Injected error mode"));
    }

    state.record_completed();
    let echoed = EchoResponse {
        item_id: item.item_id,
        payload: item.payload,
        error_mode: error_rate > 0.0,
        server_state: state.snapshot(),
    };
    Ok(json_response(StatusCode::OK, &echoed))
}

#[derive(Serialize)]
struct Detail<'a> {
    detail: &'a str,
}

fn detail(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &Detail { detail: message })
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(error) => {
            error!(message = "Failed to encode response body.", %error);
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
