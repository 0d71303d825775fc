//! RPC Skeleton (server side)
//!
//! A `Skeleton` binds one remote interface to one implementation object and serves it
//! over TCP.
//!
//! ## Lifecycle
//! `Unbound` (no configured address) or `Bound` (configured address) -> `Listening`
//! after `start` -> `Stopped` after `stop` or a fatal accept error. A stopped skeleton is
//! never restarted; create a new one instead.
//!
//! ## Tasks
//! - **Accept loop**: one task per skeleton, accepting connections until shut down.
//! - **Connection tasks**: one per accepted connection, performing a single
//!   request/response exchange before closing.

use super::error::{RpcError, SetupError};
use super::protocol::{
    CallFrame, ReplyFrame, RemoteInterface, check_remote_interface, read_frame, write_frame,
};

use std::future::Future;
use std::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Future returned by `Dispatch::dispatch`.
pub type DispatchFuture<'a, I> = Pin<
    Box<
        dyn Future<
                Output = Result<<I as RemoteInterface>::Reply, <I as RemoteInterface>::Error>,
            > + Send
            + 'a,
    >,
>;

/// Implemented by objects that serve a remote interface.
pub trait Dispatch<I: RemoteInterface>: Send + Sync + 'static {
    fn dispatch(&self, call: I::Call) -> DispatchFuture<'_, I>;
}

/// Customization points for top-level failures of a skeleton.
///
/// The defaults stop the skeleton on the first accept failure and ignore everything else.
pub trait SkeletonHooks: Send + Sync + 'static {
    /// Called when accepting a connection fails.
    ///
    /// Returns `true` to keep accepting, `false` to stop the skeleton. The error is then
    /// passed again to `stopped`.
    fn listen_error(&self, error: &std::io::Error) -> bool {
        let _ = error;
        false
    }

    /// Called when serving a single connection fails. Never affects the accept loop.
    fn service_error(&self, error: &RpcError) {
        let _ = error;
    }

    /// Called exactly once when the skeleton stops, with the error that stopped it or
    /// `None` after a call to `stop`.
    fn stopped(&self, cause: Option<&std::io::Error>) {
        let _ = cause;
    }
}

pub struct DefaultHooks;

impl SkeletonHooks for DefaultHooks {}

/// Hooks for long-running servers: keeps accepting after transient accept failures and
/// logs why the skeleton stopped.
pub struct ServerHooks {
    pub server: &'static str,
}

impl SkeletonHooks for ServerHooks {
    fn listen_error(&self, error: &std::io::Error) -> bool {
        // Running out of file descriptors or a peer resetting before accept is transient.
        !matches!(
            error.kind(),
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::PermissionDenied
        )
    }

    fn stopped(&self, cause: Option<&std::io::Error>) {
        match cause {
            Some(e) => tracing::error!("{} stopped: {}", self.server, e),
            None => tracing::info!("{} stopped", self.server),
        }
    }
}

pub(super) enum Lifecycle {
    Unbound,
    Bound(SocketAddr),
    Starting(Option<SocketAddr>),
    Listening {
        address: SocketAddr,
        shutdown: oneshot::Sender<()>,
        accept_loop: JoinHandle<()>,
    },
    Stopped(Option<SocketAddr>),
}

impl Lifecycle {
    fn address(&self) -> Option<SocketAddr> {
        match self {
            Lifecycle::Unbound => None,
            Lifecycle::Bound(address) => Some(*address),
            Lifecycle::Starting(address) | Lifecycle::Stopped(address) => *address,
            Lifecycle::Listening { address, .. } => Some(*address),
        }
    }

    /// Moves a listening skeleton whose accept loop has exited to `Stopped`.
    ///
    /// The loop only exits on its own after a fatal accept error; `stop` replaces the
    /// state before signalling shutdown.
    fn settle(&mut self) {
        let exited = match self {
            Lifecycle::Listening {
                address,
                accept_loop,
                ..
            } if accept_loop.is_finished() => Some(*address),
            _ => None,
        };

        if let Some(address) = exited {
            *self = Lifecycle::Stopped(Some(address));
        }
    }
}

pub struct Skeleton<I: RemoteInterface, D: Dispatch<I>> {
    server: Arc<D>,
    hooks: Arc<dyn SkeletonHooks>,
    lifecycle: Mutex<Lifecycle>,
    stop_reported: Arc<AtomicBool>,
    _interface: PhantomData<fn() -> I>,
}

impl<I: RemoteInterface, D: Dispatch<I>> Skeleton<I, D> {
    /// Creates a skeleton whose address is picked by the system on `start`.
    pub fn new(server: Arc<D>) -> Result<Self, SetupError> {
        Self::with_lifecycle(server, Lifecycle::Unbound)
    }

    /// Creates a skeleton that will listen on `address`.
    pub fn with_address(server: Arc<D>, address: SocketAddr) -> Result<Self, SetupError> {
        Self::with_lifecycle(server, Lifecycle::Bound(address))
    }

    pub(super) fn with_lifecycle(
        server: Arc<D>,
        lifecycle: Lifecycle,
    ) -> Result<Self, SetupError> {
        check_remote_interface::<I>()?;

        Ok(Self {
            server,
            hooks: Arc::new(DefaultHooks),
            lifecycle: Mutex::new(lifecycle),
            stop_reported: Arc::new(AtomicBool::new(false)),
            _interface: PhantomData,
        })
    }

    pub fn with_hooks(mut self, hooks: impl SkeletonHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// The configured or bound address, if there is one yet.
    pub fn address(&self) -> Option<SocketAddr> {
        self.lock().address()
    }

    /// True while the accept loop is running.
    pub fn is_listening(&self) -> bool {
        matches!(&*self.lock(), Lifecycle::Listening { .. })
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        let mut lifecycle = self
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lifecycle.settle();
        lifecycle
    }

    /// Binds the listening socket and spawns the accept loop.
    ///
    /// Returns the bound address once the skeleton accepts connections.
    pub async fn start(&self) -> Result<SocketAddr, SetupError> {
        let requested = {
            let mut lifecycle = self.lock();
            let requested = match &*lifecycle {
                Lifecycle::Unbound => None,
                Lifecycle::Bound(address) => Some(*address),
                Lifecycle::Starting(_) | Lifecycle::Listening { .. } => {
                    return Err(SetupError::AlreadyRunning(I::NAME));
                }
                Lifecycle::Stopped(_) => return Err(SetupError::Stopped(I::NAME)),
            };
            *lifecycle = Lifecycle::Starting(requested);
            requested
        };

        let bind_to = requested.unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));
        let bound = match TcpListener::bind(bind_to).await {
            Ok(listener) => listener.local_addr().map(|address| (listener, address)),
            Err(e) => Err(e),
        };

        let mut lifecycle = self.lock();
        if !matches!(&*lifecycle, Lifecycle::Starting(_)) {
            // stop() ran while the socket was being bound.
            return Err(SetupError::Stopped(I::NAME));
        }

        let (listener, address) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                *lifecycle = match requested {
                    Some(address) => Lifecycle::Bound(address),
                    None => Lifecycle::Unbound,
                };
                return Err(SetupError::Bind {
                    address: bind_to,
                    source,
                });
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let accept_loop = tokio::spawn(accept_loop::<I, D>(
            listener,
            self.server.clone(),
            self.hooks.clone(),
            self.stop_reported.clone(),
            shutdown_rx,
        ));

        *lifecycle = Lifecycle::Listening {
            address,
            shutdown,
            accept_loop,
        };

        tracing::info!("{} listening on {}", I::NAME, address);

        Ok(address)
    }

    /// Closes the listening socket and waits for the accept loop to exit.
    ///
    /// Connections already being served run to completion. Safe to call on a skeleton that
    /// was never started or is already stopped.
    pub async fn stop(&self) {
        let previous = {
            let mut lifecycle = self.lock();
            let address = lifecycle.address();
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped(address))
        };

        if let Lifecycle::Listening {
            address,
            shutdown,
            accept_loop,
        } = previous
        {
            let _ = shutdown.send(());
            if let Err(e) = accept_loop.await {
                tracing::error!("{} accept loop on {} ended abnormally: {}", I::NAME, address, e);
            }
            tracing::info!("{} on {} stopped", I::NAME, address);
        }

        if !self.stop_reported.swap(true, Ordering::SeqCst) {
            self.hooks.stopped(None);
        }
    }
}

async fn accept_loop<I: RemoteInterface, D: Dispatch<I>>(
    listener: TcpListener,
    server: Arc<D>,
    hooks: Arc<dyn SkeletonHooks>,
    stop_reported: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!("{} accept loop shutting down", I::NAME);
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("{} accepted connection from {}", I::NAME, peer);

                    let server = server.clone();
                    let hooks = hooks.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection::<I, D>(server.as_ref(), stream, peer).await {
                            tracing::warn!("{} failed to serve {}: {}", I::NAME, peer, e);
                            hooks.service_error(&e);
                        }
                    });
                }
                Err(e) => {
                    if hooks.listen_error(&e) {
                        tracing::warn!("{} accept failed, continuing: {}", I::NAME, e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }

                    tracing::error!("{} accept failed, stopping: {}", I::NAME, e);
                    if !stop_reported.swap(true, Ordering::SeqCst) {
                        hooks.stopped(Some(&e));
                    }
                    break;
                }
            }
        }
    }
}

/// Performs the single request/response exchange of one connection.
async fn serve_connection<I: RemoteInterface, D: Dispatch<I>>(
    server: &D,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), RpcError> {
    let frame: CallFrame = read_frame(&mut stream)
        .await
        .map_err(|e| RpcError::from_io(peer, e))?;

    let (reply, failure) = match frame.decode::<I>() {
        Ok(call) => {
            tracing::trace!("{} <- {}: {:?}", I::NAME, peer, call);
            let reply = match server.dispatch(call).await {
                Ok(value) => ReplyFrame::returned(&value)?,
                Err(error) => ReplyFrame::raised(&error)?,
            };
            (reply, None)
        }
        Err(e) => (ReplyFrame::raised(&I::Error::from(e.clone()))?, Some(e)),
    };

    write_frame(&mut stream, &reply)
        .await
        .map_err(|e| RpcError::from_io(peer, e))?;
    let _ = stream.shutdown().await;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
