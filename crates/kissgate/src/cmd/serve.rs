use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kissgate_chat::{
    spawn_keepalive, spawn_snapshots, Bridge, Directory, Loaded, Outbox, Session, Shutdown,
};
use kissgate_tnc::Tnc;
use kissgate_transport::ChatListener;
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ServeArgs};
use crate::exit::{
    io_error, persist_error, tnc_error, transport_error, CliError, CliResult, SUCCESS,
    TRANSPORT_ERROR,
};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let snapshot_interval = parse_duration(&args.snapshot_interval)?;
    let ping_interval = parse_duration(&args.ping_interval)?;

    let mut directory = Directory::new(args.name.clone(), !args.no_auto_join);
    if let Some(motd) = &args.motd {
        directory = directory.with_motd(motd.clone());
    }
    let directory = Arc::new(directory);

    if !args.no_persist {
        match directory.load(&args.state) {
            Ok(Loaded::Missing) => {}
            Ok(Loaded::Restored { users, channels }) => {
                info!(users, channels, "restored directory");
            }
            Err(err) if args.tolerate_load_errors => {
                warn!(error = %err, "ignoring unreadable state, starting empty");
            }
            Err(err) => return Err(persist_error("failed to load state", err)),
        }
    }

    let tnc = Tnc::connect(&args.tnc).map_err(|err| tnc_error("TNC connect failed", err))?;
    let port = tnc
        .port(args.tnc_port)
        .map_err(|err| tnc_error("TNC port", err))?;
    directory.attach_radio(Arc::new(port.clone()));

    let listener =
        ChatListener::bind(&args.listen).map_err(|err| transport_error("listen failed", err))?;
    info!(
        name = %args.name,
        tnc = %args.tnc,
        tnc_port = args.tnc_port,
        listen = %listener.local_addr(),
        "gateway running"
    );

    let shutdown = Shutdown::new();
    let on_signal = Arc::clone(&shutdown);
    install_ctrlc_handler(move || {
        info!("interrupt received, shutting down");
        on_signal.trigger();
    })?;

    let bridge = Bridge::new(Arc::clone(&directory));
    let on_link_loss = Arc::clone(&shutdown);
    thread::Builder::new()
        .name("bridge".into())
        .spawn(move || {
            bridge.run(&port);
            on_link_loss.trigger();
        })
        .map_err(|err| io_error("failed to start bridge", err))?;

    let keepalive = spawn_keepalive(Arc::clone(&directory), ping_interval, Arc::clone(&shutdown))
        .map_err(|err| io_error("failed to start keepalive", err))?;
    let snapshots = if args.no_persist {
        None
    } else {
        let handle = spawn_snapshots(
            Arc::clone(&directory),
            args.state.clone(),
            snapshot_interval,
            Arc::clone(&shutdown),
        )
        .map_err(|err| io_error("failed to start snapshots", err))?;
        Some(handle)
    };

    let accept_directory = Arc::clone(&directory);
    let accept_shutdown = Arc::clone(&shutdown);
    thread::Builder::new()
        .name("accept".into())
        .spawn(move || accept_loop(&listener, &accept_directory, &accept_shutdown))
        .map_err(|err| io_error("failed to start accept loop", err))?;

    shutdown.wait();

    let _ = keepalive.join();
    if let Some(handle) = snapshots {
        let _ = handle.join();
    }
    if !args.no_persist {
        directory
            .save(&args.state)
            .map_err(|err| persist_error("final state save failed", err))?;
        info!(path = %args.state.display(), "state saved");
    }

    if tnc.is_closed() {
        return Err(CliError::new(TRANSPORT_ERROR, "radio link lost"));
    }
    Ok(SUCCESS)
}

/// Pause after a failed accept; EMFILE and friends clear as clients leave.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A single blocked write to a client gives up after this long.
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

trait Incoming {
    fn accept(&self) -> kissgate_transport::Result<(TcpStream, SocketAddr)>;
}

impl Incoming for ChatListener {
    fn accept(&self) -> kissgate_transport::Result<(TcpStream, SocketAddr)> {
        ChatListener::accept(self)
    }
}

fn accept_loop(listener: &impl Incoming, directory: &Arc<Directory>, shutdown: &Shutdown) {
    while !shutdown.is_triggered() {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed, retrying");
                shutdown.wait_timeout(ACCEPT_BACKOFF);
                continue;
            }
        };
        if let Err(err) = spawn_session(stream, peer, Arc::clone(directory)) {
            warn!(peer = %peer, error = %err, "dropping client");
        }
    }
}

fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    directory: Arc<Directory>,
) -> std::io::Result<()> {
    stream.set_write_timeout(Some(CLIENT_WRITE_TIMEOUT))?;
    let writer = stream.try_clone()?;
    thread::Builder::new()
        .name(format!("client-{peer}"))
        .spawn(move || {
            debug!(peer = %peer, "client connected");
            Session::new(directory, Outbox::new(writer), peer.to_string())
                .run(BufReader::new(stream));
        })?;
    Ok(())
}
