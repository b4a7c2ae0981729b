use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kissgate_frame::{FrameError, FrameReader};
use kissgate_transport::RadioStream;
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, MonitorArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

/// How often a blocked read wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let stream =
        RadioStream::connect(&args.tnc).map_err(|err| transport_error("connect failed", err))?;
    stream
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| transport_error("connect failed", err))?;
    info!(tnc = %args.tnc, transport = stream.transport_name(), "monitoring TNC");

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    install_ctrlc_handler(move || flag.store(false, Ordering::SeqCst))?;

    let mut reader = FrameReader::new(stream);
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(err) if err.is_recoverable() => {
                debug!(error = %err, "skipping malformed frame");
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                info!(printed, "TNC closed the link");
                break;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        if let Some(port) = args.port {
            if frame.port != port {
                continue;
            }
        }

        print_frame(&frame, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}
