use std::fs;

use kissgate_frame::{Frame, FrameWriter, DATA};
use kissgate_transport::RadioStream;
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;

    let stream =
        RadioStream::connect(&args.tnc).map_err(|err| transport_error("connect failed", err))?;

    let mut writer = FrameWriter::new(stream);
    writer
        .write_frame(&Frame::new(args.port, DATA, payload.clone()))
        .map_err(|err| frame_error("send failed", err))?;

    info!(tnc = %args.tnc, port = args.port, len = payload.len(), "frame sent");
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --data or --file is required"))
}
