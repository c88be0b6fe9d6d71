//! Per-connection session worker.
//!
//! Each accepted collector connection gets one session task running a small
//! state machine: commands arriving on the socket flip the streaming flag or
//! request configuration/header frames, while a pacing timer drains the
//! session's delivery queue at the configured data rate. Outbound frames are
//! cloned from the shared device state and stamped on the clone, so one
//! session's timestamp never leaks into another's bytes.

use super::events::{EventBus, PmuEvent};
use super::queue::{DeliveryQueue, Outbound};
use super::server::DeviceState;
use crate::ieee_c37_118::commands::CommandType;
use crate::ieee_c37_118::common::{ParseError, MIN_FRAME_SIZE};
use crate::ieee_c37_118::frame::Frame;
use crate::ieee_c37_118::utils::now_soc_fracsec;
use bytes::BytesMut;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;

// Pacing fallback while the queue is polled with a zero-interval rate.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) struct SessionContext {
    pub state: Arc<RwLock<DeviceState>>,
    pub queue: Arc<DeliveryQueue>,
    pub events: EventBus,
    pub token: CancellationToken,
    pub buffer_size: usize,
}

/// Runs one collector session to completion.
pub(crate) async fn run_session(mut sock: TcpStream, peer: SocketAddr, ctx: SessionContext) {
    let mut buf = BytesMut::with_capacity(ctx.buffer_size);
    let mut streaming = false;

    loop {
        // Re-read the interval every cycle so rate changes reach live
        // sessions.
        let delay = {
            let state = ctx.state.read();
            let interval = state
                .cfg2
                .as_ref()
                .map(|cfg| cfg.interval())
                .unwrap_or(Duration::ZERO);
            if interval.is_zero() {
                MIN_POLL_INTERVAL
            } else {
                interval
            }
        };

        tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                break;
            }
            result = sock.read_buf(&mut buf) => {
                match result {
                    Ok(0) => {
                        log::info!("Connection closed by {}", peer);
                        break;
                    }
                    Ok(_) => {
                        if !drain_frames(&mut sock, peer, &mut buf, &mut streaming, &ctx).await {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Read error from {}: {}", peer, e);
                        break;
                    }
                }
            }
            _ = time::sleep(delay), if streaming => {
                if let Some(item) = ctx.queue.pop() {
                    if let Err(e) = send_outbound(&mut sock, item, &ctx).await {
                        log::warn!("Write error to {}: {}", peer, e);
                        break;
                    }
                }
            }
        }
    }

    ctx.events.emit(PmuEvent::ClientDisconnected { peer });
}

/// Processes every complete frame buffered so far. Returns false when the
/// session should close.
async fn drain_frames(
    sock: &mut TcpStream,
    peer: SocketAddr,
    buf: &mut BytesMut,
    streaming: &mut bool,
    ctx: &SessionContext,
) -> bool {
    loop {
        let frame_bytes = match extract_frame(buf) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return true,
            Err(e) => {
                // Recovery from a framing violation: drop the buffered
                // bytes and resynchronize on the next message.
                log::warn!("Framing violation from {}: {}", peer, e);
                buf.clear();
                return true;
            }
        };

        let cfg2 = ctx.state.read().cfg2.clone();
        let frame = match Frame::decode(&frame_bytes, cfg2.as_ref()) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Undecodable frame from {}: {}", peer, e);
                continue;
            }
        };

        match frame {
            Frame::Command(cmd) => {
                let description = cmd.command_description();
                log::info!("[{}] - received command: {}", cmd.prefix.idcode, description);
                ctx.events.emit(PmuEvent::CommandReceived { peer, description });

                if !handle_command(sock, peer, cmd.command_type(), streaming, ctx).await {
                    return false;
                }
            }
            other => {
                log::warn!(
                    "Ignoring unexpected {} from {}",
                    other.frame_type(),
                    peer
                );
            }
        }
    }
}

/// Applies one command. Returns false when a write failure should close the
/// session.
async fn handle_command(
    sock: &mut TcpStream,
    peer: SocketAddr,
    command: Option<CommandType>,
    streaming: &mut bool,
    ctx: &SessionContext,
) -> bool {
    let response = match command {
        Some(CommandType::TurnOnTransmission) => {
            *streaming = true;
            None
        }
        Some(CommandType::TurnOffTransmission) => {
            *streaming = false;
            None
        }
        Some(CommandType::SendConfigFrame1) => {
            let state = ctx.state.read();
            state.cfg1.clone().map(Frame::Config1)
        }
        Some(CommandType::SendConfigFrame2) => {
            let state = ctx.state.read();
            state.cfg2.clone().map(Frame::Config2)
        }
        Some(CommandType::SendConfigFrame3) => {
            // A device without CFG-3 leaves the request unanswered.
            let state = ctx.state.read();
            state.cfg3.clone().map(Frame::Config3)
        }
        Some(CommandType::SendHeaderFrame) => {
            let state = ctx.state.read();
            state.header.clone().map(Frame::Header)
        }
        Some(CommandType::SendExtendedFrame) | None => None,
    };

    if let Some(frame) = response {
        if let Err(e) = send_outbound(sock, Outbound::Frame(frame), ctx).await {
            log::warn!("Write error to {}: {}", peer, e);
            return false;
        }
    }
    true
}

/// Stamps (a clone of) the frame if timestamping is enabled, encodes it and
/// writes the bytes. Raw items bypass stamping entirely.
async fn send_outbound(
    sock: &mut TcpStream,
    item: Outbound,
    ctx: &SessionContext,
) -> std::io::Result<()> {
    let bytes = match item {
        Outbound::Frame(mut frame) => {
            let (stamp, time_base) = {
                let state = ctx.state.read();
                let time_base = state
                    .cfg2
                    .as_ref()
                    .map(|cfg| cfg.time_base)
                    .unwrap_or(1_000_000);
                (state.set_timestamp, time_base)
            };
            if stamp {
                let (soc, fracsec) = now_soc_fracsec(time_base);
                frame.set_time(soc, fracsec);
            }
            frame.to_hex()
        }
        Outbound::Raw(bytes) => bytes,
    };
    sock.write_all(&bytes).await
}

/// Pulls one complete frame off the front of the receive buffer.
///
/// Returns `Ok(None)` when more bytes are needed, and an error when the
/// buffered bytes cannot be the start of a frame (bad lead byte or an
/// impossible declared size).
fn extract_frame(buf: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    if buf[0] != 0xAA {
        return Err(ParseError::InvalidHeader {
            message: format!("Invalid lead byte: 0x{:02X}, expected 0xAA", buf[0]),
        });
    }
    let declared = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if declared < MIN_FRAME_SIZE {
        return Err(ParseError::InvalidLength {
            message: format!(
                "Declared frame size {} is below the {}-byte minimum",
                declared, MIN_FRAME_SIZE
            ),
        });
    }
    if buf.len() < declared {
        return Ok(None);
    }
    Ok(Some(buf.split_to(declared)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::commands::CommandFrame;

    #[test]
    fn test_extract_frame_waits_for_completion() {
        let frame = CommandFrame::new_turn_on_transmission(7734, None).to_hex();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&frame[..3]);
        assert!(extract_frame(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[3..10]);
        assert!(extract_frame(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[10..]);
        let extracted = extract_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&extracted[..], &frame[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_frame_splits_coalesced_messages() {
        let a = CommandFrame::new_turn_on_transmission(1, None).to_hex();
        let b = CommandFrame::new_turn_off_transmission(1, None).to_hex();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);

        assert_eq!(&extract_frame(&mut buf).unwrap().unwrap()[..], &a[..]);
        assert_eq!(&extract_frame(&mut buf).unwrap().unwrap()[..], &b[..]);
        assert!(extract_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_extract_frame_rejects_garbage() {
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x02, 0x03][..]);
        assert!(extract_frame(&mut buf).is_err());

        // Declared size below the envelope minimum.
        let mut buf = BytesMut::from(&[0xAA, 0x42, 0x00, 0x04][..]);
        assert!(extract_frame(&mut buf).is_err());
    }
}
