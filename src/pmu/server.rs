//! The PMU device: configuration model, TCP accept loop, session registry
//! and measurement broadcast.

use super::error::PmuError;
use super::events::{EventBus, PmuEvent};
use super::queue::{DeliveryQueue, Outbound};
use super::session::{run_session, SessionContext};
use crate::ieee_c37_118::common::StatField;
use crate::ieee_c37_118::config::{ConfigurationFrame, DataFormat};
use crate::ieee_c37_118::data_frame::{AnalogValue, DataFrame, FreqValue};
use crate::ieee_c37_118::frame::Frame;
use crate::ieee_c37_118::header::HeaderFrame;
use crate::ieee_c37_118::phasors::PhasorValue;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Device server settings.
#[derive(Debug, Clone)]
pub struct PmuSettings {
    /// Device and stream identification code.
    pub idcode: u16,
    /// DATA_RATE: positive frames per second, negative seconds per frame.
    pub data_rate: i16,
    pub ip: String,
    pub port: u16,
    /// Receive buffer capacity and per-session delivery queue depth.
    pub buffer_size: usize,
    /// Stamp outbound frames with the current time at send.
    pub set_timestamp: bool,
}

impl Default for PmuSettings {
    fn default() -> Self {
        PmuSettings {
            idcode: 7734,
            data_rate: 30,
            ip: "127.0.0.1".to_string(),
            port: 4712,
            buffer_size: 2048,
            set_timestamp: true,
        }
    }
}

/// Shared mutable device state read by every session.
pub(crate) struct DeviceState {
    pub cfg1: Option<ConfigurationFrame>,
    pub cfg2: Option<ConfigurationFrame>,
    pub cfg3: Option<ConfigurationFrame>,
    pub header: Option<HeaderFrame>,
    pub set_timestamp: bool,
}

struct SessionHandle {
    peer: SocketAddr,
    queue: Arc<DeliveryQueue>,
    task: JoinHandle<()>,
}

/// An IEEE C37.118 PMU endpoint.
///
/// Install a CFG-2 frame with [`set_configuration`](Pmu::set_configuration),
/// start the listener with [`run`](Pmu::run), then feed measurements through
/// [`send_data`](Pmu::send_data). Each connected collector drives its own
/// streaming state with command frames; measurements are fanned out through
/// bounded per-session queues, so a slow collector loses its own oldest
/// frames without affecting anyone else.
pub struct Pmu {
    settings: PmuSettings,
    state: Arc<RwLock<DeviceState>>,
    sessions: Arc<Mutex<Vec<SessionHandle>>>,
    events: EventBus,
    token: CancellationToken,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Pmu {
    pub fn new(settings: PmuSettings) -> Self {
        let state = DeviceState {
            cfg1: None,
            cfg2: None,
            cfg3: None,
            header: None,
            set_timestamp: settings.set_timestamp,
        };
        Pmu {
            settings,
            state: Arc::new(RwLock::new(state)),
            sessions: Arc::new(Mutex::new(Vec::new())),
            events: EventBus::new(),
            token: CancellationToken::new(),
            listener_task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Installs a configuration frame.
    ///
    /// A CFG-2 becomes the authoritative stream description; the CFG-1
    /// capability frame is rederived from it and the new CFG-2 is broadcast
    /// to connected collectors. A CFG-3 is stored as the extended
    /// descriptor. CFG-1 input is rejected: the capability frame is always
    /// derived, never authored independently.
    pub fn set_configuration(&self, frame: ConfigurationFrame) -> Result<(), PmuError> {
        match frame.cfg_type {
            2 => {
                frame.pmu.validate().map_err(|e| {
                    PmuError::InvalidConfiguration(e.to_string())
                })?;
                let broadcast = frame.clone();
                {
                    let mut state = self.state.write();
                    state.cfg1 = Some(frame.to_config1());
                    state.cfg2 = Some(frame);
                }
                self.events.emit(PmuEvent::ConfigurationChanged);
                log::info!("[{}] - configuration changed", self.idcode());
                self.send(Frame::Config2(broadcast));
                Ok(())
            }
            3 => {
                self.state.write().cfg3 = Some(frame);
                self.events.emit(PmuEvent::ConfigurationChanged);
                Ok(())
            }
            other => Err(PmuError::InvalidConfiguration(format!(
                "cannot install a CFG-{} frame; CFG-1 is derived from CFG-2",
                other
            ))),
        }
    }

    /// Sets the header text collectors receive for `SendHeaderFrame`.
    pub fn set_header(&self, text: impl Into<String>) {
        let header = HeaderFrame::new(self.idcode(), text);
        self.set_header_frame(header);
    }

    pub fn set_header_frame(&self, header: HeaderFrame) {
        self.state.write().header = Some(header);
    }

    /// Changes the device IDCODE across every stored frame and broadcasts
    /// the updated CFG-2.
    pub fn set_id(&self, idcode: u16) -> Result<(), PmuError> {
        let broadcast = {
            let mut state = self.state.write();
            let cfg2 = state.cfg2.as_mut().ok_or(PmuError::NotConfigured)?;
            cfg2.set_id_code(idcode);
            let updated = cfg2.clone();
            state.cfg1 = Some(updated.to_config1());
            if let Some(cfg3) = state.cfg3.as_mut() {
                cfg3.set_id_code(idcode);
            }
            if let Some(header) = state.header.as_mut() {
                header.prefix.idcode = idcode;
            }
            updated
        };
        self.events.emit(PmuEvent::IdChanged { idcode });
        log::info!("[{}] - id code changed", idcode);
        self.send(Frame::Config2(broadcast));
        Ok(())
    }

    /// Changes the reporting rate and broadcasts the updated CFG-2. Live
    /// sessions pick the new pacing interval up on their next cycle.
    pub fn set_data_rate(&self, data_rate: i16) -> Result<(), PmuError> {
        let broadcast = {
            let mut state = self.state.write();
            let cfg2 = state.cfg2.as_mut().ok_or(PmuError::NotConfigured)?;
            cfg2.set_data_rate(data_rate);
            let updated = cfg2.clone();
            state.cfg1 = Some(updated.to_config1());
            updated
        };
        self.events.emit(PmuEvent::DataRateChanged { data_rate });
        log::info!("[{}] - data rate changed to {}", self.idcode(), data_rate);
        self.send(Frame::Config2(broadcast));
        Ok(())
    }

    /// Changes the FORMAT word across CFG-1/CFG-2 and broadcasts the
    /// updated CFG-2. Subsequent [`send_data`](Pmu::send_data) calls must
    /// supply measurements in the new encodings.
    pub fn set_data_format(&self, format: DataFormat) -> Result<(), PmuError> {
        let broadcast = {
            let mut state = self.state.write();
            let cfg2 = state.cfg2.as_mut().ok_or(PmuError::NotConfigured)?;
            cfg2.pmu.format = format;
            let updated = cfg2.clone();
            state.cfg1 = Some(updated.to_config1());
            updated
        };
        self.events.emit(PmuEvent::ConfigurationChanged);
        log::info!("[{}] - data format changed", self.idcode());
        self.send(Frame::Config2(broadcast));
        Ok(())
    }

    /// Binds the listener and starts accepting collector connections.
    ///
    /// Fails with [`PmuError::NotConfigured`] before a CFG-2 is installed.
    /// Returns once the listener is bound; sessions run in the background
    /// until [`stop`](Pmu::stop).
    pub async fn run(&self) -> Result<(), PmuError> {
        if self.state.read().cfg2.is_none() {
            return Err(PmuError::NotConfigured);
        }

        let listener = TcpListener::bind((self.settings.ip.as_str(), self.settings.port)).await?;
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);
        self.events.emit(PmuEvent::Listening { addr });
        log::info!("[{}] - listening for connections on {}", self.idcode(), addr);

        let state = Arc::clone(&self.state);
        let sessions = Arc::clone(&self.sessions);
        let events = self.events.clone();
        let token = self.token.clone();
        let buffer_size = self.settings.buffer_size;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    accepted = listener.accept() => {
                        let (sock, peer) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                log::warn!("Accept error: {}", e);
                                continue;
                            }
                        };
                        log::info!("Connection from {}", peer);
                        events.emit(PmuEvent::ClientConnected { peer });

                        let queue = Arc::new(DeliveryQueue::new(buffer_size));
                        let ctx = SessionContext {
                            state: Arc::clone(&state),
                            queue: Arc::clone(&queue),
                            events: events.clone(),
                            token: token.child_token(),
                            buffer_size,
                        };
                        let session = tokio::spawn(run_session(sock, peer, ctx));
                        sessions.lock().push(SessionHandle {
                            peer,
                            queue,
                            task: session,
                        });
                    }
                }
            }
        });
        *self.listener_task.lock() = Some(task);
        Ok(())
    }

    /// Stops the listener and terminates every session. Idempotent; a
    /// stopped device stays stopped.
    pub async fn stop(&self) {
        self.token.cancel();
        let task = self.listener_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        let handles: Vec<SessionHandle> = self.sessions.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.task.await;
            log::debug!("Session for {} terminated", handle.peer);
        }
        *self.local_addr.lock() = None;
        self.events.emit(PmuEvent::Stopped);
        log::info!("[{}] - server stopped", self.idcode());
    }

    /// Queues a frame for delivery to every connected collector.
    ///
    /// Non-blocking: each session has a bounded queue that drops its oldest
    /// entry on overflow. The frame is stamped and encoded per session at
    /// send time.
    pub fn send(&self, frame: Frame) {
        self.fan_out(Outbound::Frame(frame));
    }

    /// Queues pre-encoded bytes for delivery, bypassing stamping.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        self.fan_out(Outbound::Raw(bytes));
    }

    /// Builds a data frame from measurement values, validated against the
    /// installed CFG-2, and queues it for delivery.
    #[allow(clippy::too_many_arguments)]
    pub fn send_data(
        &self,
        stat: StatField,
        phasors: Vec<PhasorValue>,
        freq: FreqValue,
        dfreq: FreqValue,
        analog: Vec<AnalogValue>,
        digital: Vec<u16>,
    ) -> Result<(), PmuError> {
        let cfg2 = self
            .state
            .read()
            .cfg2
            .clone()
            .ok_or(PmuError::NotConfigured)?;
        let frame = DataFrame::new(&cfg2, stat, phasors, freq, dfreq, analog, digital)?;
        self.send(Frame::Data(frame));
        Ok(())
    }

    fn fan_out(&self, item: Outbound) {
        let mut sessions = self.sessions.lock();
        sessions.retain(|handle| !handle.task.is_finished());
        for handle in sessions.iter() {
            handle.queue.push(item.clone());
        }
    }

    /// The bound listener address, available while running. With port 0 the
    /// kernel-assigned port shows up here.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Subscribes to the device's lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PmuEvent> {
        self.events.subscribe()
    }

    /// Number of live collector sessions.
    pub fn session_count(&self) -> usize {
        let mut sessions = self.sessions.lock();
        sessions.retain(|handle| !handle.task.is_finished());
        sessions.len()
    }

    fn idcode(&self) -> u16 {
        self.state
            .read()
            .cfg2
            .as_ref()
            .map(|cfg| cfg.prefix.idcode)
            .unwrap_or(self.settings.idcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::random::sample_configuration_frame;

    #[tokio::test]
    async fn test_run_requires_configuration() {
        let pmu = Pmu::new(PmuSettings {
            port: 0,
            ..Default::default()
        });
        assert!(matches!(pmu.run().await, Err(PmuError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_cfg1_input_rejected() {
        let pmu = Pmu::new(PmuSettings::default());
        let cfg1 = sample_configuration_frame(7734, 30).to_config1();
        assert!(matches!(
            pmu.set_configuration(cfg1),
            Err(PmuError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_set_id_rederives_cfg1() {
        let pmu = Pmu::new(PmuSettings::default());
        pmu.set_configuration(sample_configuration_frame(7734, 30))
            .unwrap();
        pmu.set_id(780).unwrap();

        let state = pmu.state.read();
        let cfg1 = state.cfg1.as_ref().unwrap();
        let cfg2 = state.cfg2.as_ref().unwrap();
        assert_eq!(cfg1.prefix.idcode, 780);
        assert_eq!(cfg1.pmu.idcode, 780);
        assert_eq!(cfg2.prefix.idcode, 780);
        assert_eq!(cfg1.cfg_type, 1);
    }

    #[tokio::test]
    async fn test_set_data_format_rewrites_both_views() {
        let pmu = Pmu::new(PmuSettings::default());
        pmu.set_configuration(sample_configuration_frame(7734, 30))
            .unwrap();

        let format = DataFormat {
            polar: true,
            phasor_float: true,
            analog_float: true,
            freq_float: true,
        };
        pmu.set_data_format(format).unwrap();

        let state = pmu.state.read();
        assert_eq!(state.cfg2.as_ref().unwrap().pmu.format, format);
        assert_eq!(state.cfg1.as_ref().unwrap().pmu.format, format);
        // The derived frame layout follows: float phasors are 8 bytes.
        assert_eq!(state.cfg2.as_ref().unwrap().pmu.phasor_size(), 8);
    }

    #[tokio::test]
    async fn test_set_data_format_requires_configuration() {
        let pmu = Pmu::new(PmuSettings::default());
        assert!(matches!(
            pmu.set_data_format(DataFormat::default()),
            Err(PmuError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_set_data_rate_requires_configuration() {
        let pmu = Pmu::new(PmuSettings::default());
        assert!(matches!(
            pmu.set_data_rate(5),
            Err(PmuError::NotConfigured)
        ));
    }
}
