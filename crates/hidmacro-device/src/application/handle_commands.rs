//! CommandHandler: turns one protocol line into exactly one reply.
//!
//! The handler owns every piece of mutable device state (the macro store,
//! the playback engine and the report codec), so there is exactly one writer
//! of the pointer report.  The scheduler calls [`CommandHandler::handle_line`]
//! for each inbound line and [`CommandHandler::tick`] between lines.
//!
//! # Error policy
//!
//! Everything a host can get wrong (bad syntax, unknown macro, malformed JSON,
//! a one-shot move during playback) becomes an `ERROR` or `UNKNOWN` reply and
//! leaves state untouched.  The only error that escapes is
//! [`CodecError::TransportFatal`]: the HID endpoint is gone and the device
//! cannot do anything useful until it is re-enumerated.

use std::sync::Arc;
use std::time::Duration;

use hidmacro_core::{
    parse_command, Action, Clock, CodecError, Command, MacroStore, PlaybackEngine,
    PlaybackState, ReportCodec, Reply, ScreenGeometry, Tick,
};
use tracing::{debug, info, warn};

/// Dispatches parsed commands to the macro store and playback engine.
pub struct CommandHandler {
    store: MacroStore,
    engine: PlaybackEngine,
    codec: ReportCodec,
    clock: Arc<dyn Clock>,
}

impl CommandHandler {
    /// Creates a handler with an empty store and an idle engine.
    pub fn new(engine: PlaybackEngine, codec: ReportCodec, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: MacroStore::new(),
            engine,
            codec,
            clock,
        }
    }

    /// Convenience constructor using the engine's default dwell.
    pub fn with_geometry(geometry: ScreenGeometry, codec: ReportCodec, clock: Arc<dyn Clock>) -> Self {
        Self::new(PlaybackEngine::new(geometry), codec, clock)
    }

    pub fn store(&self) -> &MacroStore {
        &self.store
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.engine.state()
    }

    /// Parses and executes one command line.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] only when the HID transport has failed fatally.
    pub fn handle_line(&mut self, line: &str) -> Result<Reply, CodecError> {
        match parse_command(line) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!("rejected command line: {e}");
                Ok(e.reply())
            }
        }
    }

    /// Executes one parsed command.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] only when the HID transport has failed fatally.
    pub fn handle(&mut self, command: Command) -> Result<Reply, CodecError> {
        debug!("handling {} command", command.keyword());

        match command {
            Command::Ping => Ok(Reply::Pong),

            Command::MacroData { name, payload } => match self.store.put_json(&name, &payload) {
                Ok(()) => Ok(Reply::Ok),
                Err(e) => {
                    warn!("MACRO_DATA rejected: {e}");
                    Ok(Reply::Error)
                }
            },

            Command::Play { name, looping } => {
                let actions = match self.store.get(&name) {
                    Ok(actions) => actions,
                    Err(e) => {
                        warn!("PLAY rejected: {e}");
                        return Ok(Reply::Error);
                    }
                };
                let now = self.clock.now();
                self.engine
                    .start(&name, actions, looping, &mut self.codec, now)?;
                Ok(Reply::Ok)
            }

            Command::Stop => {
                self.engine.request_stop();
                Ok(Reply::Ok)
            }

            Command::List => Ok(Reply::Macros(
                self.store.names().into_iter().map(str::to_string).collect(),
            )),

            Command::Move { x, y } => self.one_shot(Action::Move {
                x,
                y,
                delay: Duration::ZERO,
            }),

            Command::Click { x, y, button } => self.one_shot(Action::Click {
                position: Some((x, y)),
                button,
                delay: Duration::ZERO,
            }),
        }
    }

    /// Advances playback by one step at the current clock time.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the HID transport has failed fatally.
    pub fn tick(&mut self) -> Result<Tick, CodecError> {
        let now = self.clock.now();
        self.engine.advance(&mut self.codec, now)
    }

    /// Stops playback and releases every button.  Called on shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the final release report cannot be sent.
    pub fn shutdown(&mut self) -> Result<(), CodecError> {
        if self.engine.is_active() {
            self.engine.request_stop();
            self.tick()?;
        }
        if !self.codec.state().buttons().is_empty() {
            self.codec.release_all()?;
        }
        info!("command handler shut down");
        Ok(())
    }

    fn one_shot(&mut self, action: Action) -> Result<Reply, CodecError> {
        if let Some(name) = self.engine.active_macro() {
            warn!(
                "{} rejected while macro '{name}' is playing",
                action.kind().to_uppercase()
            );
            return Ok(Reply::Error);
        }
        self.engine
            .perform_now(&action, &mut self.codec, self.clock.as_ref())?;
        Ok(Reply::Ok)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
