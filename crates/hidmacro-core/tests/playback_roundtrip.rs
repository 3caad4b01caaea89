//! Integration tests for macro playback through the public API.
//!
//! A macro goes in as a JSON payload, is stored, played by the engine, and
//! comes out as HID reports on a recording transport.  Time is driven by a
//! `ManualClock`, so none of these tests sleep for real.

use std::sync::Arc;
use std::time::Duration;

use hidmacro_core::hid::mock::RecordingHidTransport;
use hidmacro_core::{
    pixel_to_absolute, Clock, MacroStore, ManualClock, PlaybackEngine, PlaybackState,
    ReportCodec, ScreenGeometry, Tick,
};

struct Harness {
    store: MacroStore,
    engine: PlaybackEngine,
    codec: ReportCodec,
    clock: Arc<ManualClock>,
    transport: RecordingHidTransport,
}

impl Harness {
    fn new(width: u32, height: u32) -> Self {
        let transport = RecordingHidTransport::new();
        let clock = Arc::new(ManualClock::new());
        let codec = ReportCodec::new(Box::new(transport.clone()), clock.clone());
        Self {
            store: MacroStore::new(),
            engine: PlaybackEngine::new(ScreenGeometry::new(width, height).unwrap()),
            codec,
            clock,
            transport,
        }
    }

    fn play(&mut self, name: &str, looping: bool) -> PlaybackState {
        let actions = self.store.get(name).unwrap();
        let now = self.clock.now();
        self.engine
            .start(name, actions, looping, &mut self.codec, now)
            .unwrap()
    }

    /// Advances until idle, jumping the clock to each deadline.  Returns the
    /// virtual time spent.
    fn run_to_idle(&mut self) -> Duration {
        let started = self.clock.now();
        for _ in 0..10_000 {
            match self.engine.advance(&mut self.codec, self.clock.now()).unwrap() {
                Tick::Idle => return self.clock.now() - started,
                Tick::WaitUntil(deadline) => {
                    let now = self.clock.now();
                    if deadline > now {
                        self.clock.advance(deadline - now);
                    }
                }
            }
        }
        panic!("playback did not finish");
    }
}

#[test]
fn test_click_macro_emits_move_press_release_at_mapped_coordinates() {
    // Arrange
    let mut h = Harness::new(1920, 1080);
    h.store
        .put_json(
            "demo",
            r#"[{"type":"click","x":100,"y":200,"button":"left","delay":0.1}]"#,
        )
        .unwrap();
    let (ax, ay) = pixel_to_absolute(100, 200, h.engine.geometry());
    let [x_lo, x_hi] = ax.to_le_bytes();
    let [y_lo, y_hi] = ay.to_le_bytes();

    // Act
    assert_eq!(h.play("demo", false), PlaybackState::Playing);
    let elapsed = h.run_to_idle();

    // Assert
    assert_eq!(h.engine.state(), PlaybackState::Idle);
    assert_eq!(elapsed, Duration::from_millis(150), "delay + dwell");
    assert_eq!(
        h.transport.reports(),
        vec![
            [0x00, x_lo, x_hi, y_lo, y_hi, 0],
            [0x01, x_lo, x_hi, y_lo, y_hi, 0],
            [0x00, x_lo, x_hi, y_lo, y_hi, 0],
        ]
    );
}

#[test]
fn test_mixed_macro_plays_every_supported_action() {
    // Arrange
    let mut h = Harness::new(100, 100);
    h.store
        .put_json(
            "mixed",
            r#"[
                {"type":"move","x":100,"y":100,"delay":0},
                {"type":"scroll","delta":-200,"delay":0},
                {"type":"keypress","delay":3},
                {"type":"click","button":"middle","delay":0}
            ]"#,
        )
        .unwrap();

    // Act
    h.play("mixed", false);
    h.run_to_idle();

    // Assert
    let reports = h.transport.reports();
    assert_eq!(reports.len(), 5, "move, two wheel chunks, press, release");
    assert_eq!(reports[0], [0, 0xFF, 0x7F, 0xFF, 0x7F, 0]);
    assert_eq!(reports[1][5] as i8, -127);
    assert_eq!(reports[2][5] as i8, -73);
    assert_eq!(reports[3], [0x04, 0xFF, 0x7F, 0xFF, 0x7F, 0]);
    assert_eq!(reports[4], [0x00, 0xFF, 0x7F, 0xFF, 0x7F, 0]);
}

#[test]
fn test_overwrite_during_playback_does_not_affect_running_session() {
    // Arrange
    let mut h = Harness::new(100, 100);
    h.store
        .put_json("m", r#"[{"type":"move","x":0,"y":0,"delay":0}]"#)
        .unwrap();
    h.play("m", false);

    // Act
    h.store
        .put_json(
            "m",
            r#"[{"type":"move","x":1,"y":1},{"type":"move","x":2,"y":2}]"#,
        )
        .unwrap();
    h.run_to_idle();

    // Assert
    assert_eq!(h.transport.reports().len(), 1);
}
