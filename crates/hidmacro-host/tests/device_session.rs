//! Integration tests for the host tooling against an in-process device.
//!
//! A `DeviceLink` talks over a tokio duplex pipe to a small line server that
//! feeds each command into the real device `CommandHandler`.  The handler
//! drives a recording HID transport and a manual clock, so the whole session
//! runs without hardware or real time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hidmacro_core::hid::mock::RecordingHidTransport;
use hidmacro_core::{
    Action, MacroStore, ManualClock, MouseButton, PlaybackState, ReportCodec, ScreenGeometry,
};
use hidmacro_device::application::handle_commands::CommandHandler;
use hidmacro_host::infrastructure::link::{DeviceLink, LinkError};
use hidmacro_host::infrastructure::macro_file::{import_library, load_library, save_library};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

fn device_handler(hid: &RecordingHidTransport) -> CommandHandler {
    let clock = Arc::new(ManualClock::new());
    let geometry = ScreenGeometry::new(1920, 1080).unwrap();
    let codec = ReportCodec::new(Box::new(hid.clone()), clock.clone());
    CommandHandler::with_geometry(geometry, codec, clock)
}

/// Answers one reply line per command line until the host hangs up.  Like
/// the device scheduler, playback advances one step after each line.
async fn serve(stream: DuplexStream, mut handler: CommandHandler) -> CommandHandler {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = handler.handle_line(&line).unwrap();
        handler.tick().unwrap();
        writer
            .write_all(format!("{reply}\n").as_bytes())
            .await
            .unwrap();
    }
    handler
}

fn scratch_path(label: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("hidmacro_test_{}_{label}", std::process::id()))
        .join("macros.json")
}

fn sample_library() -> MacroStore {
    let mut store = MacroStore::new();
    store
        .put(
            "login",
            vec![
                Action::Click {
                    position: Some((640, 400)),
                    button: MouseButton::Left,
                    delay: Duration::from_millis(300),
                },
                Action::Scroll {
                    delta: -2,
                    delay: Duration::from_millis(50),
                },
            ],
        )
        .unwrap();
    store
        .put(
            "corner",
            vec![Action::Move {
                x: 0,
                y: 0,
                delay: Duration::ZERO,
            }],
        )
        .unwrap();
    store
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_saved_library_uploads_and_plays_on_device() {
    // Arrange
    let path = scratch_path("upload");
    save_library(&path, &sample_library()).unwrap();
    let library = load_library(&path).unwrap();
    let hid = RecordingHidTransport::new();
    let (host_end, device_end) = tokio::io::duplex(4096);

    // Act
    let host = async move {
        let mut link = DeviceLink::new(host_end);
        link.ping().await.unwrap();
        for (name, actions) in library.iter() {
            link.upload(name, actions).await.unwrap();
        }
        let names = link.list().await.unwrap();
        link.play("login", true).await.unwrap();
        names
    };
    let (handler, names) = tokio::join!(serve(device_end, device_handler(&hid)), host);

    // Assert
    assert_eq!(names, vec!["login", "corner"]);
    assert_eq!(handler.store().names(), vec!["login", "corner"]);
    assert_eq!(handler.playback_state(), PlaybackState::PlayingLooping);
    assert_eq!(hid.reports().last().unwrap()[0], 0x01, "first click pressed");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_rejections_surface_as_link_errors() {
    // Arrange
    let hid = RecordingHidTransport::new();
    let (host_end, device_end) = tokio::io::duplex(4096);

    // Act
    let host = async move {
        let mut link = DeviceLink::new(host_end);
        let missing = link.play("nope", false).await;
        let spin = [Action::Move {
            x: 1,
            y: 1,
            delay: Duration::from_secs(1),
        }];
        link.upload("spin", &spin).await.unwrap();
        link.play("spin", true).await.unwrap();
        let busy = link.move_to(5, 5).await;
        link.stop().await.unwrap();
        let idle = link.move_to(5, 5).await;
        (missing, busy, idle)
    };
    let (handler, (missing, busy, idle)) =
        tokio::join!(serve(device_end, device_handler(&hid)), host);

    // Assert
    assert!(matches!(missing, Err(LinkError::Rejected { command: "PLAY", .. })));
    assert!(matches!(busy, Err(LinkError::Rejected { command: "MOVE", .. })));
    assert!(idle.is_ok());
    assert_eq!(handler.playback_state(), PlaybackState::Idle);
}

#[test]
fn test_import_merges_and_replaces_by_name() {
    // Arrange
    let target = scratch_path("import_target");
    let source = scratch_path("import_source");
    save_library(&target, &sample_library()).unwrap();

    let mut incoming = MacroStore::new();
    incoming.put("corner", Vec::new()).unwrap();
    incoming.put("extra", Vec::new()).unwrap();
    save_library(&source, &incoming).unwrap();

    // Act
    let mut library = load_library(&target).unwrap();
    let count = import_library(&mut library, &source).unwrap();
    save_library(&target, &library).unwrap();

    // Assert
    let reloaded = load_library(&target).unwrap();
    assert_eq!(count, 2);
    assert_eq!(reloaded.names(), vec!["login", "corner", "extra"]);
    assert!(reloaded.get("corner").unwrap().is_empty());

    for path in [target, source] {
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}

#[test]
fn test_import_of_missing_file_leaves_library_untouched() {
    let mut library = sample_library();

    let result = import_library(&mut library, &scratch_path("does_not_exist"));

    assert!(result.is_err());
    assert_eq!(library.names(), vec!["login", "corner"]);
}
