use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tether_core::{ChannelFailure, EntryKind, Reply, Request, RequestKind};
use tether_engine::{BoardEvent, BoardImage, CommandChannel, EventSink, MemoryBoard, RunBehavior};

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<BoardEvent>>,
}

impl TestSink {
    fn take(&self) -> Vec<BoardEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: BoardEvent) {
        self.events.lock().unwrap().push(event);
    }
}

async fn connected(image: BoardImage) -> MemoryBoard {
    let board = MemoryBoard::new("/dev/ttyUSB0", image);
    assert_eq!(board.connect().await.unwrap(), "/dev/ttyUSB0");
    board
}

#[tokio::test]
async fn file_requests_follow_directory_rules() {
    let board = connected(BoardImage::default().with_file("/lib/util.py", b"x = 1")).await;
    let sink = TestSink::default();

    let listing = match board.execute(Request::ListDirectory, &sink).await.unwrap() {
        Reply::Listing(entries) => entries,
        other => panic!("unexpected reply {other:?}"),
    };
    assert_eq!(listing[0].path, "/lib");
    assert_eq!(listing[0].kind, EntryKind::Dir);
    assert_eq!(listing[1].kind, EntryKind::File { size: 5 });

    let orphan = board
        .execute(
            Request::PutFile {
                name: "/a/b.py".to_string(),
                bytes: vec![1],
            },
            &sink,
        )
        .await;
    assert_eq!(orphan, Err(ChannelFailure::new("OSError: [Errno 2] ENOENT")));

    board
        .execute(Request::MakeDir { name: "/a".to_string() }, &sink)
        .await
        .unwrap();
    board
        .execute(
            Request::PutFile {
                name: "/a/b.py".to_string(),
                bytes: vec![1],
            },
            &sink,
        )
        .await
        .unwrap();
    let again = board
        .execute(Request::MakeDir { name: "/a".to_string() }, &sink)
        .await;
    assert_eq!(again, Err(ChannelFailure::new("OSError: [Errno 17] EEXIST")));

    let fetched = board
        .execute(
            Request::GetFile {
                name: "/a/b.py".to_string(),
                size: 1,
            },
            &sink,
        )
        .await
        .unwrap();
    assert_eq!(
        fetched,
        Reply::File {
            name: "/a/b.py".to_string(),
            bytes: vec![1]
        }
    );
}

#[tokio::test]
async fn renaming_a_directory_moves_its_subtree() {
    let board = connected(
        BoardImage::default()
            .with_file("/lib/util.py", b"u")
            .with_file("/lib/drivers/led.py", b"l")
            .with_file("/library.py", b"x"),
    )
    .await;
    let sink = TestSink::default();
    let rename = |from: &str, to: &str| Request::Rename {
        from: from.to_string(),
        to: to.to_string(),
    };

    board.execute(rename("/lib", "/pkg"), &sink).await.unwrap();

    let image = board.image();
    assert_eq!(
        image.dirs.iter().cloned().collect::<Vec<_>>(),
        vec!["/pkg".to_string(), "/pkg/drivers".to_string()]
    );
    assert_eq!(
        image.files.keys().cloned().collect::<Vec<_>>(),
        vec![
            "/library.py".to_string(),
            "/pkg/drivers/led.py".to_string(),
            "/pkg/util.py".to_string()
        ]
    );
    assert_eq!(
        board.execute(rename("/pkg", "/library.py"), &sink).await,
        Err(ChannelFailure::new("OSError: [Errno 17] EEXIST"))
    );
    assert_eq!(
        board.execute(rename("/lib", "/old"), &sink).await,
        Err(ChannelFailure::new("OSError: [Errno 2] ENOENT"))
    );
}

#[tokio::test]
async fn injected_failure_hits_only_the_next_matching_request() {
    let board = connected(BoardImage::default()).await;
    let sink = TestSink::default();
    board.fail_next(RequestKind::GetVersion, "timeout");

    board.execute(Request::ListDirectory, &sink).await.unwrap();
    assert_eq!(
        board.execute(Request::GetVersion, &sink).await,
        Err(ChannelFailure::new("timeout"))
    );
    assert!(board.execute(Request::GetVersion, &sink).await.is_ok());
    assert_eq!(
        board.requests(),
        vec![
            RequestKind::ListDirectory,
            RequestKind::GetVersion,
            RequestKind::GetVersion
        ]
    );
}

#[tokio::test]
async fn run_reports_download_output_and_errors() {
    let board = connected(BoardImage::default()).await;
    let sink = TestSink::default();
    board.set_run_output(b"hello\r\n");
    board.set_run_error(Some("Traceback (most recent call last):\n  File \"<stdin>\", line 1\nNameError: x\n".to_string()));

    let result = board
        .execute(
            Request::Run {
                name: "/main.py".to_string(),
                code: b"print('hello'); x".to_vec(),
            },
            &sink,
        )
        .await;

    assert!(result.is_err());
    let events = sink.take();
    assert_eq!(events[0], BoardEvent::CodeDownloaded);
    assert_eq!(events[1], BoardEvent::ConsoleOutput(b"hello\r\n".to_vec()));
    assert!(matches!(&events[2], BoardEvent::ErrorText(text) if text.ends_with("NameError: x\n")));
}

#[tokio::test]
async fn interrupt_ends_a_long_running_program() {
    let board = Arc::new(connected(BoardImage::default()).await);
    board.set_run_behavior(RunBehavior::UntilInterrupted);
    let sink = Arc::new(TestSink::default());

    let running = {
        let board = board.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            board
                .execute(
                    Request::Run {
                        name: "/main.py".to_string(),
                        code: Vec::new(),
                    },
                    sink.as_ref(),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    board.send_input(b"q".to_vec()).await;
    board.interrupt().await;

    let result = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("run ends after interrupt")
        .unwrap();
    assert_eq!(result, Err(ChannelFailure::new("interrupted")));
    assert_eq!(board.interrupts(), 1);
    assert_eq!(board.input(), b"q");
    assert!(sink
        .take()
        .iter()
        .any(|event| matches!(event, BoardEvent::ErrorText(text) if text.contains("KeyboardInterrupt"))));
}

#[tokio::test]
async fn unplugged_board_reports_connection_loss() {
    let board = connected(BoardImage::default()).await;
    let sink = TestSink::default();
    board.unplug();

    assert!(board.execute(Request::GetVersion, &sink).await.is_err());
    assert_eq!(sink.take(), vec![BoardEvent::ConnectionLost]);

    board.set_reachable(false);
    assert!(board.connect().await.is_err());
}

#[test]
fn board_image_round_trips_through_json() {
    let image = BoardImage::default().with_file("/lib/a.py", b"a");
    let text = image.to_json().unwrap();
    assert_eq!(BoardImage::from_json(&text).unwrap(), image);

    let minimal = BoardImage::from_json(r#"{"release":"1.20.0","nodename":"rp2"}"#).unwrap();
    assert!(minimal.files.is_empty());
}
