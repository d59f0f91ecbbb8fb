use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tether_core::{normalize, update, AppState, ExampleBundle, ExampleFile, Msg, SEPARATOR};
use tether_engine::{ensure_dir, AtomicFileWriter, BoardImage, EngineHandle, MemoryBoard};
use tether_logging::{tether_info, tether_warn};

use super::commands::{parse_command, Command, HELP};
use super::effects::EffectRunner;
use super::render;
use super::settings::{load_settings, save_settings, settings_path, Settings};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("no working directory")?;
    let settings = load_settings(&cwd);
    tether_logging::initialize(settings.log_destination, settings.log_level());
    if !settings_path(&cwd).exists() {
        if let Err(err) = save_settings(&cwd, &settings) {
            tether_warn!("Could not write default settings: {}", err);
        }
    }

    let image = match &settings.board_image {
        Some(path) if path.exists() => BoardImage::load(path)
            .with_context(|| format!("loading board image {}", path.display()))?,
        _ => BoardImage::default(),
    };
    let board = Arc::new(MemoryBoard::new(settings.port.clone(), image));
    let mut app = App::new(settings, board, io::stdout());

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    app.start();
    loop {
        app.pump(POLL_INTERVAL);
        match line_rx.try_recv() {
            Ok(line) => {
                if !app.handle_line(&line) {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
    }
    app.shutdown()
}

/// Console front end: owns the core state and feeds it commands and engine
/// events, running every resulting effect before taking the next message.
pub struct App<W: Write> {
    state: AppState,
    runner: EffectRunner<W>,
    board: Arc<MemoryBoard>,
    settings: Settings,
    last_status: String,
}

impl<W: Write> App<W> {
    pub fn new(settings: Settings, board: Arc<MemoryBoard>, out: W) -> Self {
        let engine = EngineHandle::new(board.clone());
        Self {
            state: AppState::with_config(settings.core_config()),
            runner: EffectRunner::new(engine, out),
            board,
            settings,
            last_status: String::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[cfg(test)]
    pub fn board(&self) -> &MemoryBoard {
        &self.board
    }

    #[cfg(test)]
    pub fn out(&mut self) -> &mut W {
        self.runner.out()
    }

    pub fn focused_buffer(&self) -> Option<&str> {
        self.runner.focused()
    }

    pub fn start(&mut self) {
        self.dispatch(Msg::ReconnectRequested);
    }

    /// Applies `msg` and every host-side completion it triggers.
    pub fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            queue.extend(self.runner.run(effects));
        }
        if self.state.consume_dirty() {
            let line = render::status_line(&self.state.view());
            if line != self.last_status {
                self.print(&format!("{line}\n"));
                self.last_status = line;
            }
        }
    }

    /// Waits up to `timeout` for engine events and dispatches all that arrived.
    pub fn pump(&mut self, timeout: Duration) {
        let Some(first) = self.runner.engine().recv_timeout(timeout) else {
            return;
        };
        self.dispatch(Msg::from(first));
        while let Some(event) = self.runner.engine().try_recv() {
            self.dispatch(Msg::from(event));
        }
    }

    /// Returns false when the user asked to quit.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                self.print(&format!("{err}\n"));
                return true;
            }
        };

        match command {
            Command::Core(msg) => self.dispatch(msg),
            Command::Save { name, source } => {
                let name = normalize(&name);
                if let Some(code) = self.code_for(&name, source.as_deref()) {
                    self.runner.stage_buffer(&name, code.clone());
                    self.dispatch(Msg::SaveRequested { name, code });
                }
            }
            Command::Run { name, source } => {
                let name = normalize(&name);
                if let Some(code) = self.code_for(&name, source.as_deref()) {
                    self.dispatch(Msg::RunRequested { name, code });
                }
            }
            Command::Backup { archive } => match archive {
                Some(archive) => self.dispatch(Msg::BackupRequested { archive }),
                None => match self.default_backup_path() {
                    Ok(archive) => self.dispatch(Msg::BackupRequested { archive }),
                    Err(err) => self.print(&format!("backup: {err:#}\n")),
                },
            },
            Command::Example { dir, main } => match load_example(&dir, &main) {
                Ok(bundle) => self.dispatch(Msg::ExampleRequested(bundle)),
                Err(err) => self.print(&format!("example: {err:#}\n")),
            },
            Command::List => {
                let text = render::listing(&self.state.file_tree().all_files());
                self.print(&text);
            }
            Command::Status => {
                let mut text = render::status_line(&self.state.view());
                if let Some(name) = self.focused_buffer() {
                    text.push_str(&format!("\nediting {name}"));
                }
                self.print(&format!("{text}\n"));
            }
            Command::Help => self.print(&format!("{HELP}\n")),
            Command::Quit => return false,
        }
        true
    }

    /// Writes the simulated board back to its image file, if one is configured.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.settings.board_image.clone() else {
            return Ok(());
        };
        let json = self.board.image().to_json()?;
        AtomicFileWriter::write(&path, json.as_bytes())
            .with_context(|| format!("saving board image {}", path.display()))?;
        tether_info!("Saved board image to {}", path.display());
        Ok(())
    }

    /// Code comes from the host file when one is named, else from the buffer.
    fn code_for(&mut self, name: &str, source: Option<&Path>) -> Option<Vec<u8>> {
        match source {
            Some(path) => match fs::read(path) {
                Ok(code) => Some(code),
                Err(err) => {
                    tether_warn!("cannot read {}: {}", path.display(), err);
                    self.print(&format!("cannot read {}: {err}\n", path.display()));
                    None
                }
            },
            None => {
                let code = self.runner.buffer(name).map(<[u8]>::to_vec);
                if code.is_none() {
                    self.print(&format!("{name} is not open; name a host file\n"));
                }
                code
            }
        }
    }

    fn default_backup_path(&self) -> anyhow::Result<PathBuf> {
        let dir = &self.settings.backup_dir;
        ensure_dir(dir).with_context(|| format!("creating {}", dir.display()))?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Ok(dir.join(format!("backup-{stamp}.zip")))
    }

    fn print(&mut self, text: &str) {
        let out = self.runner.out();
        if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tether_warn!("console write failed: {}", err);
        }
    }
}

/// Reads every file under `dir` into a bundle. Remote paths mirror the
/// relative host paths; `main` names the file to open afterwards.
pub fn load_example(dir: &Path, main: &str) -> anyhow::Result<ExampleBundle> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)
        .with_context(|| format!("reading example {}", dir.display()))?;
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let main = normalize(main);
    let index = files
        .iter()
        .position(|file| file.path == main)
        .with_context(|| format!("{main} is not part of {}", dir.display()))?;
    let main = files.remove(index);
    Ok(ExampleBundle { main, extras: files })
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<ExampleFile>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let remote: Vec<String> = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(ExampleFile {
            path: format!("{SEPARATOR}{}", remote.join(&SEPARATOR.to_string())),
            bytes: fs::read(&path)?,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;
    use tether_core::Activity;
    use tether_engine::{ArchiveStore, RunBehavior};

    const WAIT: Duration = Duration::from_secs(5);

    fn app_with(image: BoardImage, settings: Settings) -> App<Vec<u8>> {
        tether_logging::initialize_for_tests();
        let board = Arc::new(MemoryBoard::new(settings.port.clone(), image));
        let mut app = App::new(settings, board, Vec::new());
        app.start();
        wait_until(&mut app, |state| {
            state.is_connected() && !state.is_busy() && state.file_tree().is_loaded()
        });
        app
    }

    fn wait_until(app: &mut App<Vec<u8>>, done: impl Fn(&AppState) -> bool) {
        let deadline = Instant::now() + WAIT;
        while !done(app.state()) {
            assert!(Instant::now() < deadline, "timed out; status: {}", app.state().status());
            app.pump(POLL_INTERVAL);
        }
    }

    fn command(app: &mut App<Vec<u8>>, line: &str) {
        assert!(app.handle_line(line));
        wait_until(app, |state| !state.is_busy());
    }

    fn archive_contents(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut store = ArchiveStore::new();
        let names = store.open(path).unwrap();
        let contents = names
            .into_iter()
            .map(|name| {
                let bytes = store.read(&name).unwrap();
                (name, bytes)
            })
            .collect();
        store.close().unwrap();
        contents
    }

    fn sample_image() -> BoardImage {
        BoardImage::default()
            .with_file("/main.py", b"import util\nutil.blink()\n")
            .with_file("/lib/util.py", b"def blink():\n    pass\n")
            .with_file("/lib/drivers/led.py", b"PIN = 2\n")
            .with_file("/boot.py", b"")
    }

    #[test]
    fn backup_then_restore_reproduces_the_board() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.zip");
        let second = temp.path().join("second.zip");

        let mut source = app_with(sample_image(), Settings::default());
        command(&mut source, &format!("backup {}", first.display()));
        assert!(source.state().status().starts_with("Backup successful: 4 files"));

        let mut target = app_with(BoardImage::default(), Settings::default());
        command(&mut target, &format!("restore {}", first.display()));
        assert_eq!(target.state().status(), "Restoration successful");
        assert_eq!(target.board().image().files, sample_image().files);
        assert_eq!(target.state().file_tree().file_count(), 4);

        command(&mut target, &format!("backup {}", second.display()));
        assert_eq!(archive_contents(&first), archive_contents(&second));
    }

    #[test]
    fn backups_of_an_unchanged_board_list_the_same_entries() {
        let temp = TempDir::new().unwrap();
        let mut app = app_with(sample_image(), Settings::default());

        command(&mut app, &format!("backup {}", temp.path().join("a.zip").display()));
        command(&mut app, &format!("backup {}", temp.path().join("b.zip").display()));

        let names = |path: &Path| -> Vec<String> {
            archive_contents(path).into_iter().map(|(name, _)| name).collect()
        };
        let first = names(&temp.path().join("a.zip"));
        assert_eq!(first, names(&temp.path().join("b.zip")));
        assert!(first.contains(&"lib/drivers/led.py".to_string()));
    }

    #[test]
    fn stop_escalates_when_the_program_ignores_interrupt() {
        let settings = Settings {
            stop_deadline_ms: 100,
            ..Settings::default()
        };
        let mut app = app_with(sample_image(), settings);
        app.board().set_run_behavior(RunBehavior::IgnoreInterrupt);

        assert!(app.handle_line("open /main.py"));
        wait_until(&mut app, |state| !state.is_busy());
        assert!(app.handle_line("run /main.py"));
        wait_until(&mut app, |state| {
            state.view().run_button == tether_core::ButtonState::Stop
        });

        assert!(app.handle_line("stop"));
        wait_until(&mut app, |state| !state.is_busy());

        assert_eq!(app.state().view().escalations, 1);
        assert_eq!(app.board().interrupts(), 1);
        assert_eq!(app.board().terminations(), 1);
        assert_eq!(app.state().status(), "Execution forcibly terminated");
    }

    #[test]
    fn traceback_from_a_run_points_at_the_buffer() {
        let temp = TempDir::new().unwrap();
        let host = temp.path().join("main.py");
        fs::write(&host, "import timex\n").unwrap();
        let mut app = app_with(BoardImage::default(), Settings::default());
        app.board().set_run_error(Some(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nImportError: no module named 'timex'\r\n"
                .to_string(),
        ));

        command(&mut app, &format!("save /main.py {}", host.display()));
        assert_eq!(app.state().status(), "Saved /main.py");
        command(&mut app, "run /main.py");

        let out = String::from_utf8_lossy(app.out()).into_owned();
        assert!(out.contains("-- opened /main.py (13 bytes)"));
        assert!(out.contains("-- /main.py:0: ImportError: no module named 'timex'"));
        assert!(out.contains("!! ImportError: no module named 'timex'"));
    }

    #[test]
    fn example_bundle_mirrors_host_layout() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("demo.py"), "import ssd\n").unwrap();
        fs::write(temp.path().join("lib").join("ssd.py"), "W = 128\n").unwrap();

        let bundle = load_example(temp.path(), "demo.py").unwrap();
        assert_eq!(bundle.main.path, "/demo.py");
        assert_eq!(bundle.extras.len(), 1);
        assert_eq!(bundle.extras[0].path, "/lib/ssd.py");
        assert!(load_example(temp.path(), "missing.py").is_err());

        let mut app = app_with(BoardImage::default(), Settings::default());
        assert!(app.handle_line(&format!("example {} demo.py", temp.path().display())));
        assert_eq!(
            app.state().pending().map(|pending| pending.activity()),
            Some(Activity::Example)
        );
        wait_until(&mut app, |state| !state.is_busy());
        assert_eq!(app.board().image().files["/lib/ssd.py"], b"W = 128\n");
        assert_eq!(app.focused_buffer(), Some("/demo.py"));
    }

    #[test]
    fn shutdown_writes_the_board_image_back() {
        let temp = TempDir::new().unwrap();
        let image_path = temp.path().join("board.json");
        let settings = Settings {
            board_image: Some(image_path.clone()),
            ..Settings::default()
        };
        let mut app = app_with(BoardImage::default(), settings);
        command(&mut app, "mkdir /data");

        app.shutdown().unwrap();
        let saved = BoardImage::load(&image_path).unwrap();
        assert!(saved.dirs.contains("/data"));
    }
}
