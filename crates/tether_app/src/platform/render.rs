use tether_core::{AppViewModel, ButtonState, ConnectionState, ConsoleStyle, ProgressView};

pub fn status_line(view: &AppViewModel) -> String {
    let connection = match &view.connection {
        ConnectionState::Disconnected => "no board".to_string(),
        ConnectionState::Connecting => "searching".to_string(),
        ConnectionState::Connected { port } => port.clone(),
        ConnectionState::Lost => "link lost (connect to retry)".to_string(),
    };

    let mut parts = vec![format!("[{connection}]")];
    if let Some(activity) = view.activity {
        let progress = match view.progress {
            ProgressView::Percent(percent) => format!(" {percent}%"),
            ProgressView::Indeterminate => " ...".to_string(),
            ProgressView::Hidden => String::new(),
        };
        parts.push(format!("busy: {activity}{progress}"));
    }
    if let Some(hint) = button_hint(view) {
        parts.push(hint.to_string());
    }
    parts.push(format!("files: {}", view.file_count));
    if view.escalations > 0 {
        parts.push(format!("forced stops: {}", view.escalations));
    }
    if !view.status.is_empty() {
        parts.push(view.status.clone());
    }
    parts.join(" | ")
}

fn button_hint(view: &AppViewModel) -> Option<&'static str> {
    if view.run_button == ButtonState::Stop || view.console_button == ButtonState::Stop {
        Some("`stop` to interrupt")
    } else {
        None
    }
}

/// One console effect as printed text. Output is passed through untouched.
pub fn console_text(text: &str, style: ConsoleStyle) -> String {
    match style {
        ConsoleStyle::Output => text.to_string(),
        ConsoleStyle::Traceback => format!("!! {}\n", text.trim_end()),
        ConsoleStyle::RawError => {
            let mut text = text.to_string();
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text
        }
    }
}

pub fn listing(files: &[String]) -> String {
    if files.is_empty() {
        return "(no files)\n".to_string();
    }
    files.iter().map(|file| format!("  {file}\n")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{AppState, CoreConfig};

    #[test]
    fn idle_state_shows_connection_and_status() {
        let view = AppState::with_config(CoreConfig::default()).view();
        let line = status_line(&view);
        assert!(line.starts_with("[no board]"));
        assert!(line.contains("files: 0"));
        assert!(!line.contains("busy"));
    }

    #[test]
    fn console_styles() {
        assert_eq!(console_text("hi\r\n", ConsoleStyle::Output), "hi\r\n");
        assert_eq!(
            console_text("NameError: x\n", ConsoleStyle::Traceback),
            "!! NameError: x\n"
        );
        assert_eq!(console_text("garbage", ConsoleStyle::RawError), "garbage\n");
    }

    #[test]
    fn listing_indents_each_file() {
        let files = vec!["/lib/a.py".to_string(), "/main.py".to_string()];
        assert_eq!(listing(&files), "  /lib/a.py\n  /main.py\n");
        assert_eq!(listing(&[]), "(no files)\n");
    }
}
