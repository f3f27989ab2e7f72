//! # Dialogs Example
//!
//! Demonstrates the toplevel stack:
//! - A main window redrawn by a one-second timer
//! - A modal dialog begun from a key handler, with its own nested run loop
//! - A background thread reporting progress through a `SyncContext`
//!
//! Run with: `cargo run --example dialogs`

use std::time::Duration;

use weft::crossterm::event::{KeyCode, KeyEvent};
use weft::ratatui::layout::Rect;
use weft::{Application, ApplicationOptions, Canvas, Cx, Dim, Pos, View, Widget};

/// The main window: a tick counter and the last worker report.
struct Main {
    ticks: u32,
    report: String,
}

impl Widget for Main {
    fn draw(&mut self, canvas: &mut Canvas<'_>) {
        canvas.clear();
        let area = canvas.bounds();
        let normal = canvas.normal_attribute();
        let hot = canvas.hot_attribute();
        canvas.draw_box(area, normal);
        canvas.print(2, 0, " weft dialogs ", hot);
        canvas.print(2, 2, &format!("Seconds running: {}", self.ticks), normal);
        canvas.print(2, 3, &format!("Worker: {}", self.report), normal);
        canvas.print(2, 5, "d: open a dialog   Ctrl+Q: quit", hot);
    }

    fn on_key(&mut self, cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
        if key.code != KeyCode::Char('d') {
            return false;
        }
        cx.invoke(open_dialog);
        true
    }
}

/// A modal confirmation box closed with Enter or Esc.
struct Dialog;

impl Widget for Dialog {
    fn draw(&mut self, canvas: &mut Canvas<'_>) {
        canvas.clear();
        let area = canvas.bounds();
        let style = canvas.normal_attribute();
        let hot = canvas.hot_attribute();
        canvas.draw_box(area, style);
        canvas.print(2, 1, "Keys go nowhere else", style);
        canvas.print(2, 2, "while this is open.", style);
        canvas.print(2, 3, "Enter / Esc closes", hot);
    }

    fn on_key(&mut self, cx: &mut Cx<'_>, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                cx.request_stop(None);
                true
            }
            // Swallow everything else so nothing leaks past the modal.
            _ => true,
        }
    }
}

fn open_dialog(app: &mut Application) {
    let dialog = app.tree_mut().insert(
        View::toplevel()
            .modal(true)
            .with_pos(Pos::Center, Pos::Center)
            .with_size(Dim::Sized(26), Dim::Sized(5))
            .with_handler(Dialog),
    );
    if let Err(err) = app.run(dialog) {
        app.fail(err);
    }
}

fn main() -> weft::Result<()> {
    let options = ApplicationOptions {
        log_file: Some("dialogs.log".into()),
        ..ApplicationOptions::default()
    };
    let mut app = Application::new(options)?;
    let main = app.tree_mut().insert(
        View::toplevel()
            .with_frame(Rect::new(0, 0, 48, 8))
            .with_handler(Main {
                ticks: 0,
                report: "starting".into(),
            }),
    );

    app.add_timeout(Duration::from_secs(1), move |app| {
        if let Some(widget) = app.tree_mut().widget_mut::<Main>(main) {
            widget.ticks += 1;
        }
        app.tree_mut().set_needs_display_all(main);
        true
    });

    let sync = app.sync_context();
    std::thread::spawn(move || {
        for step in 1..=5 {
            std::thread::sleep(Duration::from_secs(2));
            let posted = sync.post(move |app| {
                if let Some(widget) = app.tree_mut().widget_mut::<Main>(main) {
                    widget.report = format!("step {step} of 5");
                }
                app.tree_mut().set_needs_display_all(main);
            });
            if posted.is_err() {
                break;
            }
        }
    });

    let result = app.run(main);
    app.shutdown()?;
    result
}
