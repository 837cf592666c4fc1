use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use pdu_relay_rs::{
    Frame, PowerGlyph, RelayAction, RelayClient, RelayOptions, Settings, SwitchController,
};
use ratatui::{
    DefaultTerminal,
    buffer::Buffer,
    crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    layout::{Constraint, Layout, Rect},
    style::{
        Color, Modifier, Style, Stylize,
        palette::tailwind::{AMBER, GREEN, SLATE},
    },
    text::Line,
    widgets::{Block, Borders, Padding, Paragraph, Widget},
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const PANEL_BG: Color = SLATE.c950;
const POWER_ON_FG: Color = GREEN.c400;
const POWER_OFF_FG: Color = SLATE.c400;
const UNKNOWN_FG: Color = SLATE.c600;
const OFFLINE_FG: Color = AMBER.c400;
const BUTTON_ACTIVE: Style = Style::new().fg(GREEN.c400).add_modifier(Modifier::BOLD);
const BUTTON_IDLE: Style = Style::new().fg(SLATE.c400);

#[derive(Parser, Debug)]
struct Params {
    /// Hostname or IP address of the relay service
    #[clap(long, default_value = "127.0.0.1")]
    host: String,
    /// Port of the relay service
    #[clap(long, default_value = "5000")]
    port: u16,
    /// Settings file path (JSON); defaults are used when missing
    #[clap(long)]
    settings: Option<String>,
    /// Log file path (if not set, logging is disabled to keep the terminal clean)
    #[clap(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    if let Some(path) = &params.log_file {
        let file = std::fs::File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    }

    let settings = Settings::load(params.settings.as_deref());
    let options = RelayOptions::builder()
        .host(params.host.clone())
        .port(params.port)
        .build()?;
    let client = RelayClient::new(options)?;
    let controller = SwitchController::with_press_flash(Arc::new(client), settings.press_flash());
    let frames = controller.subscribe();
    controller.spawn_poll_loop(settings.poll_interval());

    let terminal = ratatui::init();
    let app = App {
        should_exit: false,
        target: format!("{}:{}", params.host, params.port),
        frame: controller.frame(),
        frames,
        controller,
    };
    let result = app.run(terminal);
    ratatui::restore();
    result
}

struct App {
    should_exit: bool,
    target: String,
    frame: Frame,
    frames: watch::Receiver<Frame>,
    controller: SwitchController,
}

impl App {
    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        while !self.should_exit {
            if self.frames.has_changed().unwrap_or(false) {
                self.frame = self.frames.borrow_and_update().clone();
            }
            terminal.draw(|frame| frame.render_widget(&mut self, frame.area()))?;
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('o') => self.send(RelayAction::On),
            KeyCode::Char('f') => self.send(RelayAction::Off),
            KeyCode::Char(' ') | KeyCode::Char('t') | KeyCode::Enter => {
                // Bistable toggle: request the opposite of the checked value.
                let action = RelayAction::from(!self.frame.toggle_checked);
                self.send(action);
            }
            _ => {}
        }
    }

    fn send(&self, action: RelayAction) {
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.request_action(action).await });
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [header_area, panel_area, buttons_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(header_area, buf);
        self.render_panel(panel_area, buf);
        self.render_buttons(buttons_area, buf);
        App::render_footer(footer_area, buf);
    }
}

/// Rendering logic for the app
impl App {
    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(format!("PDU Relay Panel — {}", self.target))
            .bold()
            .centered()
            .render(area, buf);
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        let (label, fg) = match self.frame.power {
            PowerGlyph::On => ("POWER ON", POWER_ON_FG),
            PowerGlyph::Off => ("POWER OFF", POWER_OFF_FG),
            PowerGlyph::Unknown => ("UNKNOWN", UNKNOWN_FG),
        };
        let mut lines = vec![Line::styled(label, Style::new().fg(fg).bold())];
        if self.frame.offline {
            lines.push(Line::styled("OFFLINE", Style::new().fg(OFFLINE_FG).bold()));
        }
        let toggle = if self.frame.toggle_checked {
            "[x] power"
        } else {
            "[ ] power"
        };
        lines.push(Line::raw(""));
        lines.push(Line::styled(toggle, Style::new().fg(fg)));

        let block = Block::new()
            .borders(Borders::ALL)
            .bg(PANEL_BG)
            .padding(Padding::vertical(1));
        Paragraph::new(lines)
            .block(block)
            .centered()
            .render(area, buf);
    }

    fn render_buttons(&self, area: Rect, buf: &mut Buffer) {
        let [on_area, off_area] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(area);
        self.render_button(on_area, buf, RelayAction::On, " ON (o) ");
        self.render_button(off_area, buf, RelayAction::Off, " OFF (f) ");
    }

    fn render_button(&self, area: Rect, buf: &mut Buffer, action: RelayAction, label: &str) {
        let active = self.frame.toggle_checked == action.is_on();
        let mut style = if active { BUTTON_ACTIVE } else { BUTTON_IDLE };
        if self.frame.pressed == Some(action) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        Paragraph::new(Line::styled(label, style))
            .block(Block::new().borders(Borders::ALL))
            .centered()
            .render(area, buf);
    }

    fn render_footer(area: Rect, buf: &mut Buffer) {
        Paragraph::new("o: on, f: off, space/t: toggle, q: quit")
            .centered()
            .render(area, buf);
    }
}
