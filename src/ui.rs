use crate::client::{
    AppSnapshot,
    WagerEdit,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use mk_slots::{
    Phase,
    format_money,
    payout::{
        FULL_MATCH_MULTIPLIER,
        JACKPOT_MULTIPLIER,
        PAIR_MULTIPLIER,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Spin,
    MaxWager,
    EditWager(WagerEdit),
    Redraw,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Reads terminal events on a dedicated thread so the async loop never blocks
/// on `event::read`.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn is_key_press(event: &Event) -> bool {
    matches!(event, Event::Key(k) if k.kind == KeyEventKind::Press)
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match state.mode {
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(' ') | KeyCode::Enter => Some(UserEvent::Spin),
            KeyCode::Char('m') => Some(UserEvent::MaxWager),
            KeyCode::Char(c) if c.is_ascii_digit() => c
                .to_digit(10)
                .map(|d| UserEvent::EditWager(WagerEdit::Digit(d))),
            KeyCode::Backspace => Some(UserEvent::EditWager(WagerEdit::Backspace)),
            KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('k') => {
                Some(UserEvent::EditWager(WagerEdit::Increment))
            }
            KeyCode::Down | KeyCode::Char('-') | KeyCode::Char('j') => {
                Some(UserEvent::EditWager(WagerEdit::Decrement))
            }
            _ => None,
        },
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // balance + wager
            Constraint::Length(5), // reels
            Constraint::Length(6), // paytable + last result
            Constraint::Length(4), // status
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet(f, chunks[0], snap);
    draw_reels(f, chunks[1], snap);
    draw_lower(f, chunks[2], snap);
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4], snap);
    draw_modals(f, state);
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Ready",
        Phase::Spinning => "Spinning",
        Phase::Settling => "Settling",
    }
}

fn draw_wallet(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wager = if snap.wager_input.is_empty() {
        Span::styled("_", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            snap.wager_input.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )
    };
    let trigger = if snap.phase == Phase::Idle {
        Span::styled("[ SPIN ]", Style::default().fg(Color::Green))
    } else {
        Span::styled("[ .... ]", Style::default().fg(Color::DarkGray))
    };
    let lines = vec![
        Line::from(vec![
            Span::raw("Balance: "),
            Span::styled(
                format_money(snap.balance),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::raw("Wager: "),
            wager,
            Span::raw("   "),
            trigger,
            Span::raw(format!("   {}", phase_label(snap.phase))),
        ]),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(p, area);
}

fn draw_reels(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = snap.reels.len() as u16;
    let col_w = if cols > 0 { area.width / cols } else { area.width };
    for (i, symbol) in snap.reels.iter().enumerate() {
        let rect = Rect::new(area.x + i as u16 * col_w, area.y, col_w, area.height);
        let stopped = snap.stopped.get(i).copied().unwrap_or(true);
        // reels still ticking are dimmed; a reel that just landed is highlighted
        let border_style = match (snap.phase, stopped) {
            (Phase::Idle, _) => Style::default(),
            (_, true) => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            (_, false) => Style::default().fg(Color::DarkGray),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!("Reel {}", i + 1));
        let p = Paragraph::new(vec![Line::from(""), Line::from(symbol.emoji())])
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(p, rect);
    }
}

fn draw_lower(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let reels = snap.reels.len().max(2);
    let paytable = vec![
        Line::from(format!("{reels}x 🏆        x{JACKPOT_MULTIPLIER}")),
        Line::from(format!("{reels} of a kind   x{FULL_MATCH_MULTIPLIER}")),
        Line::from(format!("any pair      x{PAIR_MULTIPLIER}")),
    ];
    let p = Paragraph::new(paytable).block(Block::default().borders(Borders::ALL).title("Paytable"));
    f.render_widget(p, cols[0]);

    let last = match &snap.last_settlement {
        Some(s) => {
            let symbols: String = s.symbols.iter().map(|sym| sym.emoji()).collect();
            vec![
                Line::from(symbols),
                Line::from(format!("Wager: {}", format_money(s.wager))),
                Line::from(format!("Payout: {}", format_money(s.payout))),
            ]
        }
        None => vec![Line::from("No spins yet")],
    };
    let p = Paragraph::new(last).block(Block::default().borders(Borders::ALL).title("Last Spin"));
    f.render_widget(p, cols[1]);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = if snap.status.trim().is_empty() {
        String::from("Ready")
    } else {
        snap.status.clone()
    };
    let p = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(Style::default().fg(Color::Green));
    f.render_widget(p, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let help = format!(
        "Space/Enter spin | 0-9 Backspace +/- wager | m max | q quit | saved to {}",
        snap.state_file
    );
    let p = Paragraph::new(help)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(p, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match state.mode {
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
