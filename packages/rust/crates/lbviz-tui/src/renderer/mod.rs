//! TUI Renderer - terminal management and frame layout

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::io::{Stdout, stdout};

use lbviz_types::{Registration, ResultKind};

use crate::state::AppState;
use crate::view::{DiagramView, NodeKind, NodeView};

const HELP_TEXT: &str =
    "[1/2/3] algorithm  [s] send  [r] run  [c] cancel  [a] add target  [+/-] rate  [x] clear  [q] quit";
const ARROW: &str = " ──▶ ";

/// TUI Renderer using Crossterm backend
pub struct TuiRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TuiRenderer {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    /// Returns the terminal error if the terminal cannot be set up.
    pub fn new() -> Result<Self, anyhow::Error> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout());
        let terminal = Terminal::new(backend)?;

        Ok(Self { terminal })
    }

    /// Draw one frame.
    ///
    /// # Errors
    /// Returns the terminal write error.
    pub fn draw(&mut self, view: &DiagramView, state: &AppState) -> Result<(), anyhow::Error> {
        self.terminal.draw(|frame| render(frame, view, state))?;
        Ok(())
    }

    /// Restore terminal to normal mode
    ///
    /// # Errors
    /// Returns the terminal error.
    pub fn restore_terminal() -> Result<(), anyhow::Error> {
        disable_raw_mode()?;
        execute!(stdout(), LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Drop for TuiRenderer {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), LeaveAlternateScreen);
    }
}

/// Lay out one frame: title, header, diagram, results, status bar.
pub fn render(frame: &mut Frame, view: &DiagramView, state: &AppState) {
    let diagram_height = u16::try_from(view.max_row())
        .unwrap_or(u16::MAX)
        .saturating_add(3);
    let [title_area, header_area, diagram_area, results_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(2),
        Constraint::Length(diagram_height),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let title = Paragraph::new(state.title()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(title, title_area);

    render_header(frame, header_area, view);
    render_diagram(frame, diagram_area, view);
    render_results(frame, results_area, view);

    let status_text = state.status_message().unwrap_or(HELP_TEXT);
    let status = Paragraph::new(status_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, status_area);
}

fn render_header(frame: &mut Frame, area: Rect, view: &DiagramView) {
    let run_style = if view.running {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };
    let mut first = vec![
        Span::raw("Active Algorithm: "),
        Span::styled(
            view.header.algorithm.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(format!("[{}]", view.header.run_button), run_style),
    ];
    if let Some(last_run) = &view.header.last_run {
        first.push(Span::raw("   "));
        first.push(Span::styled(
            last_run.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let lines = vec![Line::from(first), Line::from(view.header.rate.clone())];
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_diagram(frame: &mut Frame, area: Rect, view: &DiagramView) {
    let balancer = view.nodes.iter().find(|n| n.kind == NodeKind::Balancer);
    let service = view.nodes.iter().find(|n| n.kind == NodeKind::Service);
    let target_width = view
        .targets()
        .map(|n| node_text(n).chars().count())
        .max()
        .unwrap_or(0);
    let side_width = [balancer, service]
        .iter()
        .flatten()
        .map(|n| node_text(n).chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    for row in 0..=view.max_row() {
        let mut spans = Vec::new();
        spans.push(side_cell(balancer, row, side_width));
        match view.targets().find(|n| n.row == row) {
            Some(target) => {
                spans.push(Span::raw(ARROW));
                let text = node_text(target);
                spans.push(Span::styled(
                    format!("{text:<target_width$}"),
                    target_style(target),
                ));
                spans.push(Span::raw(ARROW));
            }
            None => spans.push(Span::raw(" ".repeat(target_width + 2 * ARROW.chars().count()))),
        }
        spans.push(side_cell(service, row, side_width));
        lines.push(Line::from(spans));
    }

    let block = Block::default().borders(Borders::ALL).title("Topology");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn side_cell(node: Option<&NodeView>, row: u32, width: usize) -> Span<'static> {
    match node {
        Some(node) if node.row == row => Span::styled(
            format!("{:<width$}", node_text(node)),
            Style::default().fg(Color::Cyan),
        ),
        _ => Span::raw(" ".repeat(width)),
    }
}

fn node_text(node: &NodeView) -> String {
    let suffix = match &node.registration {
        Some(Registration::Pending) => " …",
        Some(Registration::Failed(_)) => " ✗",
        _ => "",
    };
    format!("[ {}{suffix} ]", node.label)
}

fn target_style(node: &NodeView) -> Style {
    if node.highlighted {
        return Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD);
    }
    match node.registration {
        Some(Registration::Failed(_)) => Style::default().fg(Color::Red),
        Some(Registration::Pending) => Style::default().fg(Color::DarkGray),
        _ => Style::default(),
    }
}

fn render_results(frame: &mut Frame, area: Rect, view: &DiagramView) {
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = view.results.len().saturating_sub(visible);
    let lines: Vec<Line> = view
        .results
        .iter()
        .skip(skip)
        .map(|line| {
            let style = match line.kind {
                ResultKind::Success => Style::default(),
                ResultKind::Failure => Style::default().fg(Color::Red),
                ResultKind::Info => Style::default().fg(Color::Blue),
            };
            Line::styled(line.text.clone(), style)
        })
        .collect();

    let title = if view.results_evicted > 0 {
        format!("Results ({} older dropped)", view.results_evicted)
    } else {
        "Results".to_string()
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
