//! Layout and drawing: centered board, sidebar, overlays, line-clear flash.

use crate::board::{COLS, ROWS};
use crate::engine::EngineView;
use crate::pieces::Rgb;
use crate::timer::TimerPhase;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Board cells are two terminal cells wide so they come out roughly square.
const CELL_W: u16 = 2;

const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the line-clear flash (TachyonFX fade) in ms.
const LINE_CLEAR_FADE_MS: u32 = 300;

const BG: Color = Color::Rgb(0x12, 0x12, 0x18);
const BORDER: Color = Color::DarkGray;
const TITLE: Color = Color::Rgb(0xff, 0xb0, 0x60);
const FG: Color = Color::Gray;

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Board size in terminal cells, border included.
fn board_pixel_size() -> (u16, u16) {
    (COLS as u16 * CELL_W + 2, ROWS as u16 + 2)
}

/// Outer rect of the bordered board; matches the layout in `draw`.
fn board_outer_rect(area: Rect) -> Rect {
    let (pw, ph) = board_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;
    Rect {
        x: area.x + area.width.saturating_sub(total_w) / 2,
        y: area.y + area.height.saturating_sub(ph) / 2,
        width: pw.min(area.width),
        height: ph.min(area.height),
    }
}

/// Inner (borderless) board rect.
fn board_inner_rect(area: Rect) -> Rect {
    let outer = board_outer_rect(area);
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: (COLS as u16 * CELL_W).min(outer.width.saturating_sub(2)),
        height: (ROWS as u16).min(outer.height.saturating_sub(2)),
    }
}

/// Draw one frame: board + sidebar, overlays on top, status line at the
/// bottom. `flash`/`flash_time` hold the line-clear effect across frames.
pub fn draw(
    frame: &mut Frame,
    view: &EngineView,
    preview_grid: u16,
    warnings: &[String],
    notice: Option<&str>,
    debug: bool,
    flash: &mut Option<Effect>,
    flash_time: &mut Option<Instant>,
    flash_active: bool,
    now: Instant,
) {
    let area = frame.area();
    draw_board(frame, view, area);
    draw_sidebar(frame, view, preview_grid, area);
    if debug {
        draw_debug_overlay(frame, view, area);
    }
    if flash_active {
        apply_line_clear_flash(frame, area, view.cleared_rows, flash, flash_time, now);
    }
    if view.paused && !view.game_over {
        draw_pause_overlay(frame, area);
    }
    if view.game_over {
        draw_game_over(frame, view, area);
    }
    draw_status_line(frame, warnings, notice, area);
}

fn draw_board(frame: &mut Frame, view: &EngineView, area: Rect) {
    let outer = board_outer_rect(area);
    let title = format!(" dropblocks  lvl {} ", view.level);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER).bg(BG))
        .title(Span::styled(title, Style::default().fg(TITLE)));
    block.render(outer, frame.buffer_mut());

    let inner = board_inner_rect(area);
    let piece_cells: HashSet<(i32, i32)> = view
        .active_def
        .cells(view.active.rot)
        .iter()
        .map(|&(cx, cy)| (view.active.x + cx, view.active.y + cy))
        .collect();

    let buf = frame.buffer_mut();
    for y in 0..ROWS {
        let ry = inner.y + y as u16;
        if ry >= inner.y + inner.height {
            break;
        }
        for x in 0..COLS {
            let cell_color = if piece_cells.contains(&(x as i32, y as i32)) {
                color(view.active_def.color)
            } else {
                let cell = view.board.cell(x, y);
                if cell.is_filled() { color(cell.color()) } else { BG }
            };
            let rx = inner.x + x as u16 * CELL_W;
            for dx in 0..CELL_W {
                if rx + dx < inner.x + inner.width {
                    buf[(rx + dx, ry)]
                        .set_symbol(" ")
                        .set_style(Style::default().bg(cell_color));
                }
            }
        }
    }
}

fn sidebar_border() -> Style {
    Style::default().fg(BORDER).bg(BG)
}

fn draw_sidebar(frame: &mut Frame, view: &EngineView, preview_grid: u16, area: Rect) {
    let (pw, ph) = board_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2 + pw.min(area.width);
    let sidebar = Rect {
        x,
        y: area.y + area.height.saturating_sub(ph) / 2,
        width: SIDEBAR_WIDTH.min(area.width.saturating_sub(pw)),
        height: area.height.saturating_sub(area.height.saturating_sub(ph) / 2),
    };
    if sidebar.width == 0 {
        return;
    }

    let next_h = preview_grid + 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(next_h),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(sidebar);

    // Next preview.
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(sidebar_border())
        .title(Span::styled(" Next ", Style::default().fg(TITLE)));
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    draw_next_preview(frame, view, preview_grid, next_inner);

    // Score block.
    let title_style = Style::default().fg(TITLE);
    let fg_style = Style::default().fg(FG);
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(sidebar_border());
    let stats_inner = stats_block.inner(chunks[1]);
    stats_block.render(chunks[1], frame.buffer_mut());
    let stat = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<7}"), title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Score", view.score.to_string()),
        stat("Lines", view.lines.to_string()),
        stat("Level", view.level.to_string()),
        stat("Combo", if view.combo > 0 { format!("x{}", view.combo) } else { "-".into() }),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // Timer.
    let timer_block = Block::default()
        .borders(Borders::ALL)
        .border_style(sidebar_border())
        .title(Span::styled(" Timer ", title_style));
    let timer_inner = timer_block.inner(chunks[2]);
    timer_block.render(chunks[2], frame.buffer_mut());
    Paragraph::new(timer_line(view)).render(timer_inner, frame.buffer_mut());

    // Per-piece spawn counts.
    let pieces_block = Block::default()
        .borders(Borders::ALL)
        .border_style(sidebar_border())
        .title(Span::styled(" Pieces ", title_style));
    let pieces_inner = pieces_block.inner(chunks[3]);
    pieces_block.render(chunks[3], frame.buffer_mut());
    let piece_lines: Vec<Line> = view
        .catalogue
        .pieces()
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let count = view.stats.get(&i).copied().unwrap_or(0);
            Line::from(vec![
                Span::styled(format!("{:<7}", def.name), Style::default().fg(color(def.color))),
                Span::styled(count.to_string(), fg_style),
            ])
        })
        .collect();
    Paragraph::new(Text::from(piece_lines)).render(pieces_inner, frame.buffer_mut());
}

fn timer_line(view: &EngineView) -> Line<'static> {
    if !view.timer_enabled {
        return Line::from(Span::styled("off", Style::default().fg(Color::DarkGray)));
    }
    let secs = view.timer_remaining;
    let mut text = format!("{:02}:{:02}", secs / 60, secs % 60);
    match view.timer_phase {
        TimerPhase::Paused => text.push_str(" (paused)"),
        TimerPhase::Expired => text.push_str(" time up"),
        _ => {}
    }
    let style = if view.timer_critical || view.timer_phase == TimerPhase::Expired {
        Style::default().fg(Color::Red).bold()
    } else if view.timer_warning {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(FG)
    };
    Line::from(Span::styled(text, style))
}

/// Next piece in its rotation 0 shape, clipped to the preview grid.
fn draw_next_preview(frame: &mut Frame, view: &EngineView, preview_grid: u16, area: Rect) {
    let buf = frame.buffer_mut();
    let piece_color = color(view.next_def.color);
    for &(cx, cy) in view.next_def.cells(0) {
        if cx < 0 || cy < 0 || cx >= i32::from(preview_grid) || cy >= i32::from(preview_grid) {
            continue;
        }
        let rx = area.x + cx as u16 * CELL_W;
        let ry = area.y + cy as u16;
        if ry >= area.y + area.height {
            continue;
        }
        for dx in 0..CELL_W {
            if rx + dx < area.x + area.width {
                buf[(rx + dx, ry)]
                    .set_symbol(" ")
                    .set_style(Style::default().bg(piece_color));
            }
        }
    }
}

fn draw_debug_overlay(frame: &mut Frame, view: &EngineView, area: Rect) {
    let inner = board_inner_rect(area);
    let kick = match view.last_kick {
        Some((dx, dy)) => format!("kick ({dx},{dy})"),
        None => "kick -".to_string(),
    };
    let lines = vec![
        Line::from(format!("tick {}ms", view.tick_ms)),
        Line::from(format!("combo {}", view.combo)),
        Line::from(kick),
        Line::from(format!("next {}", view.next_def.name)),
    ];
    let rect = Rect {
        x: inner.x,
        y: inner.y,
        width: 14.min(inner.width),
        height: 4.min(inner.height),
    };
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(Color::Green).bg(BG))
        .render(rect, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(" P — Resume    Q — Quit ", Style::default().fg(FG))),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER).bg(BG)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &EngineView, area: Rect) {
    let popup_w = 30u16;
    let popup_h = 10u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let title = if view.timer_phase == TimerPhase::Expired {
        " Time's up! "
    } else {
        " Game Over "
    };
    let fg_style = Style::default().fg(FG);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(title, Style::default().fg(Color::White).bg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", view.score), fg_style)),
        Line::from(Span::styled(format!(" Lines: {} ", view.lines), fg_style)),
        Line::from(Span::styled(format!(" Level: {} ", view.level), fg_style)),
        Line::from(""),
        Line::from(Span::styled(" R — Restart    Q — Quit ", fg_style)),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER).bg(BG))
            .title(Span::styled(" dropblocks ", Style::default().fg(TITLE))),
    );
    p.render(popup, frame.buffer_mut());
}

/// Startup warnings and transient notices on the bottom terminal row.
fn draw_status_line(frame: &mut Frame, warnings: &[String], notice: Option<&str>, area: Rect) {
    if area.height == 0 {
        return;
    }
    let row = Rect {
        x: area.x,
        y: area.y + area.height - 1,
        width: area.width,
        height: 1,
    };
    let mut spans = Vec::new();
    if let Some(msg) = notice {
        spans.push(Span::styled(msg.to_string(), Style::default().fg(Color::Green)));
    }
    if !warnings.is_empty() {
        if !spans.is_empty() {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            warnings.join("; "),
            Style::default().fg(Color::Yellow),
        ));
    }
    if spans.is_empty() {
        return;
    }
    Paragraph::new(Line::from(spans)).render(row, frame.buffer_mut());
}

/// Create (on first call) and advance the line-clear flash: the cleared rows
/// start white and fade back into the board over [`LINE_CLEAR_FADE_MS`].
fn apply_line_clear_flash(
    frame: &mut Frame,
    area: Rect,
    cleared_rows: &[usize],
    flash: &mut Option<Effect>,
    flash_time: &mut Option<Instant>,
    now: Instant,
) {
    let inner = board_inner_rect(area);
    let delta = flash_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u128::from(u32::MAX)) as u32);
    *flash_time = Some(now);

    if flash.is_none() {
        let rows: HashSet<u16> = cleared_rows
            .iter()
            .filter_map(|&y| u16::try_from(y).ok().map(|y| inner.y + y))
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| rows.contains(&pos.y)));
        let effect = fx::fade_from(Color::White, Color::White, (LINE_CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(inner);
        *flash = Some(effect);
    }

    if let Some(effect) = flash {
        frame.render_effect(effect, inner, tfx_delta);
    }
}
