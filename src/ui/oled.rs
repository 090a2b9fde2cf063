//! SSD1306 OLED screens.
//!
//! 128×64, FONT_6X10: a title row with an underline, up to four list rows
//! and a hint row at the bottom.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

use crate::error::Error;
use crate::fsm::FsmState;
use crate::ui::{Frame, OledPanel};

pub const WIDTH: i32 = 128;
pub const HEIGHT: i32 = 64;

/// y of the header underline.
pub const HEADER_RULE_Y: i32 = 10;

/// Top of the first body row; rows are `ROW_HEIGHT` apart.
pub const FIRST_ROW_Y: i32 = 14;
pub const ROW_HEIGHT: i32 = 10;

/// Visible list rows between header and hint.
pub const VISIBLE_ROWS: usize = 4;

/// x where list item text starts (after the "> " marker).
pub const ITEM_X: i32 = 12;

const HINT_Y: i32 = HEIGHT - 10;

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn inverted_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::Off)
        .background_color(BinaryColor::On)
        .build()
}

fn big_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_10X20)
        .text_color(BinaryColor::On)
        .build()
}

fn text<D>(display: &mut D, s: &str, x: i32, y: i32)
where
    D: DrawTarget<Color = BinaryColor>,
{
    let _ = Text::with_baseline(s, Point::new(x, y), text_style(), Baseline::Top).draw(display);
}

fn row_y(row: usize) -> i32 {
    FIRST_ROW_Y + row as i32 * ROW_HEIGHT
}

/// Title plus a full-width rule under it.
pub fn draw_header<D>(display: &mut D, title: &str)
where
    D: DrawTarget<Color = BinaryColor>,
{
    text(display, title, 0, 0);
    let _ = Line::new(
        Point::new(0, HEADER_RULE_Y),
        Point::new(WIDTH - 1, HEADER_RULE_Y),
    )
    .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
    .draw(display);
}

fn draw_hint<D>(display: &mut D, hint: &str)
where
    D: DrawTarget<Color = BinaryColor>,
{
    text(display, hint, 0, HINT_Y);
}

/// First list entry shown so that `selected` is always on screen.
pub fn scroll_offset(selected: usize, len: usize) -> usize {
    if len <= VISIBLE_ROWS {
        0
    } else {
        selected.saturating_sub(VISIBLE_ROWS - 1).min(len - VISIBLE_ROWS)
    }
}

/// Menu list with the selected entry drawn inverted on a filled bar.
pub fn draw_menu<D>(display: &mut D, frame: &Frame<'_>)
where
    D: DrawTarget<Color = BinaryColor>,
{
    draw_header(display, FsmState::Menu.title());

    let first = scroll_offset(frame.menu_index, frame.menu.len());
    for (row, (idx, item)) in frame
        .menu
        .iter()
        .enumerate()
        .skip(first)
        .take(VISIBLE_ROWS)
        .enumerate()
    {
        let y = row_y(row);
        if idx == frame.menu_index {
            text(display, ">", 0, y);
            let _ = Rectangle::new(
                Point::new(ITEM_X, y),
                Size::new((WIDTH - ITEM_X) as u32, ROW_HEIGHT as u32),
            )
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(display);
            let _ = Text::with_baseline(item, Point::new(ITEM_X, y), inverted_style(), Baseline::Top)
                .draw(display);
        } else {
            text(display, item, ITEM_X, y);
        }
    }

    draw_hint(display, "UP/DN:Move SEL1:Go");
}

pub fn draw_settings<D>(display: &mut D, frame: &Frame<'_>)
where
    D: DrawTarget<Color = BinaryColor>,
{
    draw_header(display, FsmState::Settings.title());

    text(display, "System Configuration", 0, row_y(0));

    let mut tasks: String<24> = String::new();
    let _ = write!(
        tasks,
        "Tasks: {}/{} ({}%)",
        frame.todo.completed, frame.todo.total, frame.todo.percent
    );
    text(display, &tasks, 0, row_y(1));
    text(display, "Display: OLED + LCD", 0, row_y(2));

    draw_hint(display, "LEFT/SEL2: Back");
}

pub fn draw_about<D>(display: &mut D)
where
    D: DrawTarget<Color = BinaryColor>,
{
    draw_header(display, FsmState::About.title());

    text(display, "Panel Menu v1.0", 0, row_y(0));
    text(display, "Embassy tasks", 0, row_y(1));
    text(display, "Dual display", 0, row_y(2));

    draw_hint(display, "LEFT/SEL2: Back");
}

pub fn draw_confirm_exit<D>(display: &mut D)
where
    D: DrawTarget<Color = BinaryColor>,
{
    draw_header(display, FsmState::ConfirmExit.title());

    let _ = Text::with_baseline("EXIT?", Point::new(0, 14), big_style(), Baseline::Top)
        .draw(display);
    text(display, "SEL1: Yes", 0, 38);
    draw_hint(display, "LEFT/SEL2: No");
}

/// Lay out the screen for `frame.state` onto `display`. Pure drawing, no
/// flush.
pub fn draw_frame<D>(display: &mut D, frame: &Frame<'_>)
where
    D: DrawTarget<Color = BinaryColor>,
{
    match frame.state {
        FsmState::Menu => draw_menu(display, frame),
        FsmState::Settings => draw_settings(display, frame),
        FsmState::About => draw_about(display),
        FsmState::ConfirmExit => draw_confirm_exit(display),
    }
}

pub(crate) fn init<O: OledPanel>(panel: &mut O) -> Result<(), Error> {
    panel.init_panel()?;
    panel.clear_buffer();
    text(panel, "System Starting...", 0, 0);
    panel.flush_buffer()
}

pub(crate) fn clear<O: OledPanel>(panel: &mut O) -> Result<(), Error> {
    panel.clear_buffer();
    panel.flush_buffer()
}

pub(crate) fn render<O: OledPanel>(panel: &mut O, frame: &Frame<'_>) -> Result<(), Error> {
    panel.clear_buffer();
    draw_frame(panel, frame);
    panel.flush_buffer()
}
