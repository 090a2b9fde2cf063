//! 16×2 character LCD screens.
//!
//! Layouts are plain text, so composing them is kept separate from
//! writing them to the panel.

use core::fmt::Write;

use heapless::String;

use crate::config::LCD_COLS;
use crate::error::Error;
use crate::fsm::FsmState;
use crate::ui::{CharPanel, Frame};

/// One display row, at most `LCD_COLS` characters.
pub type Row = String<LCD_COLS>;

/// Shown on the menu screen until the clock has been read once.
pub const NO_TIME: &str = "--:--:--";

/// Truncate `text` to the panel width.
pub fn fit(text: &str) -> Row {
    let mut row = Row::new();
    for ch in text.chars() {
        if row.push(ch).is_err() {
            break;
        }
    }
    row
}

pub fn startup_rows() -> [Row; 2] {
    [fit("System Ready"), fit("Loading...")]
}

/// Both rows for `frame.state`.
pub fn compose(frame: &Frame<'_>) -> [Row; 2] {
    match frame.state {
        FsmState::Menu => {
            let mut top: String<24> = String::new();
            let _ = write!(top, "Menu [{}/{}]", frame.menu_index + 1, frame.menu.len());

            let hms = frame.time.map(|t| t.format_hms());
            let time = hms.as_ref().map(|s| s.as_str()).unwrap_or(NO_TIME);
            let mut bottom: String<48> = String::new();
            let _ = write!(bottom, "> {} {}", frame.current_item(), time);

            [fit(&top), fit(&bottom)]
        }
        FsmState::Settings => [fit("Settings"), fit("Configure System")],
        FsmState::About => [fit("About"), fit("Panel Menu v1.0")],
        FsmState::ConfirmExit => [fit("Exit System?"), fit("SEL1:Yes SEL2:No")],
    }
}

fn write_rows<L: CharPanel>(panel: &mut L, rows: &[Row; 2]) -> Result<(), Error> {
    for (row, text) in rows.iter().enumerate() {
        panel.write_line(row as u8, text)?;
    }
    Ok(())
}

pub(crate) fn init<L: CharPanel>(panel: &mut L) -> Result<(), Error> {
    panel.init_panel()?;
    panel.set_backlight(true)?;
    panel.clear()?;
    write_rows(panel, &startup_rows())
}

pub(crate) fn render<L: CharPanel>(panel: &mut L, frame: &Frame<'_>) -> Result<(), Error> {
    write_rows(panel, &compose(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DateTime;
    use crate::config::MENU_ITEMS;
    use crate::todo::TodoSummary;

    fn frame(state: FsmState, menu_index: usize, time: Option<DateTime>) -> Frame<'static> {
        Frame {
            state,
            menu: &MENU_ITEMS,
            menu_index,
            time,
            todo: TodoSummary::default(),
        }
    }

    #[test]
    fn menu_rows_show_position_item_and_time() {
        let t = DateTime::new(2024, 5, 1, 7, 8, 9);
        let [top, bottom] = compose(&frame(FsmState::Menu, 0, Some(t)));
        assert_eq!(top.as_str(), "Menu [1/4]");
        assert_eq!(bottom.as_str(), "> Home 07:08:09");
    }

    #[test]
    fn menu_without_clock_shows_placeholder() {
        let [_, bottom] = compose(&frame(FsmState::Menu, 2, None));
        assert_eq!(bottom.as_str(), "> About --:--:--");
    }

    #[test]
    fn long_rows_are_truncated_to_width() {
        let t = DateTime::new(2024, 5, 1, 12, 0, 0);
        let [_, bottom] = compose(&frame(FsmState::Menu, 1, Some(t)));
        assert_eq!(bottom.len(), LCD_COLS);
        assert_eq!(bottom.as_str(), "> Settings 12:00");
    }

    #[test]
    fn fixed_screens() {
        let rows = |s: FsmState| compose(&frame(s, 0, None));
        assert_eq!(rows(FsmState::Settings)[1].as_str(), "Configure System");
        assert_eq!(rows(FsmState::About)[0].as_str(), "About");
        assert_eq!(rows(FsmState::ConfirmExit)[1].as_str(), "SEL1:Yes SEL2:No");
        assert_eq!(startup_rows()[0].as_str(), "System Ready");
    }
}
