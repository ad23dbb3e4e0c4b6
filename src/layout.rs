use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};

use crate::framebuffer::Framebuffer;

/// Convert 8-bit RGB to Rgb565.
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

// ── Colors ──────────────────────────────────────────────────────────

pub const BG: Rgb565 = rgb(255, 255, 255);
pub const LINE_COLOR: Rgb565 = rgb(0, 0, 0);
pub const TEXT_DATE: Rgb565 = rgb(0, 0, 0);
pub const TEXT_CLOCK: Rgb565 = rgb(255, 0, 0);
pub const TEXT_CITY: Rgb565 = rgb(0, 0, 255);
pub const TEXT_RANGE: Rgb565 = rgb(17, 17, 17);
pub const TEXT_DETAIL: Rgb565 = rgb(60, 60, 60);

// ── Geometry (240x240 panel) ────────────────────────────────────────

pub const SCREEN_W: i32 = 240;

pub const TOP_LINE_Y: i32 = 20;
pub const MID_TOP_LINE_Y: i32 = 100;
pub const MID_BOTTOM_LINE_Y: i32 = 180;
pub const CITY_DIVIDER_X: i32 = 65;
pub const LINE_MARGIN: i32 = 5;

/// Text baselines and anchors for each widget.
pub const DATE_POS: Point = Point::new(SCREEN_W / 2, 16);
pub const CITY_POS: Point = Point::new(LINE_MARGIN + 2, 66);
pub const ICON_POS: Point = Point::new(76, 26);
pub const RANGE_POS: Point = Point::new(100, 92);
pub const NOW_POS: Point = Point::new(150, 48);
pub const HUMIDITY_POS: Point = Point::new(150, 80);
pub const CLOCK_POS: Point = Point::new(SCREEN_W / 2, 150);
pub const DETAIL_POS: Point = Point::new(SCREEN_W / 2, 212);

/// The static frame: top rule, the city/weather divider and the two rules
/// around the clock.
pub const FRAME_LINES: [(Point, Point); 4] = [
    (
        Point::new(LINE_MARGIN, TOP_LINE_Y),
        Point::new(SCREEN_W - LINE_MARGIN, TOP_LINE_Y),
    ),
    (
        Point::new(CITY_DIVIDER_X, TOP_LINE_Y),
        Point::new(CITY_DIVIDER_X, MID_TOP_LINE_Y),
    ),
    (
        Point::new(LINE_MARGIN, MID_TOP_LINE_Y),
        Point::new(SCREEN_W - LINE_MARGIN, MID_TOP_LINE_Y),
    ),
    (
        Point::new(LINE_MARGIN, MID_BOTTOM_LINE_Y),
        Point::new(SCREEN_W - LINE_MARGIN, MID_BOTTOM_LINE_Y),
    ),
];

pub fn draw_frame(fb: &mut Framebuffer) {
    let style = PrimitiveStyle::with_stroke(LINE_COLOR, 1);
    for (start, end) in FRAME_LINES {
        Line::new(start, end).into_styled(style).draw(fb).ok();
    }
}
