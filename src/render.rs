//! Retained widget tree for the dashboard and the loop that pushes it out.
//!
//! Tasks only change label text or the icon through the shared [`Gui`]; the
//! render loop redraws the whole frame when something changed and hands the
//! framebuffer to the flush callback.

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    text::{Alignment, Text},
};
use log::{debug, info};
use profont::{PROFONT_10_POINT, PROFONT_12_POINT, PROFONT_14_POINT, PROFONT_18_POINT, PROFONT_24_POINT};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::framebuffer::Framebuffer;
use crate::layout::*;
use crate::weather_icons::WeatherIcon;
use crate::worker::{Latch, StopSignal, Worker};

pub const RENDER_PERIOD: Duration = Duration::from_millis(50);
pub const RENDER_STACK_SIZE: usize = 8192;

pub const DATE_PLACEHOLDER: &str = "2000-01-01";
pub const CLOCK_PLACEHOLDER: &str = "00:00";

/// Receives every finished frame.
pub type FlushFn = Box<dyn FnMut(&Framebuffer) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelId {
    Date,
    Clock,
    City,
    TempRange,
    NowTemp,
    Humidity,
    Detail,
}

impl LabelId {
    pub const ALL: [LabelId; 7] = [
        LabelId::Date,
        LabelId::Clock,
        LabelId::City,
        LabelId::TempRange,
        LabelId::NowTemp,
        LabelId::Humidity,
        LabelId::Detail,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn style(self) -> (&'static MonoFont<'static>, Rgb565, Point, Alignment) {
        match self {
            LabelId::Date => (&PROFONT_14_POINT, TEXT_DATE, DATE_POS, Alignment::Center),
            LabelId::Clock => (&PROFONT_24_POINT, TEXT_CLOCK, CLOCK_POS, Alignment::Center),
            LabelId::City => (&PROFONT_12_POINT, TEXT_CITY, CITY_POS, Alignment::Left),
            LabelId::TempRange => (&PROFONT_12_POINT, TEXT_RANGE, RANGE_POS, Alignment::Left),
            LabelId::NowTemp => (&PROFONT_18_POINT, TEXT_RANGE, NOW_POS, Alignment::Left),
            LabelId::Humidity => (&PROFONT_12_POINT, TEXT_DETAIL, HUMIDITY_POS, Alignment::Left),
            LabelId::Detail => (&PROFONT_10_POINT, TEXT_DETAIL, DETAIL_POS, Alignment::Center),
        }
    }
}

pub struct RenderDriver {
    fb: Framebuffer,
    labels: [String; 7],
    icon: WeatherIcon,
    dirty: bool,
    flush: FlushFn,
    frames: u64,
}

impl RenderDriver {
    pub fn new(fb: Framebuffer, flush: FlushFn, initial_city: &str) -> Self {
        let mut labels: [String; 7] = Default::default();
        labels[LabelId::Date.index()] = DATE_PLACEHOLDER.to_string();
        labels[LabelId::Clock.index()] = CLOCK_PLACEHOLDER.to_string();
        labels[LabelId::City.index()] = initial_city.to_string();
        Self {
            fb,
            labels,
            icon: WeatherIcon::default(),
            dirty: true,
            flush,
            frames: 0,
        }
    }

    /// Replace a label's text. Identical text does not trigger a redraw.
    pub fn set_label(&mut self, id: LabelId, text: &str) {
        let slot = &mut self.labels[id.index()];
        if slot != text {
            slot.clear();
            slot.push_str(text);
            self.dirty = true;
        }
    }

    pub fn label(&self, id: LabelId) -> &str {
        &self.labels[id.index()]
    }

    pub fn set_icon(&mut self, icon: WeatherIcon) {
        if self.icon != icon {
            self.icon = icon;
            self.dirty = true;
        }
    }

    pub fn icon(&self) -> WeatherIcon {
        self.icon
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Redraw and flush if anything changed since the last frame. Returns
    /// whether a frame went out.
    pub fn tick(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.compose();
        (self.flush)(&self.fb);
        self.dirty = false;
        self.frames += 1;
        if self.frames == 1 {
            info!("first frame flushed");
        }
        true
    }

    fn compose(&mut self) {
        self.fb.clear_color(BG);
        draw_frame(&mut self.fb);
        for id in LabelId::ALL {
            let text = &self.labels[id.index()];
            if text.is_empty() {
                continue;
            }
            let (font, color, pos, align) = id.style();
            let style = MonoTextStyle::new(font, color);
            Text::with_alignment(text, pos, style, align)
                .draw(&mut self.fb)
                .ok();
        }
        self.icon.draw_48(&mut self.fb, ICON_POS.x, ICON_POS.y);
    }

    pub fn frames_flushed(&self) -> u64 {
        self.frames
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }
}

/// The shared handle every task mutates widgets through.
pub type Gui = Arc<Mutex<RenderDriver>>;

pub fn new_gui(driver: RenderDriver) -> Gui {
    Arc::new(Mutex::new(driver))
}

/// Widget state is plain data, so a panic elsewhere does not invalidate it.
pub fn lock_gui(gui: &Gui) -> MutexGuard<'_, RenderDriver> {
    gui.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait for `start`, then tick the driver every [`RENDER_PERIOD`].
pub fn spawn_render_loop(gui: Gui, start: Latch, stop: StopSignal) -> io::Result<Worker> {
    Worker::spawn("render", RENDER_STACK_SIZE, move || {
        while !start.wait_timeout(RENDER_PERIOD) {
            if stop.is_stopped() {
                return;
            }
        }
        info!("render loop running");
        while stop.sleep(RENDER_PERIOD) {
            if lock_gui(&gui).tick() {
                debug!("frame flushed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{FB_HEIGHT, FB_WIDTH};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn driver() -> (RenderDriver, Arc<AtomicU32>) {
        let flushes = Arc::new(AtomicU32::new(0));
        let counter = flushes.clone();
        let flush: FlushFn = Box::new(move |_fb| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (
            RenderDriver::new(Framebuffer::new(FB_WIDTH, FB_HEIGHT), flush, "foshan"),
            flushes,
        )
    }

    #[test]
    fn starts_with_placeholders() {
        let (d, _) = driver();
        assert_eq!(d.label(LabelId::Clock), "00:00");
        assert_eq!(d.label(LabelId::Date), "2000-01-01");
        assert_eq!(d.label(LabelId::City), "foshan");
        assert_eq!(d.label(LabelId::TempRange), "");
        assert_eq!(d.icon(), WeatherIcon::Sunny);
    }

    #[test]
    fn only_changes_produce_frames() {
        let (mut d, flushes) = driver();
        assert!(d.tick());
        assert!(!d.tick());
        d.set_label(LabelId::Clock, "00:00");
        assert!(!d.tick());
        d.set_label(LabelId::Clock, "12 34");
        assert!(d.tick());
        d.set_icon(WeatherIcon::Sunny);
        assert!(!d.tick());
        d.set_icon(WeatherIcon::Rain);
        assert!(d.tick());
        assert_eq!(flushes.load(Ordering::SeqCst), 3);
        assert_eq!(d.frames_flushed(), 3);
    }

    #[test]
    fn frame_has_background_lines_and_clock_text() {
        let (mut d, _) = driver();
        d.tick();
        let fb = d.framebuffer();
        assert_eq!(fb.pixel(0, 0), Some(BG));
        assert_eq!(fb.pixel(120, TOP_LINE_Y as u32), Some(LINE_COLOR));
        assert_eq!(fb.pixel(CITY_DIVIDER_X as u32, 60), Some(LINE_COLOR));
        let clock_row_has_red = (120..170).any(|y| (60..180).any(|x| fb.pixel(x, y) == Some(TEXT_CLOCK)));
        assert!(clock_row_has_red);
    }

    #[test]
    fn render_loop_waits_for_start_latch() {
        let (d, flushes) = driver();
        let gui = new_gui(d);
        let start = Latch::new();
        let stop = StopSignal::new();
        let worker = spawn_render_loop(gui.clone(), start.clone(), stop.clone()).unwrap();

        std::thread::sleep(RENDER_PERIOD * 3);
        assert_eq!(flushes.load(Ordering::SeqCst), 0);

        start.open();
        while flushes.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        stop.stop();
        worker.join().unwrap();
        assert!(!lock_gui(&gui).is_dirty());
    }
}
