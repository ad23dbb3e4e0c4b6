use embedded_graphics::{image::Image, pixelcolor::Rgb565, prelude::*};
use tinybmp::Bmp;

/// The four condition icons the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WeatherIcon {
    #[default]
    Sunny = 0,
    Cloud = 1,
    Overcast = 2,
    Rain = 3,
}

pub const ICON_SIZE: u32 = 48;

static ICON_SUNNY_48: &[u8] = include_bytes!("icons/sunny_48.bmp");
static ICON_CLOUD_48: &[u8] = include_bytes!("icons/cloud_48.bmp");
static ICON_OVERCAST_48: &[u8] = include_bytes!("icons/overcast_48.bmp");
static ICON_RAIN_48: &[u8] = include_bytes!("icons/rain_48.bmp");

impl WeatherIcon {
    /// Decode a raw "set icon state" value. Anything outside the four known
    /// states yields None.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Sunny),
            1 => Some(Self::Cloud),
            2 => Some(Self::Overcast),
            3 => Some(Self::Rain),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::Cloud => "Cloudy",
            Self::Overcast => "Overcast",
            Self::Rain => "Rain",
        }
    }

    fn bmp_data_48(self) -> &'static [u8] {
        match self {
            Self::Sunny => ICON_SUNNY_48,
            Self::Cloud => ICON_CLOUD_48,
            Self::Overcast => ICON_OVERCAST_48,
            Self::Rain => ICON_RAIN_48,
        }
    }

    /// Draw the 48x48 icon with its top-left corner at the given position.
    pub fn draw_48<D>(self, target: &mut D, x: i32, y: i32)
    where
        D: DrawTarget<Color = Rgb565>,
    {
        if let Ok(bmp) = Bmp::<Rgb565>::from_slice(self.bmp_data_48()) {
            Image::new(&bmp, Point::new(x, y)).draw(target).ok();
        }
    }
}
