//! ST7789 240x240 SPI panel behind `esp_lcd`.

use anyhow::Result;
use core::ffi::c_void;
use log::{info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::framebuffer::{Framebuffer, FB_HEIGHT, FB_WIDTH};
use crate::render::FlushFn;

// ── Pins ────────────────────────────────────────────────────────────
const PIN_LCD_SCLK: i32 = 18;
const PIN_LCD_MOSI: i32 = 23;
const PIN_LCD_DC: i32 = 2;
const PIN_LCD_RST: i32 = 4;
const PIN_LCD_CS: i32 = -1;
const PIN_LCD_BL: i32 = 32;

// ── SPI ─────────────────────────────────────────────────────────────
const PCLK_HZ: u32 = 40_000_000;
const CHUNK_LINES: u32 = 20;
const CHUNK_BYTES: usize = (FB_WIDTH * CHUNK_LINES * 2) as usize;

/// Color transfers finished by the SPI driver, bumped from the ISR.
static TRANSFERS_DONE: AtomicU32 = AtomicU32::new(0);

unsafe extern "C" fn on_color_trans_done(
    _io: esp_idf_sys::esp_lcd_panel_io_handle_t,
    _edata: *mut esp_idf_sys::esp_lcd_panel_io_event_data_t,
    _user_ctx: *mut c_void,
) -> bool {
    TRANSFERS_DONE.fetch_add(1, Ordering::Release);
    false
}

pub fn esp_check(res: esp_idf_sys::esp_err_t, msg: &str) -> Result<()> {
    if res != esp_idf_sys::ESP_OK {
        Err(anyhow::anyhow!("{} (err {})", msg, res))
    } else {
        Ok(())
    }
}

pub struct Panel {
    io: esp_idf_sys::esp_lcd_panel_io_handle_t,
    panel: esp_idf_sys::esp_lcd_panel_handle_t,
    dma: [*mut u8; 2],
    queued: u32,
    draw_errors: u32,
}

// The handles and DMA buffers are only touched by whoever owns the Panel.
unsafe impl Send for Panel {}

impl Panel {
    pub fn init() -> Result<Panel> {
        let mut bus_cfg = esp_idf_sys::spi_bus_config_t::default();
        bus_cfg.__bindgen_anon_1.mosi_io_num = PIN_LCD_MOSI;
        bus_cfg.__bindgen_anon_2.miso_io_num = -1;
        bus_cfg.__bindgen_anon_3.quadwp_io_num = -1;
        bus_cfg.__bindgen_anon_4.quadhd_io_num = -1;
        bus_cfg.sclk_io_num = PIN_LCD_SCLK;
        bus_cfg.max_transfer_sz = CHUNK_BYTES as i32;

        let host = esp_idf_sys::spi_host_device_t_SPI2_HOST;
        esp_check(
            unsafe { esp_idf_sys::spi_bus_initialize(host, &bus_cfg, esp_idf_sys::spi_common_dma_t_SPI_DMA_CH_AUTO) },
            "spi_bus_initialize",
        )?;

        let mut io: esp_idf_sys::esp_lcd_panel_io_handle_t = std::ptr::null_mut();
        let mut io_cfg = esp_idf_sys::esp_lcd_panel_io_spi_config_t::default();
        io_cfg.cs_gpio_num = PIN_LCD_CS;
        io_cfg.dc_gpio_num = PIN_LCD_DC;
        io_cfg.spi_mode = 3;
        io_cfg.pclk_hz = PCLK_HZ;
        io_cfg.trans_queue_depth = 10;
        io_cfg.on_color_trans_done = Some(on_color_trans_done);
        io_cfg.lcd_cmd_bits = 8;
        io_cfg.lcd_param_bits = 8;
        esp_check(
            unsafe { esp_idf_sys::esp_lcd_new_panel_io_spi(host as esp_idf_sys::esp_lcd_spi_bus_handle_t, &io_cfg, &mut io) },
            "esp_lcd_new_panel_io_spi",
        )?;

        let mut panel: esp_idf_sys::esp_lcd_panel_handle_t = std::ptr::null_mut();
        let mut panel_cfg = esp_idf_sys::esp_lcd_panel_dev_config_t::default();
        panel_cfg.reset_gpio_num = PIN_LCD_RST;
        panel_cfg.__bindgen_anon_1.rgb_ele_order =
            esp_idf_sys::lcd_rgb_element_order_t_LCD_RGB_ELEMENT_ORDER_RGB;
        panel_cfg.bits_per_pixel = 16;
        esp_check(
            unsafe { esp_idf_sys::esp_lcd_new_panel_st7789(io, &panel_cfg, &mut panel) },
            "esp_lcd_new_panel_st7789",
        )?;

        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_reset(panel) }, "panel_reset")?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_init(panel) }, "panel_init")?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_invert_color(panel, true) }, "invert_color")?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_disp_on_off(panel, true) }, "disp_on")?;

        let mut dma = [std::ptr::null_mut::<u8>(); 2];
        for slot in dma.iter_mut() {
            let ptr = unsafe {
                esp_idf_sys::heap_caps_malloc(CHUNK_BYTES, esp_idf_sys::MALLOC_CAP_DMA)
            } as *mut u8;
            if ptr.is_null() {
                anyhow::bail!("failed to allocate {} byte DMA buffer", CHUNK_BYTES);
            }
            *slot = ptr;
        }

        info!("Display initialized OK ({}x{} ST7789)", FB_WIDTH, FB_HEIGHT);
        Ok(Panel {
            io,
            panel,
            dma,
            queued: 0,
            draw_errors: 0,
        })
    }

    /// Block until at most `in_flight` queued transfers are outstanding.
    fn wait_transfers(&self, in_flight: u32) {
        while self.queued.wrapping_sub(TRANSFERS_DONE.load(Ordering::Acquire)) > in_flight {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Push the whole framebuffer as big-endian RGB565, alternating between
    /// the two DMA buffers so filling overlaps the previous transfer.
    pub fn flush(&mut self, fb: &Framebuffer) {
        let mut y = 0u32;
        let mut which = 0usize;
        while y < FB_HEIGHT {
            let y_end = (y + CHUNK_LINES).min(FB_HEIGHT);

            self.wait_transfers(1);
            let chunk = unsafe { core::slice::from_raw_parts_mut(self.dma[which], CHUNK_BYTES) };
            let mut di = 0usize;
            for row in y..y_end {
                for &pixel in fb.row(row) {
                    chunk[di] = (pixel >> 8) as u8;
                    chunk[di + 1] = (pixel & 0xFF) as u8;
                    di += 2;
                }
            }

            let rc = unsafe {
                esp_idf_sys::esp_lcd_panel_draw_bitmap(
                    self.panel,
                    0,
                    y as i32,
                    FB_WIDTH as i32,
                    y_end as i32,
                    chunk.as_ptr().cast(),
                )
            };
            if rc == esp_idf_sys::ESP_OK {
                self.queued = self.queued.wrapping_add(1);
            } else {
                self.draw_errors += 1;
                if self.draw_errors == 1 || self.draw_errors % 100 == 0 {
                    warn!("draw_bitmap failed (err {}, {} total)", rc, self.draw_errors);
                }
            }

            which ^= 1;
            y = y_end;
        }
        self.wait_transfers(0);
    }

    pub fn into_flush(mut self) -> FlushFn {
        Box::new(move |fb: &Framebuffer| self.flush(fb))
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        self.wait_transfers(0);
        unsafe {
            esp_idf_sys::esp_lcd_panel_del(self.panel);
            esp_idf_sys::esp_lcd_panel_io_del(self.io);
            for ptr in self.dma {
                esp_idf_sys::heap_caps_free(ptr.cast());
            }
        }
    }
}

pub fn enable_backlight() {
    unsafe {
        let io_conf = esp_idf_sys::gpio_config_t {
            pin_bit_mask: 1u64 << (PIN_LCD_BL as u64),
            mode: esp_idf_sys::gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: esp_idf_sys::gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: esp_idf_sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: esp_idf_sys::gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        esp_idf_sys::gpio_config(&io_conf);
        esp_idf_sys::gpio_set_level(PIN_LCD_BL, 1);
    }
    info!("Backlight ON");
}
