use image::{DynamicImage, RgbaImage};
use log::warn;
use pdfshelf_engine::RgbaBitmap;
use ratatui::layout::Rect;
use ratatui_image::Resize;
use ratatui_image::picker::Picker;
use ratatui_image::protocol::Protocol as ImageProtocol;

pub(crate) fn bitmap_to_image(bitmap: &RgbaBitmap) -> Option<DynamicImage> {
    let width = u32::try_from(bitmap.width).ok()?;
    let height = u32::try_from(bitmap.height).ok()?;
    RgbaImage::from_raw(width, height, bitmap.pixels.clone()).map(DynamicImage::ImageRgba8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageImageKey {
    generation: u64,
    width: u16,
    height: u16,
}

/// Terminal encoding of the current page, rebuilt only when the session
/// hands out a new surface or the viewport changes size.
#[derive(Default)]
pub(crate) struct PageImage {
    key: Option<PageImageKey>,
    protocol: Option<ImageProtocol>,
    error: Option<String>,
}

impl PageImage {
    pub(crate) fn ensure(
        &mut self,
        picker: &Picker,
        generation: u64,
        bitmap: Option<&RgbaBitmap>,
        area: Rect,
    ) {
        let key = PageImageKey {
            generation,
            width: area.width,
            height: area.height,
        };
        if self.key == Some(key) {
            return;
        }
        self.key = Some(key);
        self.protocol = None;
        self.error = None;

        let Some(bitmap) = bitmap else {
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }
        let Some(image) = bitmap_to_image(bitmap) else {
            self.error = Some("page bitmap does not match its size".to_string());
            return;
        };
        match picker.new_protocol(image, area, Resize::Fit(None)) {
            Ok(protocol) => self.protocol = Some(protocol),
            Err(err) => {
                warn!("encode page image failed: {err:?}");
                self.error = Some("could not draw this page in the terminal".to_string());
            }
        }
    }

    pub(crate) fn protocol(&self) -> Option<&ImageProtocol> {
        self.protocol.as_ref()
    }

    pub(crate) fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
