//! `qrcode.star`: QR codes rendered as PNG images sized for the display.
//!
//! `qrcode.generate(url, size, color="#fff", background="#000")` returns
//! PNG bytes with one pixel per module and no quiet zone. `size` picks the
//! symbol version: `small` is 21 pixels wide, `medium` 25 and `large` 29.

use image::{ImageFormat, Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode, Version};
use std::io::Cursor;
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "small" => Some(Size::Small),
            "medium" => Some(Size::Medium),
            "large" => Some(Size::Large),
            _ => None,
        }
    }

    fn version(self) -> Version {
        match self {
            Size::Small => Version::Normal(1),
            Size::Medium => Version::Normal(2),
            Size::Large => Version::Normal(3),
        }
    }
}

/// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(spec: &str) -> Option<Rgba<u8>> {
    let hex = spec.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
    let long = |i: usize| channel(&hex[2 * i..2 * i + 2]);
    let [r, g, b, a] = match hex.len() {
        3 => [short(0)?, short(1)?, short(2)?, 255],
        4 => [short(0)?, short(1)?, short(2)?, short(3)?],
        6 => [long(0)?, long(1)?, long(2)?, 255],
        8 => [long(0)?, long(1)?, long(2)?, long(3)?],
        _ => return None,
    };
    Some(Rgba([r, g, b, a]))
}

pub fn render(
    data: &str,
    size: Size,
    color: Rgba<u8>,
    background: Rgba<u8>,
) -> Result<RgbaImage, EvalError> {
    let code = QrCode::with_version(data, size.version(), EcLevel::L)
        .map_err(|e| EvalError::msg(format!("qrcode.generate: {e}")))?;
    let width = code.width();
    let mut img = RgbaImage::from_pixel(width as u32, width as u32, background);
    for (i, module) in code.to_colors().into_iter().enumerate() {
        if module == Color::Dark {
            img.put_pixel((i % width) as u32, (i / width) as u32, color);
        }
    }
    Ok(img)
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, EvalError> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| EvalError::msg(format!("qrcode.generate: encoding png: {e}")))?;
    Ok(out)
}

fn color_arg(param: &str, spec: &str) -> Result<Rgba<u8>, EvalError> {
    parse_color(spec)
        .ok_or_else(|| EvalError::msg(format!("qrcode.generate: {param}: invalid color {spec:?}")))
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("qrcode")
        .function("generate", |_thread, args| {
            let mut p = args.parser("qrcode.generate");
            let url: String = p.required("url")?;
            let size: String = p.required("size")?;
            let color: String = p.or_default("color", "#fff".to_string())?;
            let background: String = p.or_default("background", "#000".to_string())?;
            p.finish()?;
            let size = Size::parse(&size).ok_or_else(|| {
                EvalError::msg(format!(
                    "qrcode.generate: size must be small, medium or large, got {size:?}"
                ))
            })?;
            let img = render(
                &url,
                size,
                color_arg("color", &color)?,
                color_arg("background", &background)?,
            )?;
            encode_png(&img).map(Value::Bytes)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn colors_in_every_notation() {
        assert_eq!(parse_color("#fff"), Some(WHITE));
        assert_eq!(parse_color("#0000"), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(parse_color("#ff8000"), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(parse_color("#ff800080"), Some(Rgba([255, 128, 0, 128])));
        assert_eq!(parse_color("fff"), None);
        assert_eq!(parse_color("#ggg"), None);
        assert_eq!(parse_color("#ff80"), Some(Rgba([255, 255, 136, 0])));
    }

    #[test]
    fn size_picks_symbol_width() {
        for (size, width) in [(Size::Small, 21), (Size::Medium, 25), (Size::Large, 29)] {
            let img = render("https://tidbyt.com", size, WHITE, BLACK).unwrap();
            assert_eq!(img.dimensions(), (width, width));
        }
    }

    #[test]
    fn finder_pattern_uses_foreground() {
        let img = render("hi", Size::Small, WHITE, BLACK).unwrap();
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(1, 1), BLACK);
    }

    #[test]
    fn data_too_long_for_size_is_an_error() {
        let long = "x".repeat(200);
        let err = render(&long, Size::Small, WHITE, BLACK).unwrap_err();
        assert!(err.to_string().starts_with("qrcode.generate:"));
    }

    #[test]
    fn output_is_png() {
        let img = render("hi", Size::Small, WHITE, BLACK).unwrap();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
