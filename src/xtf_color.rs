use ratatui::style::Color;
use std::sync::OnceLock;
use term_color_support::ColorSupport;

/// Colour depth of the attached terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    TrueColor,
    Indexed256,
    Basic,
}

/// Detected once; the terminal does not change under a running game
pub fn depth() -> Depth {
    static DEPTH: OnceLock<Depth> = OnceLock::new();
    *DEPTH.get_or_init(|| {
        let support = ColorSupport::stdout();
        if support.has_16m {
            Depth::TrueColor
        } else if support.has_256 {
            Depth::Indexed256
        } else {
            Depth::Basic
        }
    })
}

/// Windows Terminal "Campbell" RGB values and stable 256-colour indices
/// for the 16 named ANSI colours
fn campbell(c: Color) -> Option<((u8, u8, u8), u8)> {
    match c {
        Color::Black =>         Some(((12, 12, 12),   232)),
        Color::Red =>           Some(((197, 15, 31),  160)),
        Color::Green =>         Some(((19, 161, 14),  28)),
        Color::Yellow =>        Some(((193, 156, 0),  178)),
        Color::Blue =>          Some(((0, 55, 218),   20)),
        Color::Magenta =>       Some(((136, 23, 152), 90)),
        Color::Cyan =>          Some(((58, 150, 221), 38)),
        Color::Gray =>          Some(((204, 204, 204), 250)),
        Color::DarkGray =>      Some(((118, 118, 118), 243)),
        Color::LightRed =>      Some(((231, 72, 86),  203)),
        Color::LightGreen =>    Some(((22, 198, 12),  46)),
        Color::LightYellow =>   Some(((249, 241, 165), 229)),
        Color::LightBlue =>     Some(((59, 120, 255), 63)),
        Color::LightMagenta =>  Some(((180, 0, 158),  163)),
        Color::LightCyan =>     Some(((97, 214, 214), 116)),
        Color::White =>         Some(((242, 242, 242), 255)),
        _ => None,
    }
}

/// A trait to extend Ratatui's Color with cross-platform consistency methods.
pub trait WTMatch {
    /// Adjusts the color to match the Windows Terminal (Campbell) visual style
    /// based on the current terminal's color capabilities.
    fn wtmatch(self) -> Color;
}

impl WTMatch for Color {
    fn wtmatch(self) -> Color {
        match (campbell(self), depth()) {
            (Some(((r, g, b), _)), Depth::TrueColor) => Color::Rgb(r, g, b),
            (Some((_, index256)), Depth::Indexed256) => Color::Indexed(index256),
            _ => self,
        }
    }
}

/// RGB of a named colour, or of an already resolved Rgb colour
pub fn rgb_of(c: Color) -> Option<(u8, u8, u8)> {
    match c {
        Color::Rgb(r, g, b) => Some((r, g, b)),
        other => campbell(other).map(|(rgb, _)| rgb),
    }
}

/// Linear mix from `a` (t = 0) to `b` (t = 1)
pub fn mix_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f32) -> (u8, u8, u8) {
    let t = t.clamp(0.0, 1.0);
    let ch = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    (ch(a.0, b.0), ch(a.1, b.1), ch(a.2, b.2))
}

/// Nearest entry of the xterm 6x6x6 colour cube
pub fn rgb_to_ansi256(rgb: (u8, u8, u8)) -> u8 {
    let level = |v: u8| -> u8 {
        if v < 48 {
            0
        } else if v < 115 {
            1
        } else {
            ((v as u16 - 35) / 40) as u8
        }
    };
    16 + 36 * level(rgb.0) + 6 * level(rgb.1) + level(rgb.2)
}

/// Blend two named colours for the attached terminal; basic terminals snap to the nearer end
pub fn blend(a: Color, b: Color, t: f32) -> Color {
    blend_for(depth(), a, b, t)
}

pub fn blend_for(depth: Depth, a: Color, b: Color, t: f32) -> Color {
    let (Some(ra), Some(rb)) = (rgb_of(a), rgb_of(b)) else {
        return if t < 0.5 { a } else { b };
    };
    let mixed = mix_rgb(ra, rb, t);
    match depth {
        Depth::TrueColor => Color::Rgb(mixed.0, mixed.1, mixed.2),
        Depth::Indexed256 => Color::Indexed(rgb_to_ansi256(mixed)),
        Depth::Basic => {
            if t < 0.5 { a } else { b }
        }
    }
}
