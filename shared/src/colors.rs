/// An sRGB color triple.
pub type Rgb = (u8, u8, u8);

/// Fallback color for empires without an explicit palette entry.
/// Deterministic via CRC32 of the empire id; returns the first 3 bytes of the hash.
pub fn empire_color(id: &str) -> Rgb {
    let hash = crc32fast::hash(id.as_bytes());
    let bytes = hash.to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// Parse `#rrggbb` or `#rgb` (leading `#` optional, case-insensitive).
pub fn parse_hex_color(value: &str) -> Option<Rgb> {
    let hex = value.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        3 => {
            let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            let r = channels.next()??;
            let g = channels.next()??;
            let b = channels.next()??;
            Some((r, g, b))
        }
        _ => None,
    }
}

pub fn to_hex((r, g, b): Rgb) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Convert RGB to HSL. Returns (h: 0..360, s: 0..1, l: 0..1).
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;

    if d.abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let sector = if max == r {
        ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (sector * 60.0, s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    if s.abs() < f64::EPSILON {
        let v = channel(l);
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let h = h.rem_euclid(360.0) / 360.0;

    (
        channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        channel(hue_to_rgb(p, q, h)),
        channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

fn channel(unit: f64) -> u8 {
    (unit.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Raise HSL lightness by `amount` (0..1), keeping hue and saturation. Used for hover fills.
pub fn brighten(color: Rgb, amount: f64) -> Rgb {
    let (h, s, l) = rgb_to_hsl(color.0, color.1, color.2);
    hsl_to_rgb(h, s, (l + amount).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-9,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_hex_color("#D4AF37"), Some((0xd4, 0xaf, 0x37)));
        assert_eq!(parse_hex_color("329ccd"), Some((0x32, 0x9c, 0xcd)));
        assert_eq!(parse_hex_color("#ccc"), Some((0xcc, 0xcc, 0xcc)));
        assert_eq!(parse_hex_color("  #8b4513 "), Some((0x8b, 0x45, 0x13)));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
        assert_eq!(parse_hex_color("gold"), None);
    }

    #[test]
    fn hex_formatting_is_lowercase_and_padded() {
        assert_eq!(to_hex((0xd4, 0xaf, 0x37)), "#d4af37");
        assert_eq!(to_hex((0, 5, 10)), "#00050a");
        assert_eq!(parse_hex_color(&to_hex((1, 2, 3))), Some((1, 2, 3)));
    }

    #[test]
    fn roundtrip_rgb_through_hsl_is_identity() {
        let samples = [
            (0, 0, 0),
            (255, 255, 255),
            (128, 128, 128),
            (255, 0, 0),
            (0, 255, 0),
            (0, 0, 255),
            (212, 175, 55),
            (50, 156, 205),
            (139, 69, 19),
        ];

        for (r, g, b) in samples {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            assert_eq!(hsl_to_rgb(h, s, l), (r, g, b));
        }
    }

    #[test]
    fn rgb_to_hsl_pure_primaries() {
        let (h, s, l) = rgb_to_hsl(255, 0, 0);
        assert_close(h, 0.0);
        assert_close(s, 1.0);
        assert_close(l, 0.5);

        let (h, _, _) = rgb_to_hsl(0, 255, 0);
        assert_close(h, 120.0);

        let (h, _, _) = rgb_to_hsl(0, 0, 255);
        assert_close(h, 240.0);

        // magenta sits just below the wrap
        let (h, _, _) = rgb_to_hsl(255, 0, 255);
        assert_close(h, 300.0);
    }

    #[test]
    fn brighten_raises_lightness_only() {
        let gold = (0xd4, 0xaf, 0x37);
        let (h0, s0, l0) = rgb_to_hsl(gold.0, gold.1, gold.2);
        let lighter = brighten(gold, 0.1);
        let (h1, s1, l1) = rgb_to_hsl(lighter.0, lighter.1, lighter.2);

        assert!(l1 > l0);
        assert!((h1 - h0).abs() < 2.0, "hue drifted from {h0} to {h1}");
        assert!((s1 - s0).abs() < 0.05, "saturation drifted from {s0} to {s1}");
    }

    #[test]
    fn brighten_saturates_at_white() {
        assert_eq!(brighten((200, 200, 200), 1.0), (255, 255, 255));
        assert_eq!(brighten((10, 20, 30), 0.0), (10, 20, 30));
    }

    #[test]
    fn empire_color_is_deterministic_and_distinct() {
        assert_eq!(empire_color("majapahit"), empire_color("majapahit"));
        assert_ne!(empire_color("majapahit"), empire_color("srivijaya"));
    }
}
