use nusantara_shared::colors::Rgb;

/// Format RGBA as a CSS color string.
pub fn rgba_css((r, g, b): Rgb, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

#[cfg(test)]
mod tests {
    use super::rgba_css;

    #[test]
    fn formats_css_rgba() {
        assert_eq!(rgba_css((212, 175, 55), 0.6), "rgba(212,175,55,0.6)");
        assert_eq!(rgba_css((0, 0, 0), 1.0), "rgba(0,0,0,1)");
    }
}
