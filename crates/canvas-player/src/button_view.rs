//! Overlay button markup.

pub const PLAY_BUTTON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><circle cx="100" cy="100" r="90" fill="none" stroke-width="15" stroke="#fff"/><polygon points="70,55 70,145 145,100" fill="#fff"/></svg>"##;

pub const UNMUTE_BUTTON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 75 75"><polygon points="39.389,13.769 22.235,28.606 6,28.606 6,47.699 21.989,47.699 39.389,62.75 39.389,13.769" style="stroke:#fff;stroke-width:5;stroke-linejoin:round;fill:#fff;"/><path d="M 49,50 69,26 M 69,50 49,26" style="fill:none;stroke:#fff;stroke-width:5;stroke-linecap:round"/></svg>"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_keeps_hex_colors() {
        assert!(PLAY_BUTTON.contains(r##"stroke="#fff""##));
        assert!(PLAY_BUTTON.ends_with("</svg>"));
        assert!(UNMUTE_BUTTON.contains("fill:#fff;"));
        assert!(UNMUTE_BUTTON.ends_with("</svg>"));
    }
}
