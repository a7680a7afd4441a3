//! Line wrapping for long names and paths.

/// Default display width
pub const DISPLAY_WIDTH: usize = 45;

const SEPARATORS: [char; 3] = ['/', '_', '.'];

/// Break `text` into lines of at most `width` characters
///
/// Splits on whichever of `/`, `_` or `.` occurs most often (earlier
/// ones win ties) and keeps the separator at the end of each broken
/// line. Text without any separator, or already short enough, is
/// returned unchanged. A single segment longer than `width` stays on
/// its own line.
pub fn wrap_display(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }

    let mut best: Option<(char, usize)> = None;
    for sep in SEPARATORS {
        let count = text.matches(sep).count();
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((sep, count));
        }
    }
    let Some((sep, _)) = best else {
        return text.to_string();
    };

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let parts: Vec<&str> = text.split(sep).collect();
    let last = parts.len() - 1;

    for (i, part) in parts.into_iter().enumerate() {
        let mut piece = part.to_string();
        if i < last {
            piece.push(sep);
        }

        if !current.is_empty() && current.chars().count() + piece.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(wrap_display("IMG_01.jpg", DISPLAY_WIDTH), "IMG_01.jpg");
    }

    #[test]
    fn long_path_breaks_on_slashes() {
        let path = "/drive/root:/Pictures/2019/Holidays/Brittany/Beach/IMG_0001.jpg";
        let wrapped = wrap_display(path, 20);

        for line in wrapped.lines() {
            assert!(line.chars().count() <= 20, "line too long: {line}");
        }
        assert_eq!(wrapped.replace('\n', ""), path);
    }

    #[test]
    fn most_frequent_separator_wins() {
        let name = "holiday_photo_from_the_beach_in_summer_of_2019.jpg";
        let wrapped = wrap_display(name, 20);

        assert!(wrapped.lines().next().unwrap().ends_with('_'));
        assert_eq!(wrapped.replace('\n', ""), name);
    }

    #[test]
    fn text_without_separator_is_unchanged() {
        let long = "a".repeat(60);
        assert_eq!(wrap_display(&long, 45), long);
    }

    #[test]
    fn oversized_segment_gets_its_own_line() {
        let text = format!("short/{}/end", "x".repeat(30));
        let wrapped = wrap_display(&text, 10);
        assert_eq!(wrapped.lines().count(), 3);
    }
}
