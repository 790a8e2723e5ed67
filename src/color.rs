//! Legacy colour codes (`&a`, `§c`, ...).

/// Turn `&`-prefixed colour codes into section-sign codes.
pub fn translate_color_codes(text: &str) -> String {
    regex!(r"&([0-9a-fk-orA-FK-OR])").replace_all(text, "§$1").into_owned()
}

/// Remove colour codes in both the `&` and `§` forms.
pub fn strip_colors(text: &str) -> String {
    regex!(r"[&§][0-9a-fk-orA-FK-OR]").replace_all(text, "").into_owned()
}
