/// The user's UI locale as reported by the OS (for example `de-DE` or
/// `en_GB.UTF-8`), or `None` when it cannot be determined.
#[must_use]
pub fn system_locale() -> Option<String> {
    let locale = sys_locale::get_locale()?;
    let trimmed = locale.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("C") || trimmed == "POSIX" {
        return None;
    }
    Some(trimmed.to_string())
}
