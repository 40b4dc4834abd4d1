pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Strips a trailing `/1` or `/2` mate suffix from a read id.
pub fn template_name(read_id: &str) -> &str {
    read_id
        .strip_suffix("/1")
        .or_else(|| read_id.strip_suffix("/2"))
        .unwrap_or(read_id)
}
