use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::Handle;

/// Channel reference: optional scheme, `t.me` or `telegram.me`, optional
/// `joinchat/` segment, then the handle.
pub const CHANNEL_LINK_PATTERN: &str =
    r"(?i:https?://)?(?i:t\.me|telegram\.me)/(?i:joinchat/)?([A-Za-z0-9_]+)";

static CHANNEL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHANNEL_LINK_PATTERN).expect("valid channel link pattern"));

/// Collects every channel handle referenced in `text`, normalized.
///
/// Pure and deterministic; the ordered set keeps output stable across runs.
pub fn extract_handles(text: &str) -> BTreeSet<Handle> {
    CHANNEL_LINK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| Handle::parse(m.as_str()).ok())
        .collect()
}
