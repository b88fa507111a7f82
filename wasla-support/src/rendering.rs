//! Text rendering for resolution diagnostics.
//!
//! Turns the in-flight resolution chain and registered capability names
//! into output a developer can act on.

/// Renders a resolution chain on one line.
///
/// # Examples
/// ```
/// use wasla_support::rendering::render_chain;
///
/// let chain = ["Client", "Server", "Client"];
/// assert_eq!(render_chain(&chain), "Client → Server → Client");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// One step of a resolution chain for vertical rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// Capability being resolved at this step
    pub type_name: String,
    /// Scope of the definition that serves it (e.g. "Shared")
    pub scope: String,
    /// Capability originally requested, when reached through forwarding
    pub forwarded_from: Option<String>,
}

/// Renders a resolution chain top-down with scope annotations.
///
/// ```text
/// [Singleton] Database
///             ↓
/// [Shared]    Session  (via: dyn Store)
/// ```
pub fn render_chain_vertical(entries: &[ChainEntry]) -> String {
    let width = entries.iter().map(|e| e.scope.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(width + 3));
            out.push_str("↓\n");
        }

        out.push_str(&format!(
            "[{:<width$}] {}",
            entry.scope,
            entry.type_name,
            width = width,
        ));

        if let Some(ref via) = entry.forwarded_from {
            out.push_str(&format!("  (via: {via})"));
        }

        out.push('\n');
    }

    out
}

/// Strips module paths from a fully qualified type name.
///
/// ```
/// use wasla_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::net::Server"), "Server");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::store::Store>"),
///     "Arc<dyn Store>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '&' | '[' | ']' | ';' => {
                out.push_str(&segment);
                out.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    out.push_str(&segment);
    out
}

/// Suggests registered names that look like `requested`.
///
/// Substring matches on the full name score highest, then matches on
/// the shortened name, then a shared prefix of at least three characters.
/// Returns at most `max_suggestions` names, best first, without duplicates.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    if max_suggestions == 0 {
        return Vec::new();
    }

    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let full = name.to_lowercase();
            let short = shorten_type_name(name).to_lowercase();

            if full.contains(&requested_full) || requested_full.contains(&full) {
                return Some((name, 100));
            }

            if short.contains(&requested_short) || requested_short.contains(&short) {
                return Some((name, 80));
            }

            let common = short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
