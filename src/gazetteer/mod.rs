mod resolver;
mod store;

pub use resolver::{PlaceResolver, ResolveOptions};
pub use store::{GazetteerError, GazetteerInfo, GazetteerStore};

/// Lookup normalisation shared by the store and the resolver: trimmed,
/// single-spaced, lowercased. The gazetteer file stores `name_norm` columns
/// produced the same way.
pub fn normalise_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
