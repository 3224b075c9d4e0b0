//! Cache key construction

/// Builds a cache key from a prefix and the parts that identify a request
///
/// Parts are joined with `:` in order; empty parts are kept so that
/// `["a", "", "b"]` and `["a", "b"]` produce different keys.
///
/// # Examples
/// ```
/// use apifetch::cache::cache_key;
///
/// assert_eq!(cache_key("events", ["fi", "page=2"]), "events:fi:page=2");
/// ```
pub fn cache_key<I, S>(prefix: &str, parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts.into_iter().fold(prefix.to_string(), |mut key, part| {
        key.push(':');
        key.push_str(part.as_ref());
        key
    })
}
