/// Returns a cached value or computes, stores and returns it.
///
/// # Arguments
/// * `$cache`: anything with `get_from_cache` and `set_in_background` methods.
/// * `$key`: the `CacheKey` to read and write.
/// * `$ttl`: time-to-live in seconds for a freshly computed value.
/// * `$block`: a future producing `AppResult<T>`, awaited only on a miss.
///
/// A failed cache read is logged and treated as a miss.
///
/// # Example
/// ```rust,ignore
/// let neighbors = cached!(cache, key, ttl, async move {
///     generation.similar_to(movie_id.as_str(), limit)
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let hit = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %$key, "Cache read failed, computing value");
                None
            }
        };
        match hit {
            Some(cached) => Ok(cached),
            None => match $block.await {
                Ok(value) => {
                    $cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
                Err(e) => Err(e),
            },
        }
    }};
}
