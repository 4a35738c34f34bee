/// A macro to simplify read-through caching.
///
/// Checks the cache for `$key`. On a hit the cached value is returned; on a
/// miss the provided future is awaited, its value stored under `$key` with
/// the region's default TTL, and returned. Errors from the future propagate
/// with `?` and nothing is cached.
///
/// # Arguments
/// * `$cache`: The `Cache` to read from and write to.
/// * `$key`: The `CacheKey` the value lives under.
/// * `$block`: A future producing `AppResult<T>`, awaited only on a miss.
///
/// # Example
/// ```rust,ignore
/// let ids: AppResult<Vec<MovieId>> = cached!(cache, CacheKey::UserRatedIds(user_id), async {
///     store.find_rated_movie_ids(user_id).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get(&key) {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set(&key, &value);
            Ok(value)
        }
    }};
}
