use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::review::Review;

/// Oldest timestamp kept for a `days` look-back window ending at `now`.
#[must_use]
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

/// 有効チャネルかつ `since` 以降のレビューだけを残す。順序は保持する。
#[must_use]
pub fn filter_reviews(
    reviews: Vec<Review>,
    enabled_channels: &[String],
    since: DateTime<Utc>,
) -> Vec<Review> {
    let before = reviews.len();
    let kept: Vec<Review> = reviews
        .into_iter()
        .filter(|review| {
            review.timestamp >= since
                && enabled_channels
                    .iter()
                    .any(|channel| channel == &review.channel_name)
        })
        .collect();
    debug!(before, after = kept.len(), %since, "filtered reviews");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    #[test]
    fn keeps_recent_reviews_from_enabled_channels() {
        let reviews = vec![
            Review::new("old", "x", "play-store", at(1)),
            Review::new("muted", "x", "twitter", at(18)),
            Review::new("keep-1", "x", "play-store", at(18)),
            Review::new("edge", "x", "email", at(11)),
        ];
        let channels = vec!["play-store".to_string(), "email".to_string()];

        let kept = filter_reviews(reviews, &channels, window_start(at(18), 7));

        let ids: Vec<&str> = kept.iter().map(|review| review.id.as_str()).collect();
        assert_eq!(ids, vec!["keep-1", "edge"]);
    }

    #[test]
    fn no_enabled_channels_drops_everything() {
        let reviews = vec![Review::new("1", "x", "web", at(18))];
        assert!(filter_reviews(reviews, &[], at(1)).is_empty());
    }
}
