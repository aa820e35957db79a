//! Test-delivery rate-limit counter: 5 per tenant per minute
//! (`spec.md` §4.5), backed by a per-minute-bucket row rather than an
//! in-process limiter since the synchronous test-delivery path may be
//! served by any worker process.

use chrono::{DateTime, Timelike, Utc};
use sqlx::PgConnection;

use crate::error::GatewayResult;

const LIMIT_PER_MINUTE: i32 = 5;

fn minute_bucket(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(now.hour(), now.minute(), 0)
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or(now)
}

/// Increment this tenant's counter for the current minute bucket and
/// report whether the call is still within the limit.
pub async fn try_consume(conn: &mut PgConnection, tenant_id: &str, now: DateTime<Utc>) -> GatewayResult<bool> {
    let bucket = minute_bucket(now);
    let (count,): (i32,) = sqlx::query_as(
        "INSERT INTO test_delivery_counter (tenant_id, minute_bucket, count) \
         VALUES ($1, $2, 1) \
         ON CONFLICT (tenant_id, minute_bucket) DO UPDATE SET count = test_delivery_counter.count + 1 \
         RETURNING count",
    )
    .bind(tenant_id)
    .bind(bucket)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count <= LIMIT_PER_MINUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_bucket_truncates_seconds() {
        let now = Utc::now();
        let bucket = minute_bucket(now);
        assert_eq!(bucket.format("%S").to_string(), "00");
    }
}
