//! Notification channel queries.

use pulse_protocol::channel::{ChannelType, NotificationChannel};
use sqlx::PgConnection;
use sqlx::Row;
use uuid::Uuid;

use crate::error::GatewayResult;

pub async fn find(
    conn: &mut PgConnection,
    tenant_id: &str,
    channel_id: Uuid,
) -> GatewayResult<Option<NotificationChannel>> {
    let row = sqlx::query(
        "SELECT id, tenant_id, channel_type, config, enabled FROM notification_channel \
         WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant_id)
    .bind(channel_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(row_to_channel))
}

pub async fn enabled_for_tenant(
    conn: &mut PgConnection,
    tenant_id: &str,
) -> GatewayResult<Vec<NotificationChannel>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, channel_type, config, enabled FROM notification_channel \
         WHERE tenant_id = $1 AND enabled",
    )
    .bind(tenant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(row_to_channel).collect())
}

fn row_to_channel(row: sqlx::postgres::PgRow) -> NotificationChannel {
    NotificationChannel {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        channel_type: match row.get::<String, _>("channel_type").as_str() {
            "pagerduty" => ChannelType::Pagerduty,
            "teams" => ChannelType::Teams,
            "webhook" => ChannelType::Webhook,
            "email" => ChannelType::Email,
            "snmp" => ChannelType::Snmp,
            "mqtt" => ChannelType::Mqtt,
            _ => ChannelType::Slack,
        },
        config: row.get("config"),
        enabled: row.get("enabled"),
    }
}
