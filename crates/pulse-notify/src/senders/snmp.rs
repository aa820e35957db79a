//! SNMPv2c trap sender, hand-rolled at the BER/ASN.1 level.
//!
//! No actively maintained async SNMP crate exists in this dependency
//! vintage's ecosystem (see `DESIGN.md`), so this sender builds the
//! handful of fields a v2c trap PDU needs directly: an SNMPv2-Trap-PDU
//! wrapped in the standard community-string message envelope, sent over
//! UDP to the configured trap receiver. Sub-OIDs `1.{1..6}` under the
//! configured prefix carry alert_id/device_id/tenant_id/severity/
//! message/timestamp (`spec.md` §6).

use async_trait::async_trait;
use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::time::Duration;

use pulse_protocol::channel::{AlertPayload, SendOutcome};

use crate::senders::Sender;

#[derive(Debug, Deserialize)]
struct SnmpConfig {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_community")]
    community: String,
}

fn default_port() -> u16 {
    162
}
fn default_community() -> String {
    "public".to_string()
}

pub struct SnmpSender {
    oid_prefix: String,
    timeout: Duration,
}

impl SnmpSender {
    pub fn new(oid_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            oid_prefix: oid_prefix.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Sender for SnmpSender {
    async fn send(&self, payload: &AlertPayload, config: &serde_json::Value) -> SendOutcome {
        let config: SnmpConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(err) => return SendOutcome::Permanent(format!("invalid snmp config: {err}")),
        };

        let trap = match build_trap_pdu(&self.oid_prefix, &config.community, payload) {
            Ok(trap) => trap,
            Err(err) => return SendOutcome::Permanent(format!("invalid snmp oid prefix: {err}")),
        };

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(err) => return SendOutcome::Transient(err.to_string()),
        };

        let send = async {
            socket.connect((config.host.as_str(), config.port)).await?;
            socket.send(&trap).await
        };

        match tokio::time::timeout(self.timeout, send).await {
            // v2c traps are fire-and-forget (no ack semantics); a
            // successful local send is the only success signal we have.
            Ok(Ok(_)) => SendOutcome::Ok,
            Ok(Err(err)) => SendOutcome::Transient(err.to_string()),
            Err(_) => SendOutcome::Transient("snmp trap send timed out".to_string()),
        }
    }
}

/// Parse a dotted OID string (e.g. `1.3.6.1.4.1.99999`) into its arcs.
fn parse_oid(oid: &str) -> Result<Vec<u32>, String> {
    oid.split('.')
        .map(|arc| arc.parse::<u32>().map_err(|_| format!("bad oid arc: {arc}")))
        .collect()
}

/// BER-encode a single OID arc using the standard base-128 continuation
/// encoding (high bit set on every byte but the last).
fn encode_oid_arcs(arcs: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    // The first two arcs are packed into one byte: 40*X + Y.
    if arcs.len() >= 2 {
        out.push((arcs[0] * 40 + arcs[1]) as u8);
    }
    for &arc in &arcs[2.min(arcs.len())..] {
        let mut bytes = Vec::new();
        let mut value = arc;
        bytes.push((value & 0x7f) as u8);
        value >>= 7;
        while value > 0 {
            bytes.push(((value & 0x7f) as u8) | 0x80);
            value >>= 7;
        }
        bytes.reverse();
        out.extend(bytes);
    }
    out
}

fn ber_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes = len.to_be_bytes();
        let trimmed: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
        let mut out = vec![0x80 | trimmed.len() as u8];
        out.extend(trimmed);
        out
    }
}

fn ber_tlv(tag: u8, value: Vec<u8>) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend(ber_length(value.len()));
    out.extend(value);
    out
}

fn ber_integer(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    ber_tlv(0x02, bytes)
}

fn ber_octet_string(value: &[u8]) -> Vec<u8> {
    ber_tlv(0x04, value.to_vec())
}

fn ber_oid(oid: &str) -> Result<Vec<u8>, String> {
    let arcs = parse_oid(oid)?;
    Ok(ber_tlv(0x06, encode_oid_arcs(&arcs)))
}

/// Build one `VarBind` sequence: `{OID, value}`.
fn var_bind(oid: &str, value: Vec<u8>) -> Result<Vec<u8>, String> {
    let mut body = ber_oid(oid)?;
    body.extend(value);
    Ok(ber_tlv(0x30, body))
}

/// Build the full SNMPv2c trap datagram: message envelope wrapping the
/// community string and a `SNMPv2-Trap-PDU` (tag 0xA7) varbind list.
fn build_trap_pdu(oid_prefix: &str, community: &str, payload: &AlertPayload) -> Result<Vec<u8>, String> {
    let varbinds = vec![
        var_bind(&format!("{oid_prefix}.1"), ber_octet_string(payload.alert_id.to_string().as_bytes()))?,
        var_bind(&format!("{oid_prefix}.2"), ber_octet_string(payload.device_id.as_bytes()))?,
        var_bind(&format!("{oid_prefix}.3"), ber_octet_string(payload.tenant_id.as_bytes()))?,
        var_bind(&format!("{oid_prefix}.4"), ber_integer(payload.severity as i64))?,
        var_bind(&format!("{oid_prefix}.5"), ber_octet_string(payload.summary.as_bytes()))?,
        var_bind(&format!("{oid_prefix}.6"), ber_octet_string(payload.triggered_at.to_rfc3339().as_bytes()))?,
    ];
    let varbind_list = ber_tlv(0x30, varbinds.concat());

    let mut pdu_body = ber_integer(1); // request-id
    pdu_body.extend(ber_integer(0)); // error-status
    pdu_body.extend(ber_integer(0)); // error-index
    pdu_body.extend(varbind_list);
    let pdu = ber_tlv(0xA7, pdu_body);

    let mut message_body = ber_integer(1); // version: snmpv2c = 1
    message_body.extend(ber_octet_string(community.as_bytes()));
    message_body.extend(pdu);

    Ok(ber_tlv(0x30, message_body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_payload() -> AlertPayload {
        AlertPayload {
            alert_id: Uuid::nil(),
            tenant_id: "acme".into(),
            device_id: "dev-1".into(),
            severity: 4,
            alert_type: "temp_high".into(),
            summary: "temp too high".into(),
            details: serde_json::json!({}),
            triggered_at: Utc::now(),
            site_id: None,
            _test: None,
        }
    }

    #[test]
    fn oid_arcs_encode_and_pack_first_two() {
        let encoded = encode_oid_arcs(&[1, 3, 6, 1, 4, 1, 99999]);
        // first byte packs 1*40+3 = 43
        assert_eq!(encoded[0], 43);
    }

    #[test]
    fn large_arc_uses_multi_byte_base128() {
        // 99999 doesn't fit in one base-128 byte (max 127).
        let encoded = encode_oid_arcs(&[1, 3, 6, 1, 4, 1, 99999]);
        assert!(encoded.len() > 6);
    }

    #[test]
    fn ber_length_short_form() {
        assert_eq!(ber_length(10), vec![10]);
    }

    #[test]
    fn ber_length_long_form() {
        let encoded = ber_length(200);
        assert_eq!(encoded[0], 0x80 | 1);
        assert_eq!(encoded[1], 200);
    }

    #[test]
    fn trap_pdu_builds_without_error() {
        let trap = build_trap_pdu("1.3.6.1.4.1.99999", "public", &sample_payload()).unwrap();
        assert_eq!(trap[0], 0x30);
        assert!(trap.len() > 20);
    }

    #[test]
    fn invalid_oid_prefix_rejected() {
        assert!(build_trap_pdu("not-an-oid", "public", &sample_payload()).is_err());
    }
}
