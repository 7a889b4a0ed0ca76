//! Notification text formatting

use chrono::{Local, TimeZone};

/// Formats alert and recovery messages for the notification channel.
///
/// Keeps timestamp/locale presentation out of the escalation engine.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    service_name: String,
    service_url: String,
}

impl AlertFormatter {
    pub fn new(service_name: String, service_url: String) -> Self {
        Self {
            service_name,
            service_url,
        }
    }

    /// HTML failure alert, including the running alert sequence number
    pub fn failure_message(&self, error: &str, alert_number: u32, timestamp_epoch_ms: u64) -> String {
        format!(
            "⚠️ <b>{name} IS DOWN!</b> ⚠️\n\n\
             <b>Service:</b> {name}\n\
             <b>URL:</b> {url}\n\n\
             <b>Problem:</b> Service is not responding correctly\n\
             <b>Error:</b> {error}\n\
             <b>Time:</b> {time}\n\
             <b>Alert:</b> #{number}",
            name = self.service_name,
            url = self.service_url,
            error = error,
            time = format_local(timestamp_epoch_ms),
            number = alert_number,
        )
    }

    /// HTML recovery notice
    pub fn recovery_message(&self, timestamp_epoch_ms: u64) -> String {
        format!(
            "✅ <b>{name} IS BACK UP!</b>\n\n\
             <b>Service:</b> {name}\n\
             <b>URL:</b> {url}\n\
             <b>Recovered at:</b> {time}",
            name = self.service_name,
            url = self.service_url,
            time = format_local(timestamp_epoch_ms),
        )
    }
}

fn format_local(timestamp_epoch_ms: u64) -> String {
    Local
        .timestamp_millis_opt(timestamp_epoch_ms as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("epoch+{}ms", timestamp_epoch_ms))
}
