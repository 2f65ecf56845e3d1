//! Alert payload rendering for each delivery channel
//!
//! One [`AlertMessage`] is built per alert and rendered per channel: plain
//! text for SMS, subject/HTML/text for email, and title/body for push. The
//! renderings embed a map link only when a location fix exists.

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::location::Location;

/// Channel-independent alert payload
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub alert_id: Ulid,
    /// How the sender is introduced to the contact (display name or address)
    pub sender: String,
    pub body: String,
    pub location: Location,
    pub triggered_at: DateTime<Utc>,
}

impl AlertMessage {
    pub fn new(
        alert_id: Ulid,
        sender: impl Into<String>,
        body: impl Into<String>,
        location: Location,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id,
            sender: sender.into(),
            body: body.into(),
            location,
            triggered_at,
        }
    }

    fn location_line(&self) -> String {
        match self.location.maps_url() {
            Some(url) => format!("Location: {}", url),
            None => "Location: Not available".to_string(),
        }
    }

    /// Plain-text rendering for SMS
    pub fn sms_text(&self) -> String {
        format!(
            "EMERGENCY ALERT from {}\n\n{}\n\n{}\n\nTime: {}\n\nThis is an automated message from Beacon.",
            self.sender,
            self.body,
            self.location_line(),
            self.triggered_at.to_rfc3339(),
        )
    }

    /// Email subject line
    pub fn email_subject(&self) -> String {
        "Emergency Alert - Beacon".to_string()
    }

    /// HTML rendering for email
    pub fn email_html(&self) -> String {
        let location = match self.location.maps_url() {
            Some(url) => format!("<a href=\"{}\">View Location on Map</a>", url),
            None => "Not available".to_string(),
        };

        format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
             <div style=\"background-color: #dc2626; color: white; padding: 20px; text-align: center;\">\
             <h1 style=\"margin: 0; font-size: 24px;\">EMERGENCY ALERT</h1></div>\
             <div style=\"padding: 20px; background-color: #f9f9f9;\">\
             <p><strong>From:</strong> {}</p>\
             <p><strong>Time:</strong> {}</p>\
             <p><strong>Message:</strong> {}</p>\
             <p><strong>Location:</strong> {}</p></div>\
             <div style=\"padding: 20px; font-size: 12px; color: #666;\">\
             <p>This is an automated emergency alert from Beacon.</p>\
             <p>If this is a genuine emergency, please contact local authorities immediately.</p>\
             </div></div>",
            self.sender,
            self.triggered_at.to_rfc3339(),
            self.body,
            location,
        )
    }

    /// Plain-text rendering for email
    pub fn email_text(&self) -> String {
        format!(
            "EMERGENCY ALERT from {}\n\n{}\n\nTime: {}\n{}\n\nThis is an automated message from Beacon.",
            self.sender,
            self.body,
            self.triggered_at.to_rfc3339(),
            self.location_line(),
        )
    }

    /// Push notification title
    pub fn push_title(&self) -> String {
        "Emergency Alert".to_string()
    }

    /// Push notification body
    pub fn push_body(&self) -> String {
        format!("{} has activated an emergency alert", self.sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix() -> Location {
        Location::Fix {
            latitude: 40.0,
            longitude: -75.0,
            accuracy_meters: 5.0,
            captured_at: Utc::now(),
        }
    }

    fn unavailable() -> Location {
        Location::Unavailable {
            reason: "denied".to_string(),
            captured_at: Utc::now(),
        }
    }

    fn message(location: Location) -> AlertMessage {
        AlertMessage::new(Ulid::new(), "u1@example.com", "Help me", location, Utc::now())
    }

    #[test]
    fn test_sms_includes_map_link_for_fix() {
        let text = message(fix()).sms_text();
        assert!(text.contains("EMERGENCY ALERT from u1@example.com"));
        assert!(text.contains("https://maps.google.com/?q=40,-75"));
        assert!(text.contains("Help me"));
    }

    #[test]
    fn test_sms_without_fix() {
        let text = message(unavailable()).sms_text();
        assert!(text.contains("Location: Not available"));
    }

    #[test]
    fn test_email_renderings() {
        let msg = message(fix());
        assert_eq!(msg.email_subject(), "Emergency Alert - Beacon");
        assert!(msg.email_html().contains("View Location on Map"));
        assert!(msg.email_text().contains("EMERGENCY ALERT"));
    }

    #[test]
    fn test_push_body_names_sender() {
        let msg = message(unavailable());
        assert_eq!(msg.push_title(), "Emergency Alert");
        assert!(msg.push_body().contains("u1@example.com"));
    }
}
