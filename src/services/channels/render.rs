//! Channel payloads built from a notification's precomputed text and metadata.

use serde::Serialize;

use crate::db::models::{ReleaseNotification, SubjectKind};

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseLink {
    pub event_id: String,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub data: ReleaseLink,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailPayload {
    pub user_id: String,
    pub subject: String,
    pub html: String,
    pub metadata: ReleaseLink,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmsPayload {
    pub user_id: String,
    pub message: String,
}

pub fn release_link(entry: &ReleaseNotification) -> ReleaseLink {
    ReleaseLink {
        event_id: entry.event_id.clone(),
        subject_kind: entry.subject_kind,
        subject_id: entry.subject_id.clone(),
        image_url: entry.metadata.image_url.clone(),
        external_url: entry.metadata.external_url.clone(),
    }
}

pub fn push_payload(entry: &ReleaseNotification) -> PushPayload {
    PushPayload {
        user_id: entry.user_id.clone(),
        title: entry.title.clone(),
        body: entry.message.clone(),
        data: release_link(entry),
    }
}

pub fn email_payload(entry: &ReleaseNotification) -> EmailPayload {
    EmailPayload {
        user_id: entry.user_id.clone(),
        subject: entry.title.clone(),
        html: email_html(entry),
        metadata: release_link(entry),
    }
}

pub fn sms_payload(entry: &ReleaseNotification) -> SmsPayload {
    SmsPayload {
        user_id: entry.user_id.clone(),
        message: format!("{}: {}", entry.title, entry.message),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn currency_symbol(currency: Option<&str>) -> &str {
    match currency {
        Some("USD") | Some("MXN") | Some("CAD") | Some("AUD") | None => "$",
        Some("EUR") => "€",
        Some("GBP") => "£",
        Some(other) => other,
    }
}

/// Render the HTML body of a release email.
pub fn email_html(entry: &ReleaseNotification) -> String {
    let meta = &entry.metadata;
    let mut html = String::new();

    html.push_str(r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#);
    html.push_str(&format!(
        r#"<h2 style="color: #ff6b6b;">{}</h2>"#,
        escape_html(&entry.title)
    ));
    html.push_str(&format!(
        r#"<p style="font-size: 16px; line-height: 1.5;">{}</p>"#,
        escape_html(&entry.message)
    ));

    if let Some(image) = &meta.image_url {
        html.push_str(&format!(
            r#"<img src="{}" alt="Release artwork" style="max-width: 100%; height: auto; border-radius: 8px; margin: 20px 0;">"#,
            escape_html(image)
        ));
    }

    if let Some(price) = meta.price {
        html.push_str(&format!(
            r#"<p style="font-size: 18px; font-weight: bold; color: #ff6b6b;">{}{:.2}</p>"#,
            escape_html(currency_symbol(meta.currency.as_deref())),
            price
        ));
    }

    if let Some(url) = &meta.external_url {
        let label = match entry.subject_kind {
            SubjectKind::Music => "Listen now",
            SubjectKind::Merch => "Buy now",
        };
        html.push_str(&format!(
            r#"<a href="{}" style="display: inline-block; background: #ff6b6b; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: bold;">{}</a>"#,
            escape_html(url),
            label
        ));
    }

    html.push_str(
        r#"<p style="color: #666; font-size: 14px; margin-top: 30px;">You are receiving this because you showed interest in this event. You can manage your notification preferences in your profile.</p>"#,
    );
    html.push_str("</div>");
    html
}
