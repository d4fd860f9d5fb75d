use anyhow::{Context, Result};
use chrono_tz::Tz;
use slotwise_core::time::local_to_utc;
use slotwise_core::Event;

/// Emit an ICS calendar with one VEVENT per committed AI session.
///
/// DTSTART/DTEND are UTC; local times are resolved in `tz`. UIDs are the
/// stored event ids, so re-importing updates instead of duplicating.
pub fn sessions_to_ics(events: &[Event], tz: Tz) -> Result<String> {
    let mut s = String::new();
    s.push_str("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//Slotwise//EN\n");

    for e in events.iter().filter(|e| e.is_ai_generated()) {
        let start = local_to_utc(e.start, tz).with_context(|| format!("event {}", e.id))?;
        let end = local_to_utc(e.end, tz).with_context(|| format!("event {}", e.id))?;

        s.push_str("BEGIN:VEVENT\n");
        s.push_str(&format!("UID:{}@slotwise\n", e.id));
        s.push_str(&format!("DTSTART:{}\n", start.format("%Y%m%dT%H%M%SZ")));
        s.push_str(&format!("DTEND:{}\n", end.format("%Y%m%dT%H%M%SZ")));
        s.push_str(&format!("SUMMARY:{}\n", escape_ics(&e.title)));
        if let Some(desc) = e.description.as_deref() {
            s.push_str(&format!("DESCRIPTION:{}\n", escape_ics(desc)));
        }
        s.push_str("END:VEVENT\n");
    }

    s.push_str("END:VCALENDAR\n");
    Ok(s)
}

fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}
