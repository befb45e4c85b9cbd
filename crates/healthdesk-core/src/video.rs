//! Jitsi Meet links for video consultations.

const JITSI_BASE: &str = "https://meet.jit.si";

/// Room name derived from a doctor's name, or None when the name is blank.
pub fn jitsi_room(doctor_name: &str) -> Option<String> {
    let trimmed = doctor_name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace(' ', "_").to_lowercase())
}

pub fn jitsi_url(room: &str) -> String {
    format!("{}/{}", JITSI_BASE, room)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_from_name() {
        assert_eq!(jitsi_room("  Dr. Anil Sharma "), Some("dr._anil_sharma".to_string()));
        assert_eq!(jitsi_room("   "), None);
        assert_eq!(jitsi_url("dr._anil_sharma"), "https://meet.jit.si/dr._anil_sharma");
    }
}
