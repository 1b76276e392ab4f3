//! Facial emotions and their morph-target tables.

use crate::error::LipSyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The avatar's resting expression. Exactly one is active at a time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Emotion {
    #[default]
    Neutral = 0,
    Happy = 1,
    Sad = 2,
    Surprised = 3,
    Angry = 4,
    Thinking = 5,
}

impl Emotion {
    /// Every emotion, in ID order.
    pub const ALL: [Emotion; 6] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprised,
        Emotion::Angry,
        Emotion::Thinking,
    ];

    /// Lowercase name, as used in response tags (`[happy]`) and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprised => "surprised",
            Emotion::Angry => "angry",
            Emotion::Thinking => "thinking",
        }
    }

    /// Recover an emotion from its numeric ID.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Morph channels this emotion pulls toward, with their target weights.
    ///
    /// Neutral has no targets: every channel relaxes back to zero.
    pub fn targets(&self) -> &'static [(&'static str, f32)] {
        match self {
            Emotion::Neutral => &[],
            Emotion::Happy => &[
                ("mouthSmile", 0.7),
                ("eyeSquintLeft", 0.3),
                ("eyeSquintRight", 0.3),
                ("browInnerUp", 0.2),
            ],
            Emotion::Sad => &[
                ("mouthFrownLeft", 0.5),
                ("mouthFrownRight", 0.5),
                ("browDownLeft", 0.4),
                ("browDownRight", 0.4),
                ("browInnerUp", 0.6),
            ],
            Emotion::Surprised => &[
                ("mouthOpen", 0.5),
                ("browInnerUp", 0.8),
                ("eyeWideLeft", 0.6),
                ("eyeWideRight", 0.6),
            ],
            Emotion::Angry => &[
                ("browDownLeft", 0.7),
                ("browDownRight", 0.7),
                ("mouthFrownLeft", 0.4),
                ("mouthFrownRight", 0.4),
                ("jawForward", 0.2),
            ],
            Emotion::Thinking => &[
                ("browInnerUp", 0.5),
                ("eyeLookUpLeft", 0.3),
                ("eyeLookUpRight", 0.3),
                ("mouthPucker", 0.2),
            ],
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = LipSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LipSyncError::UnknownName {
                kind: "emotion",
                value: s.to_owned(),
            })
    }
}

/// Pull an `[emotion]` tag out of an assistant reply.
///
/// The first bracketed tag naming a known emotion wins (case-insensitive).
/// When found and the reply ends in `]`, everything from the first `[` on
/// the final line is stripped, so `"Bien [x] [happy]"` cleans to `"Bien"`.
/// Tags earlier in the text are left in place. Without a tag the text is
/// returned untouched with [`Emotion::Neutral`].
pub fn extract_emotion(text: &str) -> (String, Emotion) {
    let Some(emotion) = find_emotion_tag(text) else {
        return (text.to_owned(), Emotion::Neutral);
    };

    let trimmed = text.trim_end();
    let last_line = trimmed.rfind('\n').map_or(0, |i| i + 1);
    let clean = match trimmed[last_line..].find('[') {
        Some(open) if trimmed.ends_with(']') => trimmed[..last_line + open].trim(),
        _ => text.trim(),
    };
    (clean.to_owned(), emotion)
}

fn find_emotion_tag(text: &str) -> Option<Emotion> {
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = after.find(']')?;
        if let Ok(emotion) = after[..close].parse::<Emotion>() {
            return Some(emotion);
        }
        rest = &after[close + 1..];
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn neutral_is_default_and_empty() {
        assert_eq!(Emotion::default(), Emotion::Neutral);
        assert!(Emotion::Neutral.targets().is_empty());
    }

    #[test]
    fn target_weights_are_in_range() {
        for emotion in Emotion::ALL {
            for (channel, weight) in emotion.targets() {
                assert!(!channel.is_empty());
                assert!((0.0..=1.0).contains(weight), "{emotion}/{channel}");
            }
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HAPPY".parse::<Emotion>().unwrap(), Emotion::Happy);
        assert_eq!(" thinking ".parse::<Emotion>().unwrap(), Emotion::Thinking);
        assert!("bored".parse::<Emotion>().is_err());
    }

    #[test]
    fn ids_round_trip() {
        for e in Emotion::ALL {
            assert_eq!(Emotion::from_id(e as u8), Some(e));
        }
        assert_eq!(Emotion::from_id(6), None);
    }

    #[test]
    fn extract_trailing_tag() {
        let (clean, emotion) = extract_emotion("¡Hola! Me alegra verte. [happy]  ");
        assert_eq!(clean, "¡Hola! Me alegra verte.");
        assert_eq!(emotion, Emotion::Happy);
    }

    #[test]
    fn extract_uppercase_tag() {
        let (clean, emotion) = extract_emotion("Vaya... [SAD]");
        assert_eq!(clean, "Vaya...");
        assert_eq!(emotion, Emotion::Sad);
    }

    #[test]
    fn extract_without_tag_is_neutral() {
        let (clean, emotion) = extract_emotion("Sin etiqueta [nota]");
        assert_eq!(clean, "Sin etiqueta [nota]");
        assert_eq!(emotion, Emotion::Neutral);
    }

    #[test]
    fn extract_mid_text_tag_keeps_text() {
        let (clean, emotion) = extract_emotion("[thinking] Déjame pensar");
        assert_eq!(clean, "[thinking] Déjame pensar");
        assert_eq!(emotion, Emotion::Thinking);
    }

    #[test]
    fn extract_skips_unknown_tags() {
        let (_, emotion) = extract_emotion("[x] texto [angry]");
        assert_eq!(emotion, Emotion::Angry);
    }

    #[test]
    fn extract_strips_from_first_bracket_on_last_line() {
        let (clean, emotion) = extract_emotion("Claro [nota] y listo [happy]");
        assert_eq!(clean, "Claro");
        assert_eq!(emotion, Emotion::Happy);

        let (clean, emotion) = extract_emotion("Línea [uno]\nLínea dos [sad]\n");
        assert_eq!(clean, "Línea [uno]\nLínea dos");
        assert_eq!(emotion, Emotion::Sad);
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Emotion::Surprised).unwrap();
        assert_eq!(json, "\"surprised\"");
    }
}
