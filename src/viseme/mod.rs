//! Viseme categories and the pure classifiers that produce them.
//!
//! A viseme is a visual mouth shape that corresponds to a class of speech
//! sounds. Two classifiers live here:
//!
//! - [`classify_char`] maps one character of a known transcript to a viseme.
//!   Used when the text of the utterance is available ahead of playback.
//! - [`classify_frequency`] maps a dominant frequency and a normalized volume
//!   to a viseme. Used when only a live audio signal is available.
//!
//! # Character table
//!
//! | Characters | Viseme |
//! |---|---|
//! | `a á` | `viseme_aa` |
//! | `e é` | `viseme_E` |
//! | `i í y` | `viseme_I` |
//! | `o ó` | `viseme_O` |
//! | `u ú ü w` | `viseme_U` |
//! | `p b m` | `viseme_PP` |
//! | `f v` | `viseme_FF` |
//! | `t d` | `viseme_DD` |
//! | `n l ñ` | `viseme_nn` |
//! | `k g q c x` | `viseme_kk` |
//! | `h j` | `viseme_CH` |
//! | `s z` | `viseme_SS` |
//! | `r` | `viseme_RR` |
//! | anything else | `viseme_sil` |
//!
//! Uppercase input is folded to lowercase first. `viseme_TH` is never
//! produced from text (Spanish spelling has no reliable marker for it); it is
//! the top frequency bucket instead.

use crate::error::LipSyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Volume below which [`classify_frequency`] always reports silence.
pub const NOISE_FLOOR: f32 = 0.1;

/// Oculus viseme IDs (the morph-target vocabulary of Ready Player Me rigs).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Viseme {
    /// Silence (default mouth closed)
    #[default]
    #[serde(rename = "viseme_sil")]
    Sil = 0,
    /// /p/, /b/, /m/ (lips pressed together)
    #[serde(rename = "viseme_PP")]
    PP = 1,
    /// /f/, /v/ (teeth on lip)
    #[serde(rename = "viseme_FF")]
    FF = 2,
    /// /θ/, /ð/ (tongue between teeth)
    #[serde(rename = "viseme_TH")]
    TH = 3,
    /// /t/, /d/ (tongue at roof)
    #[serde(rename = "viseme_DD")]
    DD = 4,
    /// /k/, /g/ (back of tongue up)
    #[serde(rename = "viseme_kk")]
    KK = 5,
    /// /tʃ/, /x/, /ʃ/ (tongue curved)
    #[serde(rename = "viseme_CH")]
    CH = 6,
    /// /s/, /z/ (teeth together, tongue forward)
    #[serde(rename = "viseme_SS")]
    SS = 7,
    /// /n/, /l/, /ɲ/ (nasal or lateral)
    #[serde(rename = "viseme_nn")]
    NN = 8,
    /// /r/ (tongue curled)
    #[serde(rename = "viseme_RR")]
    RR = 9,
    /// /a/ (mouth open wide)
    #[serde(rename = "viseme_aa")]
    AA = 10,
    /// /e/ (mouth medium)
    #[serde(rename = "viseme_E")]
    E = 11,
    /// /i/ (mouth wide, teeth apart)
    #[serde(rename = "viseme_I")]
    I = 12,
    /// /o/ (rounded, medium)
    #[serde(rename = "viseme_O")]
    O = 13,
    /// /u/ (rounded, small)
    #[serde(rename = "viseme_U")]
    U = 14,
}

impl Viseme {
    /// Every viseme, in ID order.
    pub const ALL: [Viseme; 15] = [
        Viseme::Sil,
        Viseme::PP,
        Viseme::FF,
        Viseme::TH,
        Viseme::DD,
        Viseme::KK,
        Viseme::CH,
        Viseme::SS,
        Viseme::NN,
        Viseme::RR,
        Viseme::AA,
        Viseme::E,
        Viseme::I,
        Viseme::O,
        Viseme::U,
    ];

    /// Morph-target name of this viseme on an Oculus-compatible rig.
    pub fn morph_name(&self) -> &'static str {
        match self {
            Viseme::Sil => "viseme_sil",
            Viseme::PP => "viseme_PP",
            Viseme::FF => "viseme_FF",
            Viseme::TH => "viseme_TH",
            Viseme::DD => "viseme_DD",
            Viseme::KK => "viseme_kk",
            Viseme::CH => "viseme_CH",
            Viseme::SS => "viseme_SS",
            Viseme::NN => "viseme_nn",
            Viseme::RR => "viseme_RR",
            Viseme::AA => "viseme_aa",
            Viseme::E => "viseme_E",
            Viseme::I => "viseme_I",
            Viseme::O => "viseme_O",
            Viseme::U => "viseme_U",
        }
    }

    /// Recover a viseme from its numeric ID.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Numeric ID of this viseme.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Whether this is one of the five vowel shapes.
    pub fn is_vowel(self) -> bool {
        matches!(
            self,
            Viseme::AA | Viseme::E | Viseme::I | Viseme::O | Viseme::U
        )
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.morph_name())
    }
}

impl FromStr for Viseme {
    type Err = LipSyncError;

    /// Accepts morph names (`viseme_aa`) and bare suffixes (`aa`), case-sensitive
    /// on the suffix the way rigs name them, then case-insensitive as a fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix("viseme_").unwrap_or(trimmed);
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.morph_name()["viseme_".len()..] == *bare)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.morph_name()["viseme_".len()..].eq_ignore_ascii_case(bare))
            })
            .ok_or_else(|| LipSyncError::UnknownName {
                kind: "viseme",
                value: s.to_owned(),
            })
    }
}

/// Map one transcript character to a viseme.
///
/// Total over all of `char`: whitespace, punctuation, digits and anything
/// outside the table map to [`Viseme::Sil`].
pub fn classify_char(c: char) -> Viseme {
    let lower = c.to_lowercase().next().unwrap_or(c);
    match lower {
        'a' | 'á' | 'à' => Viseme::AA,
        'e' | 'é' | 'è' => Viseme::E,
        'i' | 'í' | 'y' => Viseme::I,
        'o' | 'ó' => Viseme::O,
        'u' | 'ú' | 'ü' | 'w' => Viseme::U,

        // Bilabial
        'p' | 'b' | 'm' => Viseme::PP,
        // Labiodental
        'f' | 'v' => Viseme::FF,
        // Alveolar stops
        't' | 'd' => Viseme::DD,
        // Nasal / lateral
        'n' | 'l' | 'ñ' => Viseme::NN,
        // Velar
        'k' | 'g' | 'q' | 'c' | 'x' => Viseme::KK,
        // Spanish j and the ch digraph
        'h' | 'j' => Viseme::CH,
        // Sibilants
        's' | 'z' => Viseme::SS,
        // Trill / tap
        'r' => Viseme::RR,

        _ => Viseme::Sil,
    }
}

/// Map a dominant frequency and a normalized volume (0..1) to a viseme.
///
/// Below [`NOISE_FLOOR`] the result is always silence. Above it, frequencies
/// are bucketed in ascending order; a NaN frequency lands in the top bucket.
pub fn classify_frequency(dominant_hz: f32, volume: f32) -> Viseme {
    classify_frequency_with_floor(dominant_hz, volume, NOISE_FLOOR)
}

/// [`classify_frequency`] with a caller-chosen noise floor.
pub fn classify_frequency_with_floor(dominant_hz: f32, volume: f32, noise_floor: f32) -> Viseme {
    if volume.is_nan() || volume < noise_floor {
        return Viseme::Sil;
    }
    match dominant_hz {
        f if f < 400.0 => Viseme::U,
        f if f < 600.0 => Viseme::O,
        f if f < 800.0 => Viseme::AA,
        f if f < 1200.0 => Viseme::E,
        f if f < 2000.0 => Viseme::I,
        f if f < 3000.0 => Viseme::SS,
        f if f < 4000.0 => Viseme::FF,
        _ => Viseme::TH,
    }
}

/// Position of a viseme in the ascending frequency bucket order, or `None` for
/// visemes [`classify_frequency`] never returns above the noise floor.
pub fn frequency_rank(viseme: Viseme) -> Option<usize> {
    const ORDER: [Viseme; 8] = [
        Viseme::U,
        Viseme::O,
        Viseme::AA,
        Viseme::E,
        Viseme::I,
        Viseme::SS,
        Viseme::FF,
        Viseme::TH,
    ];
    ORDER.iter().position(|v| *v == viseme)
}

/// Convert a transcript into one viseme per character.
pub fn text_to_visemes(text: &str) -> Vec<Viseme> {
    text.chars().map(classify_char).collect()
}
