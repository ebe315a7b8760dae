// Note name utilities
// Maps "C#4"-style names to MIDI numbers and frequencies (C4 = 60, A4 = 440 Hz)

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Parse a note name into its MIDI number
///
/// Accepts an optional sharp or flat and any octave that lands in 0-127
/// ("C-1" is MIDI 0). Returns `None` for anything unparseable; callers
/// treat that as the instrument's concern and drop the trigger.
pub fn midi_number(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();

    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave_text) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = octave_text.parse().ok()?;
    let number = (octave + 1) * 12 + base + accidental;
    u8::try_from(number).ok()
}

/// Note name for a MIDI number, e.g. 60 → "C4"
pub fn note_name(number: u8) -> String {
    let octave = (number / 12) as i32 - 1;
    let index = (number % 12) as usize;
    format!("{}{}", NOTE_NAMES[index], octave)
}

/// Frequency in Hz for a note name, equal temperament around A4 = 440
pub fn frequency(name: &str) -> Option<f32> {
    let number = midi_number(name)?;
    Some(440.0 * ((number as f32 - 69.0) / 12.0).exp2())
}
