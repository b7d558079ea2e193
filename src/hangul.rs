//! Hangul syllable decomposition for keystroke-accurate typing.
//!
//! A precomposed syllable (U+AC00..=U+D7A3) is typed as its initial, medial
//! and optional final jamo. Any other character is a single unit.

const SYLLABLE_FIRST: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const MEDIALS: u32 = 21;
const FINALS: u32 = 28;

const INITIAL_JAMO: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];
const MEDIAL_JAMO: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ',
    'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];
const FINAL_JAMO: [char; 27] = [
    'ㄱ', 'ㄲ', 'ㄳ', 'ㄴ', 'ㄵ', 'ㄶ', 'ㄷ', 'ㄹ', 'ㄺ', 'ㄻ', 'ㄼ', 'ㄽ', 'ㄾ', 'ㄿ', 'ㅀ', 'ㅁ',
    'ㅂ', 'ㅄ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅊ', 'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];

/// Units a Hangul syllable needs before it is shown half-typed.
const SYLLABLE_VISIBLE_AT: usize = 2;

pub fn is_syllable(ch: char) -> bool {
    (SYLLABLE_FIRST..=SYLLABLE_LAST).contains(&u32::from(ch))
}

/// Splits `ch` into the jamo a keyboard would produce.
pub fn decompose(ch: char) -> Vec<char> {
    if !is_syllable(ch) {
        return vec![ch];
    }
    let base = u32::from(ch) - SYLLABLE_FIRST;
    let initial = (base / (MEDIALS * FINALS)) as usize;
    let medial = ((base % (MEDIALS * FINALS)) / FINALS) as usize;
    let fin = (base % FINALS) as usize;
    let mut jamo = vec![INITIAL_JAMO[initial], MEDIAL_JAMO[medial]];
    if fin > 0 {
        jamo.push(FINAL_JAMO[fin - 1]);
    }
    jamo
}

/// Keystroke sequence for a whole string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypingPlan {
    chars: Vec<char>,
    /// Units each character takes.
    widths: Vec<usize>,
    total: usize,
}

impl TypingPlan {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let widths: Vec<usize> = chars
            .iter()
            .map(|&ch| if is_syllable(ch) { decompose(ch).len() } else { 1 })
            .collect();
        let total = widths.iter().sum();
        Self {
            chars,
            widths,
            total,
        }
    }

    /// Number of keystrokes to type the whole text.
    pub fn units(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// How many characters are on screen after `typed` keystrokes.
    ///
    /// A syllable appears once its initial and medial are typed; any other
    /// character appears on its first unit.
    pub fn visible_chars(&self, typed: usize) -> usize {
        let mut consumed = 0;
        for (index, (&ch, &width)) in self.chars.iter().zip(&self.widths).enumerate() {
            if typed >= consumed + width {
                consumed += width;
                continue;
            }
            let partial = typed - consumed;
            let needed = if is_syllable(ch) { SYLLABLE_VISIBLE_AT } else { 1 };
            return if partial >= needed { index + 1 } else { index };
        }
        self.chars.len()
    }

    /// The displayed prefix after `typed` keystrokes.
    pub fn text_after(&self, typed: usize) -> String {
        self.chars[..self.visible_chars(typed)].iter().collect()
    }

    pub fn full_text(&self) -> String {
        self.chars.iter().collect()
    }
}
