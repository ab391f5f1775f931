//! Serbian Cyrillic → Gaj Latin transliteration.
//!
//! The table covers the full Serbian Cyrillic alphabet, both cases,
//! including the digraph letters (Љ→Lj, Њ→Nj, Џ→Dž). Codepoints outside the
//! table pass through unchanged, so the function is safe to apply to mixed
//! or already-Latin text.

/// Latin equivalent of one Serbian Cyrillic letter, if any.
const fn latin_of(c: char) -> Option<&'static str> {
    Some(match c {
        // Lowercase
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'ђ' => "đ",
        'е' => "e",
        'ж' => "ž",
        'з' => "z",
        'и' => "i",
        'ј' => "j",
        'к' => "k",
        'л' => "l",
        'љ' => "lj",
        'м' => "m",
        'н' => "n",
        'њ' => "nj",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'ћ' => "ć",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "č",
        'џ' => "dž",
        'ш' => "š",
        // Uppercase
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Ђ' => "Đ",
        'Е' => "E",
        'Ж' => "Ž",
        'З' => "Z",
        'И' => "I",
        'Ј' => "J",
        'К' => "K",
        'Л' => "L",
        'Љ' => "Lj",
        'М' => "M",
        'Н' => "N",
        'Њ' => "Nj",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'Ћ' => "Ć",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "C",
        'Ч' => "Č",
        'Џ' => "Dž",
        'Ш' => "Š",
        _ => return None,
    })
}

/// Transliterate Serbian Cyrillic to Latin. Pure; unknown codepoints pass
/// through.
pub fn cyr_to_lat(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match latin_of(c) {
            Some(lat) => out.push_str(lat),
            None => out.push(c),
        }
    }
    out
}

/// Whether `text` contains any codepoint from the Cyrillic block.
pub fn contains_cyrillic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_words() {
        assert_eq!(cyr_to_lat("кућa"), "kuća"); // mixed script input
        assert_eq!(cyr_to_lat("кућа"), "kuća");
        assert_eq!(cyr_to_lat("прича"), "priča");
    }

    #[test]
    fn digraphs() {
        assert_eq!(cyr_to_lat("љубав"), "ljubav");
        assert_eq!(cyr_to_lat("Његош"), "Njegoš");
        assert_eq!(cyr_to_lat("Џак"), "Džak");
    }

    #[test]
    fn passthrough() {
        assert_eq!(cyr_to_lat("already latin"), "already latin");
        assert_eq!(cyr_to_lat("čađ 123 -"), "čađ 123 -");
        assert_eq!(cyr_to_lat(""), "");
    }

    #[test]
    fn output_is_cyrillic_free() {
        let samples = ["Љиљана", "ђаво", "шифра", "На њиви је ђубре"];
        for sample in samples {
            assert!(!contains_cyrillic(&cyr_to_lat(sample)), "{sample}");
        }
    }
}
