// Static localization of detector class names to Turkish display text.
//
// The table covers the denominations the banknote model is trained on;
// anything else falls through unchanged so a model update can never make
// this step fail.

/// Map a detector class name to its Turkish display string.
///
/// Deterministic lookup; unknown labels are returned as-is.
pub fn localize(label: &str) -> &str {
    match label {
        "5TL" => "Beş Türk Lirası",
        "10TL" => "On Türk Lirası",
        "20TL" => "Yirmi Türk Lirası",
        "50TL" => "Elli Türk Lirası",
        "100TL" => "Yüz Türk Lirası",
        "200TL" => "İki Yüz Türk Lirası",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_localize() {
        assert_eq!(localize("5TL"), "Beş Türk Lirası");
        assert_eq!(localize("200TL"), "İki Yüz Türk Lirası");
    }

    #[test]
    fn test_unknown_label_falls_through() {
        assert_eq!(localize("500TL"), "500TL");
        assert_eq!(localize(""), "");
    }
}
