//! Species name handling
//!
//! Legacy spellings that appear in older tracking exports are corrected here,
//! once, at ingestion. The rename tables are the single auditable source of
//! corrections; no other pipeline stage rewrites names.

use tracing::debug;

/// Full-name corrections for known legacy spellings
const SPECIES_RENAMES: &[(&str, &str)] = &[
    ("Aaltolamprologus calvus", "Altolamprologus calvus"),
    ("Aaltolamprologus-calvus", "Altolamprologus-calvus"),
];

/// Six-letter code corrections for known legacy codes
const SIX_CODE_RENAMES: &[(&str, &str)] = &[
    ("Aalcal", "Altcal"),
    ("Julmrk", "Julmar"),
    ("Pcynig", "Parnig"),
    ("Cphfro", "Cypfro"),
];

/// Fish-ID substring corrections (IDs embed the genus name)
const FISH_ID_RENAMES: &[(&str, &str)] = &[("Aaltolamprologus", "Altolamprologus")];

/// Canonical full species name, applying the rename table
pub fn canonical_species(name: &str) -> String {
    for (legacy, fixed) in SPECIES_RENAMES {
        if name == *legacy {
            debug!(legacy, fixed, "corrected legacy species name");
            return (*fixed).to_string();
        }
    }
    name.to_string()
}

/// Canonical six-letter species code, applying the rename table
pub fn canonical_six(code: &str) -> String {
    for (legacy, fixed) in SIX_CODE_RENAMES {
        if code == *legacy {
            debug!(legacy, fixed, "corrected legacy species code");
            return (*fixed).to_string();
        }
    }
    code.to_string()
}

/// Canonical fish ID, correcting legacy genus spellings embedded in the ID
pub fn canonical_fish_id(id: &str) -> String {
    let mut out = id.to_string();
    for (legacy, fixed) in FISH_ID_RENAMES {
        if out.contains(legacy) {
            debug!(fish_id = id, legacy, fixed, "corrected legacy fish ID");
            out = out.replace(legacy, fixed);
        }
    }
    out
}

/// Six-letter code from a full species name: first three letters of the genus
/// plus first three of the epithet, e.g. "Altolamprologus calvus" -> "Altcal".
///
/// Accepts space- or hyphen-separated names. Single-word names are truncated
/// to six letters.
pub fn six_letter_code(species: &str) -> String {
    let parts: Vec<&str> = species.split(|c| c == ' ' || c == '-').collect();
    let code = match parts.as_slice() {
        [genus, epithet, ..] => {
            format!("{}{}", prefix(genus, 3), prefix(epithet, 3).to_lowercase())
        }
        [single] => prefix(single, 6),
        [] => String::new(),
    };
    canonical_six(&code)
}

/// Shortened display name, e.g. "Altolamprologus calvus" -> "A. calvus"
pub fn shorten_name(species: &str) -> String {
    let parts: Vec<&str> = species.split(|c| c == ' ' || c == '-').collect();
    match parts.as_slice() {
        [genus, epithet, ..] if !genus.is_empty() => {
            format!("{}. {}", prefix(genus, 1), epithet)
        }
        _ => species.to_string(),
    }
}

fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_six_letter_code() {
        assert_eq!(six_letter_code("Altolamprologus calvus"), "Altcal");
        assert_eq!(six_letter_code("Altolamprologus-calvus"), "Altcal");
        assert_eq!(six_letter_code("Neolamprologus pulcher"), "Neopul");
    }

    #[test]
    fn test_six_letter_code_applies_renames() {
        // The misspelled genus yields a legacy code, which the table corrects.
        assert_eq!(six_letter_code("Aaltolamprologus calvus"), "Altcal");
        assert_eq!(canonical_six("Julmrk"), "Julmar");
        assert_eq!(canonical_six("Cphfro"), "Cypfro");
        assert_eq!(canonical_six("Neobri"), "Neobri");
    }

    #[test]
    fn test_canonical_species() {
        assert_eq!(
            canonical_species("Aaltolamprologus calvus"),
            "Altolamprologus calvus"
        );
        assert_eq!(
            canonical_species("Neolamprologus pulcher"),
            "Neolamprologus pulcher"
        );
    }

    #[test]
    fn test_canonical_fish_id() {
        assert_eq!(
            canonical_fish_id("FISH20210512_c1_r0_Aaltolamprologus-calvus_su"),
            "FISH20210512_c1_r0_Altolamprologus-calvus_su"
        );
    }

    #[test]
    fn test_shorten_name() {
        assert_eq!(shorten_name("Altolamprologus calvus"), "A. calvus");
        assert_eq!(shorten_name("Lepidiolamprologus"), "Lepidiolamprologus");
    }
}
