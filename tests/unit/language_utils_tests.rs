/*!
 * Tests for language code handling
 */

use linesync::language_codes_match;
use linesync::language_utils::{display_name, normalize_to_part1_or_part2t, validate_language_code};

/// Cache namespaces converge no matter which code family the config uses
#[test]
fn test_normalizeToPart1OrPart2t_shouldGiveOneCodePerLanguage() {
    for code in ["ja", "jpn", "JA"] {
        assert_eq!(normalize_to_part1_or_part2t(code).unwrap(), "ja");
    }
    for code in ["fr", "fra", "fre"] {
        assert_eq!(normalize_to_part1_or_part2t(code).unwrap(), "fr");
    }
    assert!(normalize_to_part1_or_part2t("klingon").is_err());
}

#[test]
fn test_validateLanguageCode_withConfigDefaults_shouldAccept() {
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("ja").is_ok());
    assert!(language_codes_match("en", "eng"));
}

/// Prompts name languages in English
#[test]
fn test_displayName_shouldUseEnglishNames() {
    assert_eq!(display_name("fr"), "French");
    assert_eq!(display_name("deu"), "German");
}
