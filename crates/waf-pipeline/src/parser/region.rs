//! 국가 코드 -> 지역명 정적 조회 테이블

/// 알 수 없는 국가 코드에 대한 지역명
pub const REGION_UNKNOWN: &str = "Unknown";

/// ISO 3166-1 alpha-2 국가 코드를 지역명으로 변환합니다.
///
/// 매핑되지 않은 코드는 [`REGION_UNKNOWN`]으로 수렴합니다.
/// 대소문자를 구분하지 않습니다.
pub fn region_for_country(code: &str) -> &'static str {
    match code.to_uppercase().as_str() {
        "US" | "CA" | "MX" => "North America",
        "BR" | "AR" | "CL" | "CO" | "PE" | "VE" | "EC" | "UY" | "BO" | "PY" => "South America",
        "GB" | "DE" | "FR" | "IT" | "ES" | "NL" | "SE" | "NO" | "FI" | "DK" | "PL" | "CH"
        | "AT" | "BE" | "IE" | "PT" | "CZ" | "RO" | "GR" | "HU" | "UA" => "Europe",
        "CN" | "JP" | "KR" | "IN" | "AU" | "NZ" | "SG" | "HK" | "TW" | "TH" | "VN" | "MY"
        | "ID" | "PH" | "BD" | "PK" => "Asia Pacific",
        "AE" | "SA" | "IL" | "TR" | "QA" | "KW" | "JO" | "IR" | "IQ" => "Middle East",
        "ZA" | "NG" | "EG" | "KE" | "MA" | "GH" | "TN" | "DZ" | "ET" => "Africa",
        "RU" | "KZ" | "BY" | "UZ" | "GE" | "AM" | "AZ" => "Eurasia",
        _ => REGION_UNKNOWN,
    }
}
